mod common;

use std::fs;

use cairn_cache::StateFile;
use cairn_state::{ConfigurationCacheIo, LoadOptions, StateError, STATE_FILE_MARKER};

use common::{diamond_tree, load, store};

#[test]
fn every_marker_byte_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let work_file = io.work_state_file().path();
    let original = fs::read(&work_file).unwrap();
    let marker_start = original.len() - 4;
    assert_eq!(&original[marker_start..], &STATE_FILE_MARKER.to_be_bytes());

    for offset in 0..4 {
        let mut corrupted = original.clone();
        corrupted[marker_start + offset] ^= 0xff;
        fs::write(&work_file, &corrupted).unwrap();

        let err = load(&io, base, LoadOptions::default()).unwrap_err();
        match err {
            StateError::CorruptCache { expected, found } => {
                assert_eq!(expected, STATE_FILE_MARKER);
                assert_ne!(found, STATE_FILE_MARKER);
            }
            other => panic!("byte {offset}: unexpected error {other:?}"),
        }
    }
}

#[test]
fn corruption_detected_in_identify_mode() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let work_file = io.work_state_file().path();
    let mut bytes = fs::read(&work_file).unwrap();
    let last = bytes.len() - 1;
    bytes[last] = 0;
    fs::write(&work_file, &bytes).unwrap();

    let options = LoadOptions {
        load_after_store_mode: true,
        loaded_after_store: false,
    };
    assert!(matches!(
        load(&io, base, options),
        Err(StateError::CorruptCache { .. })
    ));
}

#[test]
fn truncated_entry_is_a_codec_error() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let work_file = io.work_state_file().path();
    let bytes = fs::read(&work_file).unwrap();
    fs::write(&work_file, &bytes[..bytes.len() - 2]).unwrap();

    match load(&io, base, LoadOptions::default()).unwrap_err() {
        StateError::Codec(err) => assert!(err.is_unexpected_eof()),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_nested_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let nested = io
        .work_state_file()
        .state_file_for_included_build(&common::definition(base, "plugins"));
    nested.delete().unwrap();

    match load(&io, base, LoadOptions::default()).unwrap_err() {
        StateError::Cache(err) => assert!(err.is_not_found()),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn flipped_boolean_discriminator_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    let io = ConfigurationCacheIo::new(base.join("cache"));
    store(&io, &diamond_tree(base)).unwrap();
    let work_file = io.work_state_file().path();
    let mut bytes = fs::read(&work_file).unwrap();
    // the settings file presence flag opens the stream
    assert_eq!(bytes[0], 0);
    bytes[0] = 7;
    fs::write(&work_file, &bytes).unwrap();

    match load(&io, base, LoadOptions::default()).unwrap_err() {
        StateError::Codec(err) => assert_eq!(err.trace(), "Gradle"),
        other => panic!("unexpected error {other:?}"),
    }
}
