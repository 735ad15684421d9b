//! Decoding side of the positional codec.

use std::io::Read;
use std::path::PathBuf;

use cairn_common::BuildPath;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::frames::{FrameStack, IsolateStack};
use crate::{value_config, CodecResult};

/// Upper bound on capacity reserved up front for a decoded collection.
const MAX_PREALLOCATED_ITEMS: usize = 1024;

/// Sequential reader over a byte stream, mirroring
/// [`WriteContext`](crate::WriteContext).
pub struct ReadContext<R: Read> {
    reader: R,
    frames: FrameStack,
    isolates: IsolateStack,
}

impl<R: Read> ReadContext<R> {
    /// Creates a context reading from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames: FrameStack::default(),
            isolates: IsolateStack::default(),
        }
    }

    /// Reads a fixed-width, big-endian 32-bit integer.
    pub fn read_int(&mut self) -> CodecResult<i32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(i32::from_be_bytes(bytes))
    }

    /// Reads a one-byte boolean discriminator. Bytes other than `0`/`1` are rejected.
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        match byte[0] {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidBoolean {
                trace: self.trace(),
                value,
            }),
        }
    }

    /// Reads a collection or string length.
    pub fn read_size(&mut self) -> CodecResult<usize> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes) as usize)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_size()?;
        let mut buf = Vec::with_capacity(len.min(MAX_PREALLOCATED_ITEMS));
        let read = (&mut self.reader)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(|source| CodecError::Io {
                trace: self.frames.trace(),
                source,
            })?;
        if read != len {
            return Err(CodecError::Io {
                trace: self.trace(),
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {len} bytes of string data, found {read}"),
                ),
            });
        }
        String::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8 {
            trace: self.trace(),
        })
    }

    /// Reads a list of strings.
    pub fn read_strings(&mut self) -> CodecResult<Vec<String>> {
        self.read_list(|ctx| ctx.read_string())
    }

    /// Reads a file path.
    pub fn read_file(&mut self) -> CodecResult<PathBuf> {
        self.read_string().map(PathBuf::from)
    }

    /// Reads an optional file path written behind a presence flag.
    pub fn read_optional_file(&mut self) -> CodecResult<Option<PathBuf>> {
        if self.read_bool()? {
            self.read_file().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads a size prefix, then calls `read_item` that many times.
    pub fn read_collection<E, F>(&mut self, mut read_item: F) -> Result<(), E>
    where
        F: FnMut(&mut Self) -> Result<(), E>,
        E: From<CodecError>,
    {
        let len = self.read_size()?;
        for _ in 0..len {
            read_item(self)?;
        }
        Ok(())
    }

    /// Reads a size prefix, then collects that many items.
    pub fn read_list<T, E, F>(&mut self, mut read_item: F) -> Result<Vec<T>, E>
    where
        F: FnMut(&mut Self) -> Result<T, E>,
        E: From<CodecError>,
    {
        let len = self.read_size()?;
        let mut items = Vec::with_capacity(len.min(MAX_PREALLOCATED_ITEMS));
        for _ in 0..len {
            items.push(read_item(self)?);
        }
        Ok(items)
    }

    /// Reads an arbitrary serde value. Only allowed inside an isolate.
    pub fn read_value<T: DeserializeOwned>(&mut self) -> CodecResult<T> {
        if self.isolates.current().is_none() {
            return Err(CodecError::NoIsolate {
                trace: self.trace(),
            });
        }
        bincode::serde::decode_from_std_read(&mut self.reader, value_config())
            .map_err(|e| CodecError::Decode {
                trace: self.frames.trace(),
                reason: e.to_string(),
            })
    }

    /// Runs `f` inside a named debug frame, mirroring the writer's frames.
    pub fn with_debug_frame<T, E>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.frames.push(name);
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Runs `f` inside an isolate owned by `owner`.
    pub fn with_isolate<T, E>(
        &mut self,
        owner: BuildPath,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        self.isolates.push(owner);
        let result = f(self);
        self.isolates.pop();
        result
    }

    /// Returns the owner of the innermost open isolate.
    pub fn current_isolate(&self) -> Option<&BuildPath> {
        self.isolates.current()
    }

    /// Renders the open debug frames.
    pub fn trace(&self) -> String {
        self.frames.trace()
    }

    /// Consumes the context, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        self.reader.read_exact(buf).map_err(|source| CodecError::Io {
            trace: self.frames.trace(),
            source,
        })
    }
}
