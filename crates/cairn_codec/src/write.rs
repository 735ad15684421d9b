//! Encoding side of the positional codec.

use std::io::Write;
use std::path::Path;

use cairn_common::BuildPath;
use serde::Serialize;

use crate::error::CodecError;
use crate::frames::{FrameStack, IsolateStack};
use crate::{value_config, CodecResult};

/// Sequential writer over a byte stream.
///
/// Every `write_*` method has a `read_*` counterpart on
/// [`ReadContext`](crate::ReadContext); the two must be called in the same
/// order for a stream to decode.
pub struct WriteContext<W: Write> {
    writer: W,
    frames: FrameStack,
    isolates: IsolateStack,
    position: u64,
}

impl<W: Write> WriteContext<W> {
    /// Creates a context writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames: FrameStack::default(),
            isolates: IsolateStack::default(),
            position: 0,
        }
    }

    /// Writes a fixed-width, big-endian 32-bit integer.
    pub fn write_int(&mut self, value: i32) -> CodecResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Writes a one-byte boolean discriminator.
    pub fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        self.write_bytes(&[u8::from(value)])
    }

    /// Writes a collection or string length.
    pub fn write_size(&mut self, len: usize) -> CodecResult<()> {
        let size = u32::try_from(len).map_err(|_| CodecError::SizeOverflow {
            trace: self.trace(),
            len,
        })?;
        self.write_bytes(&size.to_be_bytes())
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> CodecResult<()> {
        self.write_size(value.len())?;
        self.write_bytes(value.as_bytes())
    }

    /// Writes a list of strings.
    pub fn write_strings(&mut self, values: &[String]) -> CodecResult<()> {
        self.write_collection(values, |ctx, value| ctx.write_string(value))
    }

    /// Writes a file path. Paths must be valid UTF-8.
    pub fn write_file(&mut self, path: &Path) -> CodecResult<()> {
        let text = path.to_str().ok_or_else(|| CodecError::InvalidUtf8 {
            trace: self.trace(),
        })?;
        self.write_string(text)
    }

    /// Writes an optional file path behind a presence flag.
    pub fn write_optional_file(&mut self, path: Option<&Path>) -> CodecResult<()> {
        match path {
            Some(path) => {
                self.write_bool(true)?;
                self.write_file(path)
            }
            None => self.write_bool(false),
        }
    }

    /// Writes a size prefix followed by each item through `write_item`.
    pub fn write_collection<I, E, F>(&mut self, items: I, mut write_item: F) -> Result<(), E>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<(), E>,
        E: From<CodecError>,
    {
        let items = items.into_iter();
        self.write_size(items.len())?;
        for item in items {
            write_item(self, item)?;
        }
        Ok(())
    }

    /// Writes an arbitrary serde value. Only allowed inside an isolate.
    pub fn write_value<T: Serialize + ?Sized>(&mut self, value: &T) -> CodecResult<()> {
        if self.isolates.current().is_none() {
            return Err(CodecError::NoIsolate {
                trace: self.trace(),
            });
        }
        let mut counter = CountingWriter {
            inner: &mut self.writer,
            written: 0,
        };
        let result =
            bincode::serde::encode_into_std_write(value, &mut counter, value_config());
        self.position += counter.written;
        result.map(|_| ()).map_err(|e| CodecError::Encode {
            trace: self.frames.trace(),
            reason: e.to_string(),
        })
    }

    /// Runs `f` inside a named debug frame.
    ///
    /// The frame is closed whether `f` succeeds or fails.
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

    /// Returns the number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> CodecResult<()> {
        self.writer.flush().map_err(|source| CodecError::Io {
            trace: self.frames.trace(),
            source,
        })
    }

    /// Consumes the context, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.writer.write_all(bytes).map_err(|source| CodecError::Io {
            trace: self.frames.trace(),
            source,
        })?;
        self.position += bytes.len() as u64;
        Ok(())
    }
}

struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
