//! Error types for codec operations.

/// Errors raised while encoding or decoding a state stream.
///
/// Every variant carries the debug frame trail that was active when the
/// error was raised (e.g. `Gradle > included builds`), so a failure deep
/// inside a recursive write can be attributed to the section that caused it.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying stream failed (including unexpected end of stream).
    #[error("I/O error in {trace}: {source}")]
    Io {
        /// Debug frame trail at the point of failure.
        trace: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be encoded.
    #[error("failed to encode value in {trace}: {reason}")]
    Encode {
        /// Debug frame trail at the point of failure.
        trace: String,
        /// Description of the encoding failure.
        reason: String,
    },

    /// A value could not be decoded.
    #[error("failed to decode value in {trace}: {reason}")]
    Decode {
        /// Debug frame trail at the point of failure.
        trace: String,
        /// Description of the decoding failure.
        reason: String,
    },

    /// A boolean discriminator byte was neither `0` nor `1`.
    #[error("invalid boolean byte {value:#04x} in {trace}")]
    InvalidBoolean {
        /// Debug frame trail at the point of failure.
        trace: String,
        /// The byte that was read.
        value: u8,
    },

    /// A string or path was not valid UTF-8.
    #[error("invalid UTF-8 in {trace}")]
    InvalidUtf8 {
        /// Debug frame trail at the point of failure.
        trace: String,
    },

    /// A collection or string is too large for its 32-bit size prefix.
    #[error("size {len} exceeds the encodable maximum in {trace}")]
    SizeOverflow {
        /// Debug frame trail at the point of failure.
        trace: String,
        /// The size that could not be encoded.
        len: usize,
    },

    /// An arbitrary value was encoded or decoded outside of any isolate.
    #[error("value encoded outside of an isolate in {trace}")]
    NoIsolate {
        /// Debug frame trail at the point of failure.
        trace: String,
    },
}

impl CodecError {
    /// Returns the debug frame trail attached to this error.
    pub fn trace(&self) -> &str {
        match self {
            CodecError::Io { trace, .. }
            | CodecError::Encode { trace, .. }
            | CodecError::Decode { trace, .. }
            | CodecError::InvalidBoolean { trace, .. }
            | CodecError::InvalidUtf8 { trace }
            | CodecError::SizeOverflow { trace, .. }
            | CodecError::NoIsolate { trace } => trace,
        }
    }

    /// Returns `true` if the error was caused by the stream ending early.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(
            self,
            CodecError::Io { source, .. } if source.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}
