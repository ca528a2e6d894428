use thiserror::Error;

/// Errors from encoding or decoding a value payload.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value cannot be represented in the payload format.
    #[error("encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// The payload is malformed or does not match the requested type.
    #[error("decoding error: {0}")]
    Decoding(#[source] serde_json::Error),
}

impl CodecError {
    /// Returns `true` for failures raised while encoding.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Returns `true` for failures raised while decoding.
    pub fn is_decoding(&self) -> bool {
        matches!(self, Self::Decoding(_))
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
