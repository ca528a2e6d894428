use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CodecError, CodecResult};

/// Converts typed values to byte payloads and back.
///
/// Implementations must be pure: no shared mutable state, no I/O. The target
/// type of `decode` is the type descriptor; the same bytes may decode into
/// any type whose shape they match.
pub trait ValueCodec: Send + Sync {
    /// Serialize `value` into a payload.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Deserialize a payload into an instance of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T>;

    /// Media type of the produced payloads.
    fn content_type(&self) -> &'static str;
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ValueCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(CodecError::Encoding)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> CodecResult<T> {
        serde_json::from_slice(bytes).map_err(CodecError::Decoding)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}
