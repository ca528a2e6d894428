//! Value codec for blobkv.
//!
//! Converts application values into the byte payloads stored by a backend
//! and decodes them back into a caller-chosen type. All serialization-format
//! concerns live here; the repository and the stores only ever see bytes.
//!
//! The wire format is JSON: self-describing, readable when inspecting a
//! bucket by hand, and stable across releases of this crate.

pub mod codec;
pub mod error;

pub use codec::{JsonCodec, ValueCodec};
pub use error::{CodecError, CodecResult};
