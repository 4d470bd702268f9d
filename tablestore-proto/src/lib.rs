//! The wire codec: protobuf request/response envelopes (generated by
//! `build.rs` via `prost-build`) plus this crate's own compact encoding for
//! the primary keys, rows, row updates and filters carried inside them.
//!
//! This is the only crate in the workspace that knows the bytes on the
//! wire; everything else programs against `tablestore_api::traits::Codec`.

mod codec;
mod convert;
mod row_codec;

pub use codec::PlainBufferCodec;

/// Generated protobuf message types (`build.rs` compiles `proto/table_store.proto`).
#[allow(clippy::all)]
pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/tablestore.rs"));
}

/// A malformed or truncated row payload. Never surfaced directly; callers
/// see it folded into `tablestore_api::Error::corrupted_response`.
#[derive(Debug)]
pub(crate) struct CodecError;

impl CodecError {
    pub(crate) fn truncated() -> Self {
        CodecError
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("truncated or malformed row payload")
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for tablestore_api::Error {
    fn from(_: CodecError) -> Self {
        tablestore_api::Error::corrupted_response("malformed row payload")
    }
}

impl From<prost::DecodeError> for CodecError {
    fn from(_: prost::DecodeError) -> Self {
        CodecError
    }
}
