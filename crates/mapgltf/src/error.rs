//! Error types for mapgltf.

use thiserror::Error;

/// Result type for mapgltf operations.
pub type Result<T> = std::result::Result<T, GltfError>;

/// Errors that can occur while building or reading a glTF document.
#[derive(Debug, Error)]
pub enum GltfError {
    /// A serialized document without an `asset` block.
    #[error("missing \"asset\" section")]
    MissingAssetSection,

    /// The construction input is not a JSON document container.
    #[error("invalid input type: {0}")]
    InvalidInputType(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The texture codec rejected its input.
    #[error("texture codec error: {0}")]
    Codec(String),

    /// Invalid data in the document (out-of-range views, accessors or images).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An encoder dropped its result before producing the buffer payload.
    #[error("encode for buffer {slot} was dropped before completing")]
    EncodeAborted {
        /// Buffer slot that will never be filled.
        slot: usize,
    },
}

impl GltfError {
    /// Create a codec error from any displayable message.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Create an invalid-data error from any displayable message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}
