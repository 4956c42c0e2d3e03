use crate::store::ResourceId;

/// Errors from resource store and codec operations.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {0} not found")]
    NotFound(ResourceId),
    #[error("resource id {0} is outside the allocatable range")]
    IdOutOfRange(ResourceId),
    #[error("resource id space exhausted")]
    IdSpaceExhausted,
    #[error("resource id {0} is already in use")]
    IdInUse(ResourceId),
    #[error("resource {0} is captured by a checkpoint; fork it before editing")]
    Frozen(ResourceId),
    #[error("pixel buffer of {actual} bytes does not fit a {width}x{height} RGBA surface")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },
    #[error("unsupported resource encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("PNG encode error: {0}")]
    PngEncode(#[from] png::EncodingError),
    #[error("PNG decode error: {0}")]
    PngDecode(#[from] png::DecodingError),
}
