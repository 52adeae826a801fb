use std::path::PathBuf;

/// Errors that can occur while hiding or extracting a directory tree.
///
/// Every variant here is fatal: callers are not expected to retry, only to
/// surface the diagnostic and stop.
#[derive(Debug, thiserror::Error)]
pub enum StegoError {
    /// The source path to hide, or the extraction target, is missing or not
    /// the kind of entry the operation expected.
    #[error("invalid input path {path:?}: {reason}")]
    InvalidInputPath { path: PathBuf, reason: String },

    /// A file among the cover/carrier photos is not a PNG.
    #[error("unsupported image {0:?}: only PNG covers are supported")]
    UnsupportedImage(PathBuf),

    /// A cover image's capacity is too small for its header, or the pixel
    /// cursor ran out of samples mid read/write.
    #[error("image too small: {0}")]
    ImageTooSmall(String),

    /// The payload or the cover set exceeds a hard format limit.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The decoded set of image indices is not exactly `{0, 1, .., N-1}`.
    #[error("invalid image set: {0}")]
    InvalidImageSet(String),

    /// The tree serializer rejected the decoded byte stream.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Underlying filesystem or image codec failure.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Underlying PNG codec failure that isn't a plain IO error.
    #[error("image codec error: {0}")]
    ImageCodec(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, StegoError>;
