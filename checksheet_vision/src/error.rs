// THEORY:
// One error type for the whole engine. The variants mirror the failure classes a
// caller has to distinguish: an input that never decoded, geometry that collapsed
// to nothing, an output we do not know how to encode, and a composite with no
// usable inputs. Everything else is plumbing (`Io`, `Image`, `Config`, `Join`,
// `BatchClosed`).

use std::path::PathBuf;

/// Every failure the vision engine can surface to a caller.
#[derive(thiserror::Error, Debug)]
pub enum SheetError {
    #[error("unreadable input image {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("unsupported output format for {path}")]
    UnsupportedOutputFormat { path: PathBuf },

    #[error("no usable images to compose")]
    NoUsableImages,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(String),

    #[error("batch worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("batch segmenter is closed")]
    BatchClosed,
}

impl SheetError {
    /// True for the errors caused by what the caller handed in, as opposed to
    /// failures inside the engine or the filesystem.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SheetError::UnreadableInput { .. }
                | SheetError::UnsupportedOutputFormat { .. }
                | SheetError::NoUsableImages
        )
    }
}

pub type Result<T> = std::result::Result<T, SheetError>;
