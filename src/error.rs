use thiserror::Error;

/// Why a link could not be turned into track metadata.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported link")]
    UnsupportedLink,

    #[error("no metadata found: {0}")]
    NoMetadata(String),

    #[error("rendering failed: {0}")]
    RenderFailure(String),

    #[error("unparsable page title: {0:?}")]
    UnparsableTitle(String),
}
