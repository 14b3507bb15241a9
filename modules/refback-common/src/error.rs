use thiserror::Error;

/// Reasons a refback signal stops moving through the pipeline. Every variant
/// except `StoreFailure` is a silent abort toward the referring site; nothing
/// is ever reported back to it.
#[derive(Error, Debug)]
pub enum RefbackError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Source and target share a host")]
    SelfReferral,

    #[error("Target URL does not resolve to a post")]
    PostNotFound,

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Source page does not link to the target")]
    LinkNotVerified,

    #[error("Comment store error: {0}")]
    StoreFailure(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RefbackError>;
