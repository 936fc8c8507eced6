use thiserror::Error;

/// Fatal configuration errors, raised before any probing starts.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("malformed target URL: {0}")]
    MalformedUrl(String),

    #[error("no query parameters found in target URL")]
    NoParameters,
}
