//! Error types for the portal transport layer.

use reqwest::StatusCode;

/// Errors that can occur while fetching or submitting portal pages.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed (network error or timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The portal returned a non-success status.
    #[error("unexpected status {status}")]
    HttpStatus { status: StatusCode },
    /// A URL could not be parsed or resolved.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
