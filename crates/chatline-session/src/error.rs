//! Error types for the HTTP session layer.

/// Errors from talking to the chat server's HTTP API.
///
/// [`SessionBootstrapper`](crate::SessionBootstrapper) never returns these;
/// it logs them and degrades to "no session". [`StatsClient`](crate::StatsClient)
/// hands them to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The base URL could not be combined with an API path.
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request never completed (connection refused, timeout, TLS...).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    /// The body was not the JSON shape we expect.
    #[error("malformed response: {0}")]
    Malformed(String),
}
