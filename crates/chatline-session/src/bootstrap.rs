//! One-shot session bootstrap over `POST /api/session`.
//!
//! The session id is an observability aid. Nothing in the chat protocol
//! needs it, so a failed bootstrap is logged and otherwise ignored: the
//! caller connects exactly as if the server had never issued one.

use std::fmt;

use reqwest::Url;
use serde::Deserialize;

use crate::SessionError;

/// Path of the session endpoint, relative to the server's base URL.
pub const SESSION_PATH: &str = "/api/session";

/// An opaque session identifier issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
}

/// Obtains an optional session id before the live connection opens.
#[derive(Debug, Clone)]
pub struct SessionBootstrapper {
    http: reqwest::Client,
    endpoint: Url,
}

impl SessionBootstrapper {
    /// Creates a bootstrapper for the server at `base_url`.
    ///
    /// # Errors
    /// [`SessionError::InvalidUrl`] if `base_url` cannot take a path
    /// (e.g. `mailto:`).
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, SessionError> {
        Ok(Self {
            http,
            endpoint: base_url.join(SESSION_PATH)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Performs the single bootstrap request.
    ///
    /// Returns `None` on any failure. No retries.
    pub async fn create_session(&self) -> Option<SessionId> {
        match self.request_session().await {
            Ok(id) => {
                tracing::info!(session_id = %id, "session created");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    endpoint = %self.endpoint,
                    "session bootstrap failed, continuing without a session"
                );
                None
            }
        }
    }

    async fn request_session(&self) -> Result<SessionId, SessionError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: SessionResponse = serde_json::from_slice(&body)
            .map_err(|e| SessionError::Malformed(e.to_string()))?;
        if parsed.session_id.is_empty() {
            return Err(SessionError::Malformed("empty sessionId".into()));
        }
        Ok(SessionId(parsed.session_id))
    }
}
