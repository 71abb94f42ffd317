//! Server statistics from `GET /api/stats`.
//!
//! Consumed by presentation code (a status panel, usually polled every few
//! seconds). The connection core never reads these.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Path of the stats endpoint, relative to the server's base URL.
pub const STATS_PATH: &str = "/api/stats";

/// Thread-pool and traffic counters reported by the server.
///
/// Fields the server leaves out come back as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerStats {
    pub active_threads: Option<u64>,
    pub pool_size: Option<u64>,
    pub queue_size: Option<u64>,
    pub total_requests: Option<u64>,
}

/// Fetches [`ServerStats`].
#[derive(Debug, Clone)]
pub struct StatsClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl StatsClient {
    /// # Errors
    /// [`SessionError::InvalidUrl`] if `base_url` cannot take a path.
    pub fn new(http: reqwest::Client, base_url: &Url) -> Result<Self, SessionError> {
        Ok(Self {
            http,
            endpoint: base_url.join(STATS_PATH)?,
        })
    }

    /// One stats request.
    ///
    /// # Errors
    /// Transport failures, non-success statuses and malformed bodies.
    pub async fn fetch(&self) -> Result<ServerStats, SessionError> {
        let response = self.http.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status(status));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SessionError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_parse_camel_case() {
        let stats: ServerStats = serde_json::from_str(
            r#"{"activeThreads":3,"poolSize":10,"queueSize":0,"totalRequests":1234}"#,
        )
        .unwrap();
        assert_eq!(
            stats,
            ServerStats {
                active_threads: Some(3),
                pool_size: Some(10),
                queue_size: Some(0),
                total_requests: Some(1234),
            }
        );
    }

    #[test]
    fn test_stats_missing_fields_are_none() {
        let stats: ServerStats = serde_json::from_str(r#"{"poolSize":4}"#).unwrap();
        assert_eq!(stats.pool_size, Some(4));
        assert_eq!(stats.active_threads, None);
        assert_eq!(stats.total_requests, None);
    }
}
