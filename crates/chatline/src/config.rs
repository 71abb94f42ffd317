//! Client configuration.

use std::time::Duration;

use chatline_timer::ReconnectConfig;
use url::Url;

use crate::ChatError;

/// Where the chat server's HTTP API lives unless configured otherwise.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/";

/// Port the chat server's WebSocket endpoint listens on.
pub const DEFAULT_WS_PORT: u16 = 8081;

/// Everything a [`ChatClient`](crate::ChatClient) needs to know up front.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat server's HTTP API (`/api/session`, `/api/stats`).
    /// Its scheme also picks `ws` or `wss` for the live connection.
    pub server_url: Url,
    /// Port of the live WebSocket endpoint, on the same host as `server_url`.
    pub ws_port: u16,
    pub reconnect: ReconnectConfig,
    /// Timeout for each HTTP request.
    pub http_timeout: Duration,
    /// Limit for opening the live connection (TCP plus upgrade). An attempt
    /// that runs over counts as a failed attempt and backs off.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // `expect` is fine here: the literal is known to parse.
            server_url: Url::parse(DEFAULT_SERVER_URL)
                .expect("default server url is valid"),
            ws_port: DEFAULT_WS_PORT,
            reconnect: ReconnectConfig::default(),
            http_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// The live endpoint: `ws://host:port` for `http`, `wss://host:port`
    /// for `https`.
    ///
    /// # Errors
    /// [`ChatError::Config`] for other schemes or a URL without a host.
    pub fn websocket_url(&self) -> Result<Url, ChatError> {
        let scheme = match self.server_url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(ChatError::Config(format!(
                    "unsupported server url scheme {other:?}, expected http or https"
                )));
            }
        };
        let host = self.server_url.host().ok_or_else(|| {
            ChatError::Config(format!("server url {} has no host", self.server_url))
        })?;
        Url::parse(&format!("{scheme}://{host}:{}", self.ws_port))
            .map_err(|e| ChatError::Config(e.to_string()))
    }
}
