//! HTTP side of the Chatline client.
//!
//! Before the live connection opens, the client may ask the server for a
//! session id ([`SessionBootstrapper`]). Presentation code may also poll
//! server statistics ([`StatsClient`]). Both talk plain HTTP through a
//! shared `reqwest::Client`.
//!
//! # How it fits in the stack
//!
//! ```text
//! Client core (above)   ← calls create_session() once per join
//!     ↕
//! Session layer (this crate) ← POST /api/session, GET /api/stats
//!     ↕
//! HTTP server
//! ```

mod bootstrap;
mod error;
mod stats;

pub use bootstrap::{SESSION_PATH, SessionBootstrapper, SessionId};
pub use error::SessionError;
pub use stats::{STATS_PATH, ServerStats, StatsClient};

pub use reqwest::Url;
