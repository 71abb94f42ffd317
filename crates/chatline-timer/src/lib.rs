//! Reconnect timing for Chatline.
//!
//! Two pieces:
//!
//! - [`ReconnectPolicy`]: exponential backoff bookkeeping:
//!   `delay(a) = min(base_delay * 2^a, max_delay)`, capped at
//!   `max_attempts` between successful opens.
//! - [`Scheduler`]: cancellable one-shot timers plus a clock.
//!   [`TokioScheduler`] runs on the Tokio timer wheel; [`ManualScheduler`]
//!   runs on virtual time so reconnection can be tested without waiting.
//!
//! # Integration
//!
//! The scheduler delivers into a channel that sits in the client's
//! `tokio::select!` loop next to the transport events:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = transport_rx.recv() => manager.handle_transport_event(event),
//!         Some(fired) = timer_rx.recv() => manager.handle_timer(fired),
//!     }
//! }
//! ```

mod backoff;
mod scheduler;

pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use scheduler::{
    Fired, ManualScheduler, PendingTimer, Scheduler, TimerId, TokioScheduler,
};
