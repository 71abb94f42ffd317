//! The connection manager: owns the live connection and its state machine.
//!
//! This is the only component that holds a transport handle. It:
//! - opens connections and sends `Join` once each one is up
//! - accepts outbound intents only while the connection is open
//! - feeds inbound frames through the codec to the router
//! - schedules reconnects with exponential backoff after unexpected closes
//! - gives up after `max_attempts` and reports a fatal condition
//!
//! # Concurrency note
//!
//! `ConnectionManager` is a plain struct with `&mut self` methods. It is
//! owned by the client's event loop task, which feeds it commands,
//! transport events and timer firings one at a time. Nothing here runs in
//! parallel with anything else here.
//!
//! Late arrivals are expected: a transport that was replaced may still
//! report, and a cancelled timer may still fire. Both are recognized by
//! identity (transport [`Generation`], timer [`TimerId`]) and dropped.

use std::fmt;

use chatline_protocol::{JsonCodec, OutboundIntent, Username, WireCodec};
use chatline_timer::{Fired, ReconnectConfig, ReconnectPolicy, Scheduler, TimerId};
use chatline_transport::{
    Connector, EventSink, Generation, TransportEvent, TransportEventKind,
    TransportHandle,
};
use tracing::{debug, info, trace, warn};

use crate::{ChatError, MessageRouter};

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where the connection is in its lifecycle.
///
/// ```text
///   Disconnected ──connect──→ Connecting ──opened──→ Open
///        ↑                      │    ↑                 │
///        │                 lost │    │ backoff         │ lost
///   disconnect (any state)      ▼    │ timer           ▼
///        │                   Reconnecting ←────────────┘
///        │                      │
///        │                      ▼ attempts used up
///        └──────────────────  Closed (fatal, manual restart)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
    /// Reconnect attempts exhausted.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Connection lifecycle notifications for the presentation layer.
pub trait ConnectionObserver: Send + 'static {
    /// The connection came up (`true`) or went away (`false`).
    fn connectivity_changed(&mut self, connected: bool);

    /// The first connection of this client is open; time to show the chat.
    fn chat_ready(&mut self) {}

    /// Reconnection gave up. No further automatic attempts will be made.
    fn reconnect_exhausted(&mut self, error: &ChatError);
}

/// Timers the manager schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Next attempt after an unexpected close.
    Backoff,
    /// Reconnect after the app returned to the foreground.
    Visibility,
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owns the live connection and drives the reconnect state machine.
pub struct ConnectionManager<C: Connector, S: Scheduler<TimerKind>> {
    connector: C,
    scheduler: S,
    codec: WireCodec<JsonCodec>,
    router: MessageRouter,
    observer: Box<dyn ConnectionObserver>,
    /// Handed to every transport opened, so its events reach our loop.
    events: EventSink,
    url: String,

    state: ConnectionState,
    policy: ReconnectPolicy,
    username: Option<Username>,

    /// Generation of the most recent handle. The next one is allocated from
    /// here, so a generation is never reused after a disconnect.
    generation: Generation,
    handle: Option<C::Handle>,

    backoff_timer: Option<TimerId>,
    visibility_timer: Option<TimerId>,

    /// Whether `chat_ready` has fired for this client.
    chat_ready: bool,
}

impl<C, S> ConnectionManager<C, S>
where
    C: Connector,
    S: Scheduler<TimerKind>,
{
    pub fn new(
        connector: C,
        scheduler: S,
        url: impl Into<String>,
        reconnect: ReconnectConfig,
        events: EventSink,
        router: MessageRouter,
        observer: impl ConnectionObserver,
    ) -> Self {
        Self {
            connector,
            scheduler,
            codec: WireCodec::json(),
            router,
            observer: Box::new(observer),
            events,
            url: url.into(),
            state: ConnectionState::Disconnected,
            policy: ReconnectPolicy::new(reconnect),
            username: None,
            generation: Generation::default(),
            handle: None,
            backoff_timer: None,
            visibility_timer: None,
            chat_ready: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts used since the last successful open.
    pub fn attempt(&self) -> u32 {
        self.policy.attempt()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    // -- User-initiated ----------------------------------------------------

    /// Starts a connection session as `username`.
    ///
    /// Any existing connection or pending timer is discarded first, and the
    /// attempt counter starts over: a user asking to connect is a fresh start,
    /// including after reconnection gave up.
    pub fn connect(&mut self, username: Username) {
        info!(%username, url = %self.url, "connect requested");
        self.cancel_timers();
        if self.state == ConnectionState::Open {
            self.observer.connectivity_changed(false);
        }
        self.policy.reset();
        self.username = Some(username);
        self.open_transport();
    }

    /// Ends the connection session. No reconnect will follow.
    ///
    /// The username is forgotten too, so a later visibility change does not
    /// bring the session back.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected && self.handle.is_none() {
            return;
        }
        info!(generation = %self.generation, state = %self.state, "disconnect requested");

        let was_open = self.state == ConnectionState::Open;
        self.cancel_timers();
        self.discard_handle();
        // Anything the old handle still reports is stale from here on.
        self.generation = self.generation.next();
        self.policy.reset();
        self.username = None;
        self.state = ConnectionState::Disconnected;

        if was_open {
            self.observer.connectivity_changed(false);
        }
    }

    /// Encodes and sends `intent` on the open connection.
    ///
    /// # Errors
    /// - [`ChatError::NotConnected`] unless the state is `Open`. Nothing is
    ///   queued and nothing touches the transport.
    /// - [`ChatError::Transport`] if the connection task already died; the
    ///   close event for it is on its way.
    pub fn send(&mut self, intent: OutboundIntent) -> Result<(), ChatError> {
        if self.state != ConnectionState::Open {
            debug!(kind = intent.kind(), state = %self.state, "send rejected, not connected");
            return Err(ChatError::NotConnected);
        }
        let handle = self.handle.as_ref().ok_or(ChatError::NotConnected)?;
        let frame = self.codec.encode(&intent)?;
        handle.send(frame)?;
        trace!(kind = intent.kind(), generation = %self.generation, "sent");
        Ok(())
    }

    /// The app is visible again. Reconnects after a short fixed delay if we
    /// have a username and are neither open nor already connecting.
    ///
    /// Leaves the backoff counter alone.
    pub fn visibility_restored(&mut self) {
        if self.username.is_none()
            || matches!(self.state, ConnectionState::Open | ConnectionState::Connecting)
            || self.visibility_timer.is_some()
        {
            return;
        }
        let delay = self.policy.config().visibility_delay;
        debug!(delay_ms = delay.as_millis() as u64, state = %self.state, "visible again, scheduling reconnect");
        self.visibility_timer = Some(self.scheduler.schedule(delay, TimerKind::Visibility));
    }

    // -- Transport events --------------------------------------------------

    /// Applies one event reported by a transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let live = self.handle.as_ref().map(TransportHandle::generation);
        if live != Some(event.generation) {
            trace!(
                event_generation = %event.generation,
                current = %self.generation,
                "dropping event from stale transport"
            );
            return;
        }
        if event.kind.is_terminal() {
            // The transport is finished; a second report from it is stale.
            self.handle = None;
        }

        match event.kind {
            TransportEventKind::Opened => self.on_open(),
            TransportEventKind::Message(data) => self.on_frame(&data),
            TransportEventKind::Closed { reason } => {
                self.on_connection_lost(reason.as_deref().unwrap_or("closed"));
            }
            TransportEventKind::Failed(error) => self.on_connection_lost(&error),
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            warn!(state = %self.state, "transport opened in unexpected state");
            return;
        }
        let Some(username) = self.username.clone() else {
            // connect() always sets a username before opening.
            warn!("transport opened without a username, closing");
            self.discard_handle();
            self.state = ConnectionState::Disconnected;
            return;
        };

        self.state = ConnectionState::Open;
        self.policy.reset();
        info!(generation = %self.generation, %username, "connected");

        // Join goes out before anyone else gets a chance to send.
        if let Err(e) = self.send(OutboundIntent::Join { username }) {
            warn!(error = %e, "failed to send join");
        }

        self.observer.connectivity_changed(true);
        if !self.chat_ready {
            self.chat_ready = true;
            self.observer.chat_ready();
        }
    }

    fn on_frame(&mut self, data: &[u8]) {
        if self.state != ConnectionState::Open {
            debug!(state = %self.state, "frame before open, ignoring");
            return;
        }
        let event = self.codec.decode(data, self.scheduler.now_millis());
        self.router.dispatch(event);
    }

    fn on_connection_lost(&mut self, reason: &str) {
        let was_open = match self.state {
            ConnectionState::Open => true,
            ConnectionState::Connecting => false,
            // Already handled (a transport may report more than once).
            _ => return,
        };

        if was_open {
            self.observer.connectivity_changed(false);
        }

        match self.policy.next_delay() {
            Some(delay) => {
                self.state = ConnectionState::Reconnecting;
                self.backoff_timer = Some(self.scheduler.schedule(delay, TimerKind::Backoff));
                info!(
                    generation = %self.generation,
                    reason,
                    attempt = self.policy.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "connection lost, reconnecting"
                );
            }
            None => {
                self.state = ConnectionState::Closed;
                self.cancel_timers();
                let attempts = self.policy.attempt();
                warn!(reason, attempts, "reconnect attempts exhausted, giving up");
                self.observer
                    .reconnect_exhausted(&ChatError::ReconnectExhausted { attempts });
            }
        }
    }

    // -- Timers ------------------------------------------------------------

    /// Applies one timer firing.
    pub fn handle_timer(&mut self, fired: Fired<TimerKind>) {
        match fired.event {
            TimerKind::Backoff => {
                if self.backoff_timer != Some(fired.id) {
                    trace!(id = %fired.id, "stale backoff timer");
                    return;
                }
                self.backoff_timer = None;
                if self.state == ConnectionState::Reconnecting {
                    self.open_transport();
                }
            }
            TimerKind::Visibility => {
                if self.visibility_timer != Some(fired.id) {
                    trace!(id = %fired.id, "stale visibility timer");
                    return;
                }
                self.visibility_timer = None;
                if self.username.is_none()
                    || matches!(self.state, ConnectionState::Open | ConnectionState::Connecting)
                {
                    return;
                }
                // This attempt replaces whatever backoff was pending.
                if let Some(id) = self.backoff_timer.take() {
                    self.scheduler.cancel(id);
                }
                self.open_transport();
            }
        }
    }

    // -- Internals ---------------------------------------------------------

    fn open_transport(&mut self) {
        self.discard_handle();
        self.generation = self.generation.next();
        self.state = ConnectionState::Connecting;
        debug!(
            generation = %self.generation,
            attempt = self.policy.attempt(),
            url = %self.url,
            "opening transport"
        );
        let handle = self
            .connector
            .open(&self.url, self.generation, self.events.clone());
        self.handle = Some(handle);
    }

    fn discard_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }

    fn cancel_timers(&mut self) {
        for id in [self.backoff_timer.take(), self.visibility_timer.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(id);
        }
    }
}
