//! WebSocket connector implementation using `tokio-tungstenite`.
//!
//! Each [`WebSocketConnector::open`] spawns one task that owns the socket.
//! The [`WebSocketHandle`] talks to that task through an unbounded channel,
//! so queuing a frame never blocks the caller.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Connector, EventSink, Generation, TransportError, TransportEvent,
    TransportEventKind, TransportHandle,
};

/// Instructions from the handle to the socket task.
#[derive(Debug)]
enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

/// A [`Connector`] that dials `ws://` or `wss://` URLs.
///
/// An attempt that has not completed the upgrade within `connect_timeout`
/// is reported as [`TransportEventKind::Failed`].
#[derive(Debug, Clone, Copy)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Default limit for TCP connect plus WebSocket upgrade.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WebSocketConnector {
    type Handle = WebSocketHandle;

    fn open(
        &mut self,
        url: &str,
        generation: Generation,
        events: EventSink,
    ) -> Self::Handle {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            url.to_string(),
            generation,
            self.connect_timeout,
            outgoing_rx,
            events,
        ));
        WebSocketHandle {
            generation,
            outgoing,
        }
    }
}

/// A single WebSocket connection, owned by the client.
///
/// Dropping the handle drops the channel, which closes the socket.
#[derive(Debug)]
pub struct WebSocketHandle {
    generation: Generation,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl TransportHandle for WebSocketHandle {
    fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.outgoing.send(Outgoing::Frame(data)).map_err(|_| {
            TransportError::ConnectionClosed(format!(
                "{} is no longer running",
                self.generation
            ))
        })
    }

    fn close(&self) {
        // The task may already be gone; nothing left to close then.
        let _ = self.outgoing.send(Outgoing::Close);
    }

    fn generation(&self) -> Generation {
        self.generation
    }
}

fn report(events: &EventSink, generation: Generation, kind: TransportEventKind) {
    // A closed receiver means the client has shut down.
    let _ = events.send(TransportEvent::new(generation, kind));
}

/// Chat servers expect JSON text frames; anything that is not UTF-8 goes
/// out as binary.
fn frame(data: Vec<u8>) -> Message {
    match String::from_utf8(data) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}

async fn run_socket(
    url: String,
    generation: Generation,
    connect_timeout: Duration,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: EventSink,
) {
    tracing::debug!(%generation, %url, "opening WebSocket");

    let connect = tokio::time::timeout(
        connect_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    );
    tokio::pin!(connect);
    // Frames queued before the upgrade finished go out right after it.
    let mut queued = Vec::new();

    let ws = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok(Ok((ws, _response))) => break ws,
                Ok(Err(e)) => {
                    let err = TransportError::ConnectFailed(e.to_string());
                    tracing::debug!(%generation, error = %err, "WebSocket connect failed");
                    report(&events, generation, TransportEventKind::Failed(err.to_string()));
                    return;
                }
                Err(_) => {
                    let err = TransportError::ConnectFailed(format!(
                        "no upgrade within {}ms",
                        connect_timeout.as_millis()
                    ));
                    tracing::debug!(%generation, error = %err, "WebSocket connect timed out");
                    report(&events, generation, TransportEventKind::Failed(err.to_string()));
                    return;
                }
            },
            out = outgoing.recv() => match out {
                Some(Outgoing::Frame(data)) => queued.push(data),
                Some(Outgoing::Close) | None => {
                    tracing::debug!(%generation, "WebSocket abandoned while connecting");
                    report(&events, generation, TransportEventKind::Closed { reason: None });
                    return;
                }
            },
        }
    };

    tracing::debug!(%generation, "WebSocket open");
    report(&events, generation, TransportEventKind::Opened);

    let (mut sink, mut stream) = ws.split();

    for data in queued {
        if let Err(e) = sink.send(frame(data)).await {
            let err = TransportError::SendFailed(e.to_string());
            report(&events, generation, TransportEventKind::Failed(err.to_string()));
            return;
        }
    }

    loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(Outgoing::Frame(data)) => {
                    if let Err(e) = sink.send(frame(data)).await {
                        let err = TransportError::SendFailed(e.to_string());
                        report(&events, generation, TransportEventKind::Failed(err.to_string()));
                        return;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = sink.close().await;
                    tracing::debug!(%generation, "WebSocket closed locally");
                    report(&events, generation, TransportEventKind::Closed { reason: None });
                    return;
                }
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    report(&events, generation, TransportEventKind::Message(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    report(&events, generation, TransportEventKind::Message(data.into()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty());
                    tracing::debug!(%generation, ?reason, "WebSocket closed by peer");
                    report(&events, generation, TransportEventKind::Closed { reason });
                    return;
                }
                None => {
                    report(&events, generation, TransportEventKind::Closed { reason: None });
                    return;
                }
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    let err = TransportError::ReceiveFailed(e.to_string());
                    report(&events, generation, TransportEventKind::Failed(err.to_string()));
                    return;
                }
            },
        }
    }
}
