//! `ChatClient` builder and event loop.
//!
//! This is the entry point for embedding a chat client. It ties together
//! all the layers: session bootstrap → transport → protocol → router.

use std::time::Duration;

use chatline_protocol::{MessageContent, OutboundIntent, Username};
use chatline_session::{SessionBootstrapper, SessionError, SessionId, StatsClient};
use chatline_timer::{Fired, ReconnectConfig, Scheduler, TokioScheduler};
use chatline_transport::{Connector, TransportEvent, WebSocketConnector};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use crate::manager::{ConnectionManager, ConnectionObserver, ConnectionState, TimerKind};
use crate::router::{MessageRouter, RenderHandler};
use crate::{ChatError, ClientConfig};

/// Requests from the [`ChatClient`] handle to its event loop.
enum Command {
    Connect {
        username: Username,
    },
    Send {
        content: MessageContent,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    VisibilityRestored,
    State {
        reply: oneshot::Sender<ConnectionState>,
    },
}

/// Builder for configuring and starting a [`ChatClient`].
///
/// # Example
///
/// ```rust,ignore
/// use chatline::prelude::*;
///
/// let mut client = ChatClient::builder()
///     .server_url("https://chat.example.com")?
///     .build(MyRenderer, MyObserver)?;
/// client.join("alice").await?;
/// client.send_message("hello").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatClientBuilder {
    config: ClientConfig,
}

impl ChatClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL of the chat server's HTTP API.
    ///
    /// # Errors
    /// [`ChatError::Config`] if `url` does not parse.
    pub fn server_url(mut self, url: &str) -> Result<Self, ChatError> {
        self.config.server_url = Url::parse(url)
            .map_err(|e| ChatError::Config(format!("invalid server url {url:?}: {e}")))?;
        Ok(self)
    }

    /// Sets the port of the live endpoint.
    pub fn ws_port(mut self, port: u16) -> Self {
        self.config.ws_port = port;
        self
    }

    /// Sets the reconnect configuration.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Sets the timeout applied to each HTTP request.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// Sets the limit for opening the live connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the client with the WebSocket transport.
    ///
    /// Must be called from within a Tokio runtime: the event loop is
    /// spawned immediately.
    pub fn build(
        self,
        renderer: impl RenderHandler,
        observer: impl ConnectionObserver,
    ) -> Result<ChatClient, ChatError> {
        let connector = WebSocketConnector::new(self.config.connect_timeout);
        self.build_with(connector, renderer, observer)
    }

    /// Builds the client with a custom transport. `connect_timeout` is the
    /// connector's business in this case.
    pub fn build_with<C: Connector>(
        self,
        connector: C,
        renderer: impl RenderHandler,
        observer: impl ConnectionObserver,
    ) -> Result<ChatClient, ChatError> {
        let config = self.config;
        let ws_url = config.websocket_url()?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(SessionError::from)?;
        let bootstrapper = SessionBootstrapper::new(http.clone(), &config.server_url)?;
        let stats = StatsClient::new(http, &config.server_url)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let manager = ConnectionManager::new(
            connector,
            TokioScheduler::new(timer_tx),
            ws_url.as_str(),
            config.reconnect,
            transport_tx,
            MessageRouter::new(renderer),
            observer,
        );

        tracing::debug!(server = %config.server_url, live = %ws_url, "chat client starting");
        let task = tokio::spawn(run(manager, command_rx, transport_rx, timer_rx));

        Ok(ChatClient {
            commands: command_tx,
            bootstrapper,
            stats,
            session: None,
            task,
        })
    }
}

/// Handle to a running chat client.
///
/// Dropping it stops the event loop and closes the connection.
pub struct ChatClient {
    commands: mpsc::UnboundedSender<Command>,
    bootstrapper: SessionBootstrapper,
    stats: StatsClient,
    session: Option<SessionId>,
    task: JoinHandle<()>,
}

impl ChatClient {
    /// Creates a new builder.
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }

    /// Joins the chat as `username`.
    ///
    /// Validates the name, asks the server for a session id, then starts the
    /// live connection. A failed bootstrap does not stop the join; it just
    /// yields `None`. Returns once the connect request is queued, not once the
    /// connection is open; watch [`ConnectionObserver`] for that.
    ///
    /// # Errors
    /// - [`ChatError::Validation`] for a bad username. Nothing is sent.
    /// - [`ChatError::ClientStopped`] if the event loop is gone.
    pub async fn join(&mut self, username: &str) -> Result<Option<SessionId>, ChatError> {
        let username = Username::parse(username)?;
        self.session = self.bootstrapper.create_session().await;
        self.commands
            .send(Command::Connect { username })
            .map_err(|_| ChatError::ClientStopped)?;
        Ok(self.session.clone())
    }

    /// Sends a chat message on the open connection.
    ///
    /// # Errors
    /// - [`ChatError::Validation`] for empty or oversized content.
    /// - [`ChatError::NotConnected`] if the connection is not open.
    ///   The message is not queued.
    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        let content = MessageContent::parse(text)?;
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { content, reply })
            .map_err(|_| ChatError::ClientStopped)?;
        rx.await.map_err(|_| ChatError::ClientStopped)?
    }

    /// Closes the connection. No reconnect follows.
    pub async fn disconnect(&self) -> Result<(), ChatError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply })
            .map_err(|_| ChatError::ClientStopped)?;
        rx.await.map_err(|_| ChatError::ClientStopped)
    }

    /// Tells the client the app is in the foreground again.
    pub fn visibility_restored(&self) -> Result<(), ChatError> {
        self.commands
            .send(Command::VisibilityRestored)
            .map_err(|_| ChatError::ClientStopped)
    }

    pub async fn state(&self) -> Result<ConnectionState, ChatError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::State { reply })
            .map_err(|_| ChatError::ClientStopped)?;
        rx.await.map_err(|_| ChatError::ClientStopped)
    }

    /// Session id from the last successful bootstrap, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// A handle for polling server statistics.
    ///
    /// Independent of the event loop, so it can be moved into its own task.
    pub fn stats_client(&self) -> StatsClient {
        self.stats.clone()
    }

    /// Disconnects and waits for the event loop to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::error!(error = %e, "chat client task failed");
        }
    }
}

/// The event loop. Owns the manager; runs until every [`ChatClient`]
/// handle is gone.
async fn run<C, S>(
    mut manager: ConnectionManager<C, S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut transport: mpsc::UnboundedReceiver<TransportEvent>,
    mut timers: mpsc::UnboundedReceiver<Fired<TimerKind>>,
) where
    C: Connector,
    S: Scheduler<TimerKind>,
{
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => apply(&mut manager, command),
                None => {
                    manager.disconnect();
                    break;
                }
            },
            Some(event) = transport.recv() => manager.handle_transport_event(event),
            Some(fired) = timers.recv() => manager.handle_timer(fired),
        }
    }
    tracing::debug!("chat client stopped");
}

fn apply<C, S>(manager: &mut ConnectionManager<C, S>, command: Command)
where
    C: Connector,
    S: Scheduler<TimerKind>,
{
    match command {
        Command::Connect { username } => manager.connect(username),
        Command::Send { content, reply } => {
            let _ = reply.send(manager.send(OutboundIntent::Send { content }));
        }
        Command::Disconnect { reply } => {
            manager.disconnect();
            let _ = reply.send(());
        }
        Command::VisibilityRestored => manager.visibility_restored(),
        Command::State { reply } => {
            let _ = reply.send(manager.state());
        }
    }
}
