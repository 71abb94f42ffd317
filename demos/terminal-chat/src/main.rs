use std::time::{Duration, Instant};

use chatline::prelude::*;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// How often server statistics are refreshed.
const STATS_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Join a Chatline chat room from the terminal.
#[derive(Debug, Parser)]
#[command(name = "terminal-chat", version)]
struct Args {
    /// Name shown to other participants (2-20 letters, digits, `_`, `-`, spaces).
    #[arg(short, long, env = "CHATLINE_USERNAME")]
    username: String,

    /// Base URL of the chat server's HTTP API.
    #[arg(long, env = "CHATLINE_SERVER_URL", default_value = chatline::DEFAULT_SERVER_URL)]
    server_url: String,

    /// Port of the server's WebSocket endpoint.
    #[arg(long, env = "CHATLINE_WS_PORT", default_value_t = chatline::DEFAULT_WS_PORT)]
    ws_port: u16,

    /// Automatic reconnect attempts before giving up.
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,

    /// More log output (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

struct Terminal {
    me: Username,
}

impl RenderHandler for Terminal {
    fn render_message(&mut self, m: &ChatMessage) {
        let who = if m.is_from(&self.me) { "you" } else { m.username.as_str() };
        println!("[{}] {who}: {}", clock_time(m.timestamp), m.content);
    }

    fn render_notification(&mut self, text: &str) {
        println!("* {text}");
    }
}

struct Status;

impl ConnectionObserver for Status {
    fn connectivity_changed(&mut self, connected: bool) {
        if connected {
            println!("* connected");
        } else {
            println!("* connection lost, reconnecting...");
        }
    }

    fn chat_ready(&mut self) {
        println!("* type a message and press enter, /help for commands");
    }

    fn reconnect_exhausted(&mut self, error: &ChatError) {
        eprintln!("* {error}");
        eprintln!("* /reconnect to try again, /quit to leave");
    }
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Say(String),
    Stats,
    State,
    Reconnect,
    Resume,
    Help,
    Quit,
    Unknown(String),
    Blank,
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line.to_owned());
        };
        match command {
            "stats" => Self::Stats,
            "state" => Self::State,
            "reconnect" => Self::Reconnect,
            "resume" => Self::Resume,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

const HELP: &str = "\
/stats      server statistics and uptime
/state      connection state
/reconnect  rejoin after the client gave up
/resume     reconnect shortly if the connection is down
/quit       leave";

/// `Xh Ym Zs`, dropping leading zero units.
fn format_uptime(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m {}s", minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

/// `HH:MM:SS` (UTC) of a millisecond Unix timestamp.
fn clock_time(timestamp_ms: u64) -> String {
    let secs = (timestamp_ms / 1000) % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

fn field(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

fn print_stats(stats: Option<&ServerStats>, uptime: Duration) {
    match stats {
        Some(s) => println!(
            "* threads {} | pool {} | queue {} | requests {} | up {}",
            field(s.active_threads),
            field(s.pool_size),
            field(s.queue_size),
            field(s.total_requests),
            format_uptime(uptime),
        ),
        None => println!("* no server stats yet | up {}", format_uptime(uptime)),
    }
}

/// Refreshes `latest` every `every` until nobody is watching.
///
/// Runs apart from the input loop so a slow server never holds up typing.
async fn poll_stats(
    stats: StatsClient,
    every: Duration,
    latest: watch::Sender<Option<ServerStats>>,
) {
    let mut poll = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = latest.closed() => break,
            _ = poll.tick() => match stats.fetch().await {
                Ok(fresh) => {
                    latest.send_replace(Some(fresh));
                }
                Err(e) => tracing::debug!(error = %e, "stats poll failed"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match args.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let me = Username::parse(&args.username)?;
    let reconnect = ReconnectConfig {
        max_attempts: args.max_attempts,
        ..ReconnectConfig::default()
    };
    let mut client = ChatClient::builder()
        .server_url(&args.server_url)?
        .ws_port(args.ws_port)
        .reconnect(reconnect)
        .build(Terminal { me: me.clone() }, Status)?;

    if let Some(session) = client.join(me.as_str()).await? {
        tracing::info!(%session, "joined");
    }

    let started = Instant::now();
    let (stats_tx, stats_rx) = watch::channel(None);
    tokio::spawn(poll_stats(client.stats_client(), STATS_INTERVAL, stats_tx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Say(text) => {
                if let Err(e) = client.send_message(&text).await {
                    eprintln!("* not sent: {e}");
                }
            }
            Input::Stats => print_stats(stats_rx.borrow().as_ref(), started.elapsed()),
            Input::State => println!("* {}", client.state().await?),
            Input::Reconnect => {
                client.join(me.as_str()).await?;
            }
            Input::Resume => client.visibility_restored()?,
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(command) => eprintln!("* unknown command /{command}, try /help"),
            Input::Blank => {}
        }
    }

    client.disconnect().await?;
    client.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0s");
        assert_eq!(format_uptime(Duration::from_millis(59_999)), "59s");
        assert_eq!(format_uptime(Duration::from_secs(61)), "1m 1s");
        assert_eq!(format_uptime(Duration::from_secs(3_600)), "1h 0m 0s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3_600 + 25 * 60 + 7)), "3h 25m 7s");
    }

    #[test]
    fn test_clock_time() {
        assert_eq!(clock_time(0), "00:00:00");
        assert_eq!(clock_time(1000), "00:00:01");
        // 2023-11-14T22:13:20Z
        assert_eq!(clock_time(1_700_000_000_000), "22:13:20");
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("  hello there "), Input::Say("hello there".into()));
        assert_eq!(Input::parse("   "), Input::Blank);
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert_eq!(Input::parse("/exit"), Input::Quit);
        assert_eq!(Input::parse("/stats"), Input::Stats);
        assert_eq!(Input::parse("/resume"), Input::Resume);
        assert_eq!(Input::parse("/dance"), Input::Unknown("dance".into()));
    }

    #[test]
    fn test_missing_stats_fields_render_as_dash() {
        assert_eq!(field(None), "-");
        assert_eq!(field(Some(0)), "0");
    }

    #[test]
    fn test_args_parse_with_defaults() {
        let args = Args::try_parse_from(["terminal-chat", "-u", "alice"]).unwrap();
        assert_eq!(args.username, "alice");
        assert_eq!(args.ws_port, chatline::DEFAULT_WS_PORT);
        assert_eq!(args.max_attempts, 5);
    }

    /// A client whose HTTP side points at `base`.
    fn client_for(base: &str) -> ChatClient {
        let me = Username::parse("tester").unwrap();
        ChatClient::builder()
            .server_url(base)
            .unwrap()
            .build(Terminal { me }, Status)
            .unwrap()
    }

    #[tokio::test]
    async fn test_poll_stats_publishes_latest() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let body = r#"{"activeThreads":2,"poolSize":8,"queueSize":0,"totalRequests":41}"#;
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        let client = client_for(&format!("http://{addr}"));
        let (tx, mut rx) = watch::channel(None);
        tokio::spawn(poll_stats(client.stats_client(), Duration::from_secs(60), tx));

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("first poll should publish")
            .unwrap();
        let stats = rx.borrow().clone().unwrap();
        assert_eq!(stats.active_threads, Some(2));
        assert_eq!(stats.total_requests, Some(41));
    }

    #[tokio::test]
    async fn test_poll_stats_stops_when_unwatched() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}"));
        let (tx, rx) = watch::channel(None);
        let poller = tokio::spawn(poll_stats(client.stats_client(), Duration::from_millis(20), tx));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), poller)
            .await
            .expect("poller should stop once nobody watches")
            .unwrap();
    }
}
