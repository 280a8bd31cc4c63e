//! chatlink terminal client.
//!
//! Each stdin line is sent as a turn on the configured thread; streamed
//! replies are printed to stdout as they arrive. Lines starting with `/`
//! are commands: `/cancel`, `/thread <id>`, `/quit`.

mod config;
mod render;

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chatlink_connection::{ConfigUpdate, ConnectionSession, SessionCallbacks, SessionError};
use chatlink_protocol::{RequestFrame, ResponseEvent, Tool};

use crate::config::CliConfig;
use crate::render::{Output, ReplyRenderer};

/// CLI arguments. Flags override the configuration file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (default: $XDG_CONFIG_HOME/chatlink/cli.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base socket URI, e.g. wss://chat.example.com/ws
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Identity path segment
    #[arg(short, long)]
    identity: Option<String>,

    /// Conversation thread to join
    #[arg(short, long)]
    thread: Option<String>,

    /// Context category to attach to every turn (repeatable)
    #[arg(long = "context")]
    contexts: Vec<String>,

    /// Let the backend search the web
    #[arg(long)]
    web_search: bool,

    /// Send deep-research turns
    #[arg(long)]
    research: bool,
}

impl Args {
    fn apply(self, config: &mut CliConfig) {
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(identity) = self.identity {
            config.identity = identity;
        }
        if let Some(thread) = self.thread {
            config.thread_id = Some(thread);
        }
        if !self.contexts.is_empty() {
            config.contexts = self.contexts;
        }
        config.web_search |= self.web_search;
        config.research |= self.research;
    }
}

const DISCONNECTED_NOTICE: &str = "disconnected";

/// What the session callbacks hand to the printer.
enum UiEvent {
    Message(ResponseEvent),
    Notice(String),
}

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Turn(&'a str),
    Cancel,
    Thread(&'a str),
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Turn(line);
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(n, a)| (n, a.trim()));
    match name {
        "cancel" => Input::Cancel,
        "quit" | "exit" => Input::Quit,
        "thread" if !arg.is_empty() => Input::Thread(arg),
        _ => Input::Unknown(line),
    }
}

fn callbacks(ui: mpsc::UnboundedSender<UiEvent>) -> SessionCallbacks {
    let on_message = ui.clone();
    let on_error = ui.clone();
    let on_connect = ui.clone();
    let on_disconnect = ui.clone();
    SessionCallbacks::new()
        .on_message(move |event| {
            let _ = on_message.send(UiEvent::Message(event));
        })
        .on_error(move |error: SessionError| {
            let _ = on_error.send(UiEvent::Notice(format!("error: {error}")));
        })
        .on_connect(move || {
            let _ = on_connect.send(UiEvent::Notice("connected".into()));
        })
        .on_disconnect(move || {
            let _ = on_disconnect.send(UiEvent::Notice(DISCONNECTED_NOTICE.into()));
        })
        .on_retry_exhausted(move |attempts| {
            let _ = ui.send(UiEvent::Notice(format!(
                "gave up reconnecting after {attempts} attempts; send a message to retry"
            )));
        })
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<UiEvent>) {
    let mut renderer = ReplyRenderer::new();
    while let Some(event) = rx.recv().await {
        let outputs = match event {
            UiEvent::Message(event) => renderer.render(&event),
            UiEvent::Notice(text) => vec![Output::Status(text)],
        };
        for output in outputs {
            match output {
                Output::Reply(text) => {
                    let mut stdout = std::io::stdout().lock();
                    let _ = stdout.write_all(text.as_bytes());
                    let _ = stdout.flush();
                }
                Output::Status(text) => eprintln!("[{text}]"),
            }
        }
    }
}

fn build_turn(config: &CliConfig, message: &str) -> RequestFrame {
    let thread = config.thread_id.clone().unwrap_or_default();
    let mut frame = if config.research {
        RequestFrame::deep_research(thread, message)
    } else {
        RequestFrame::chat(thread, message)
    };
    frame = frame.with_contexts(config.contexts.iter().cloned());
    if config.web_search {
        frame = frame.with_tool(Tool::Web);
    }
    frame
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries reply text only.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = CliConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.endpoint,
        identity = %config.identity,
        thread = config.thread_id.as_deref().unwrap_or(""),
        "starting chatlink"
    );

    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(ui_rx));

    let session = ConnectionSession::new(config.session_config(), callbacks(ui_tx));
    session.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Turn(message) => session.send(build_turn(&config, message)),
            Input::Cancel => session.cancel(),
            Input::Thread(thread) => {
                config.thread_id = Some(thread.to_string());
                session.update_config(ConfigUpdate::new().thread_id(config.thread_id.clone()));
                session.disconnect();
                session.connect();
                tracing::info!(thread, "switched thread");
            }
            Input::Quit => break,
            Input::Unknown(line) => eprintln!("[unknown command: {line}]"),
        }
    }

    session.disconnect();
    drop(session);
    // The printer ends once the session's callbacks are dropped.
    let _ = printer.await;
    Ok(())
}
