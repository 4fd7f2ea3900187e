//! Terminal client for a Keyroom server.
//!
//! Joins a channel, prints chat, joins and leaves, and sends every line
//! typed at the prompt as a chat message. Lines starting with `/` are
//! commands:
//! - `/name NAME`: change own name
//! - `/move X Y`: move the cursor
//! - `/play NOTE`: press and release a key, e.g. `/play c4`
//! - `/who`: list the participants of the channel
//! - `/quit`: leave
//!
//! Run with:
//! ```not_rust
//! cargo run --bin keyroom-client -- --name Alice
//! cargo run --bin keyroom-client -- -u ws://127.0.0.1:8080 -c lobby
//! ```

use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use keyroom_client::{
    ClientConfig, ClientEvent, EventDispatcher, InboundMessage, KeyroomClient,
    formatter::MessageFormatter, names,
};
use keyroom_shared::logger::setup_logger;

const PROMPT: &str = "> ";

/// Velocity of keys played with `/play`.
const PLAY_VELOCITY: f64 = 0.7;

/// How long a key played with `/play` is held down.
const PLAY_DURATION: Duration = Duration::from_millis(300);

#[derive(Parser, Debug)]
#[command(name = "keyroom-client")]
#[command(about = "Terminal client for a shared multiplayer piano", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Channel to join
    #[arg(short = 'c', long, default_value = "lobby")]
    channel: String,

    /// Name to use in the channel
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Access token sent with the handshake
    #[arg(long)]
    token: Option<String>,

    /// Origin header for the WebSocket upgrade request
    #[arg(long)]
    origin: Option<String>,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Say(String),
    Name(String),
    Move(f64, f64),
    Play(String),
    Who,
    Quit,
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Say(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        match (name, args.as_slice()) {
            ("name", [_, ..]) => Command::Name(args.join(" ")),
            ("move", [x, y]) => match (x.parse(), y.parse()) {
                (Ok(x), Ok(y)) => Command::Move(x, y),
                _ => Command::Invalid("usage: /move X Y (numbers)".to_string()),
            },
            ("play", [note]) => Command::Play(note.to_string()),
            ("who", []) => Command::Who,
            ("quit", []) => Command::Quit,
            _ => Command::Invalid(format!("unknown command: /{}", rest)),
        }
    }
}

/// Redisplay the prompt after printing a message
fn redisplay_prompt() {
    print!("{}", PROMPT);
    std::io::stdout().flush().ok();
}

fn print_with_prompt(text: &str) {
    print!("{}", text);
    redisplay_prompt();
}

/// Print the events a terminal user cares about.
fn register_printers(dispatcher: &EventDispatcher<ClientEvent>) {
    // Roster adds before the first `ch` are the initial member list
    let joined = Arc::new(AtomicBool::new(false));

    dispatcher.on(names::STATUS, |event| {
        if let ClientEvent::Status(status) = event {
            print_with_prompt(&MessageFormatter::format_status(status));
        }
    });

    let joined_on_disconnect = Arc::clone(&joined);
    dispatcher.on(names::DISCONNECT, move |event| {
        joined_on_disconnect.store(false, Ordering::SeqCst);
        if let ClientEvent::Disconnect(reason) = event {
            print_with_prompt(&MessageFormatter::format_disconnected(reason.as_deref()));
        }
    });

    let joined_on_channel = Arc::clone(&joined);
    dispatcher.on("ch", move |event| {
        if let ClientEvent::Message(InboundMessage::Channel(message)) = event {
            joined_on_channel.store(true, Ordering::SeqCst);
            print_with_prompt(&MessageFormatter::format_channel(
                &message.ch,
                &message.ppl,
                message.p.as_deref(),
            ));
        }
    });

    let joined_on_add = Arc::clone(&joined);
    dispatcher.on(names::PARTICIPANT_ADDED, move |event| {
        if let ClientEvent::ParticipantAdded(participant) = event
            && joined_on_add.load(Ordering::SeqCst)
        {
            print_with_prompt(&MessageFormatter::format_participant_joined(participant));
        }
    });

    dispatcher.on("bye", |event| {
        if let ClientEvent::Message(InboundMessage::Bye(bye)) = event {
            tracing::debug!("Participant '{}' left", bye.p);
        }
    });

    dispatcher.on(names::PARTICIPANT_REMOVED, |event| {
        if let ClientEvent::ParticipantRemoved(participant) = event {
            print_with_prompt(&MessageFormatter::format_participant_left(participant));
        }
    });

    dispatcher.on("a", |event| {
        if let ClientEvent::Message(InboundMessage::Chat(chat)) = event {
            print_with_prompt(&MessageFormatter::format_chat_message(
                &chat.p, &chat.a, chat.t,
            ));
        }
    });

    dispatcher.on("c", |event| {
        if let ClientEvent::Message(InboundMessage::ChatHistory(history)) = event {
            for chat in &history.c {
                print!(
                    "{}",
                    MessageFormatter::format_chat_message(&chat.p, &chat.a, chat.t)
                );
            }
            redisplay_prompt();
        }
    });

    dispatcher.on("notification", |event| {
        if let ClientEvent::Message(InboundMessage::Notification(notification)) = event {
            print_with_prompt(&MessageFormatter::format_notification(
                notification.title.as_deref(),
                notification.text.as_deref(),
            ));
        }
    });
}

/// Read lines on a blocking thread (rustyline is synchronous).
fn spawn_readline(input_tx: mpsc::UnboundedSender<String>) {
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });
}

async fn run(client: &KeyroomClient, mut input_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = input_rx.recv().await {
        let result = match Command::parse(&line) {
            Command::Say(text) => client.say(text),
            Command::Name(name) => client.set_name(name),
            Command::Move(x, y) => client.move_cursor(Some(x), Some(y)),
            Command::Play(note) => {
                let release = client.clone();
                let pitch = note.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(PLAY_DURATION).await;
                    if let Err(e) = release.stop_note(pitch) {
                        tracing::warn!("Failed to release key: {}", e);
                    }
                });
                client.start_note(note, PLAY_VELOCITY)
            }
            Command::Who => match client.snapshot().await {
                Ok(snapshot) => {
                    match &snapshot.channel {
                        Some(channel) => {
                            print!(
                                "{}",
                                MessageFormatter::format_channel(
                                    channel,
                                    &snapshot.participants,
                                    snapshot.participant_id.as_deref(),
                                )
                            );
                            print_with_prompt(&MessageFormatter::format_connection_info(
                                snapshot.connected_at,
                                snapshot.server_time_offset,
                            ));
                        }
                        None => print_with_prompt("\n(Not in a channel)\n"),
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Command::Quit => break,
            Command::Invalid(message) => {
                print_with_prompt(&format!("\n{}\n", message));
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::error!("Client error: {}", e);
            break;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let mut config = ClientConfig::new(args.url).with_channel(args.channel);
    if let Some(token) = args.token {
        config = config.with_token(token);
    }
    if let Some(origin) = args.origin {
        config = config.with_origin(origin);
    }

    let dispatcher = EventDispatcher::<ClientEvent>::new();
    register_printers(&dispatcher);

    let (client, engine) = KeyroomClient::spawn(config, Arc::new(dispatcher.clone()));

    // Set the name again after every handshake, including reconnects
    if let Some(name) = args.name {
        let renamer = client.clone();
        dispatcher.on("hi", move |_| {
            if let Err(e) = renamer.set_name(name.clone()) {
                tracing::warn!("Failed to set name: {}", e);
            }
        });
    }

    if let Err(e) = client.start() {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }

    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();
    spawn_readline(input_tx);
    run(&client, input_rx).await;

    if let Err(e) = client.shutdown() {
        tracing::warn!("Engine already stopped: {}", e);
    }
    if let Err(e) = engine.await {
        tracing::error!("Engine task failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_chat() {
        // テスト項目: スラッシュで始まらない行はチャットとして扱われる
        // given (前提条件):
        let line = "  hello there ";

        // when (操作):
        let command = Command::parse(line);

        // then (期待する結果):
        assert_eq!(command, Command::Say("hello there".to_string()));
    }

    #[test]
    fn test_commands_are_parsed() {
        // テスト項目: 各コマンドが正しく解釈される
        // given (前提条件):
        let lines = ["/name Alice B", "/move 10 42.5", "/play c4", "/who", "/quit"];

        // when (操作):
        let commands: Vec<Command> = lines.iter().map(|l| Command::parse(l)).collect();

        // then (期待する結果):
        assert_eq!(
            commands,
            vec![
                Command::Name("Alice B".to_string()),
                Command::Move(10.0, 42.5),
                Command::Play("c4".to_string()),
                Command::Who,
                Command::Quit,
            ]
        );
    }

    #[test]
    fn test_invalid_commands_are_reported() {
        // テスト項目: 不正なコマンドや引数はエラーメッセージになる
        // given (前提条件):
        let lines = ["/move a b", "/name", "/dance"];

        // when (操作):
        let commands: Vec<Command> = lines.iter().map(|l| Command::parse(l)).collect();

        // then (期待する結果):
        assert!(matches!(&commands[0], Command::Invalid(m) if m.starts_with("usage")));
        assert!(matches!(&commands[1], Command::Invalid(_)));
        assert!(matches!(&commands[2], Command::Invalid(m) if m.contains("/dance")));
    }
}
