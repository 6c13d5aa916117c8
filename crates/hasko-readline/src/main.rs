use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Editor;
use rustyline::{Context, Helper};

use hasko_core::chat::{ChatSession, SendOutcome, SessionEvent};
use hasko_infrastructure::{AppConfig, HaskoPaths, JsonChatStore};
use hasko_interaction::RelayClient;

mod commands;
mod render;

use commands::Command;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: commands::command_names(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Sets up tracing to a log file under the config directory so the REPL
/// output stays clean. Falls back to stderr when no log file can be opened.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_file = HaskoPaths::logs_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("hasko.log"))
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Consumes session events and prints them. Streamed reply snapshots are
/// cumulative, so only the suffix beyond what was already printed goes out.
async fn run_event_printer(mut rx: tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) {
    let mut printed = 0usize;

    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::ReplyStarted { .. } => {
                printed = 0;
                println!("{}", "hasko:".bright_magenta());
            }
            SessionEvent::ReplyChunk { text, .. } => {
                if let Some(delta) = text.get(printed..) {
                    print!("{}", delta.bright_blue());
                    let _ = std::io::stdout().flush();
                    printed = text.len();
                }
            }
            SessionEvent::ReplyFinished { text, .. } => {
                if let Some(delta) = text.get(printed..) {
                    if !delta.is_empty() {
                        print!("{}", delta.bright_blue());
                    }
                }
                println!();
                println!();
            }
            SessionEvent::ReplyAborted { .. } => {
                println!("{}", "(no response: request failed, see logs)".red());
            }
            SessionEvent::Notice(text) => {
                println!("{}", text.green());
            }
            SessionEvent::ThreadsChanged | SessionEvent::ViewChanged => {}
        }
    }
}

/// The main entry point for the Hasko chat REPL.
///
/// Sets up the chat store, the relay client and the session manager, fetches
/// the model list once, then reads user input: slash commands manage
/// threads and models, plain lines are sent to the selected model with the
/// reply streamed back into the terminal.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // ===== Backend Initialization =====
    let config = AppConfig::load_or_default();
    let store = Arc::new(JsonChatStore::default_location()?);
    let client = Arc::new(RelayClient::new(
        config.backend_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let session = Arc::new(ChatSession::new(store, client));

    session.load().await?;
    let models = session.refresh_models().await;

    // Spawn the event printer before any command can emit
    let printer = tokio::spawn(run_event_printer(session.subscribe()));

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Hasko ===".bright_magenta().bold());
    println!(
        "{}",
        format!("Relay: {}", config.backend_url).bright_black()
    );
    if models.is_empty() {
        println!(
            "{}",
            "No models available - is the relay running? Sending is disabled.".yellow()
        );
    } else {
        println!(
            "{}",
            format!("Models: {} (selected: {})", models.join(", "), models[0]).bright_black()
        );
    }
    println!(
        "{}",
        "Type '/help' for commands, '/new' to start a chat, or 'quit' to exit.".bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        let line = match readline {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let Some(command) = commands::parse(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(&line);

        match command {
            Command::Quit => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Command::Help => {
                println!("{}", commands::HELP_TEXT.bright_black());
            }
            Command::New => match session.create_thread().await {
                Ok(id) => {
                    let name = session
                        .threads()
                        .await
                        .iter()
                        .find(|t| t.id == id)
                        .map(|t| t.name.clone())
                        .unwrap_or_default();
                    println!("{}", format!("Started {} (id {})", name, id).green());
                }
                Err(e) => eprintln!("{}", format!("Failed to create chat: {}", e).red()),
            },
            Command::List => {
                let threads = session.threads().await;
                if threads.is_empty() {
                    println!("{}", "No chats yet. '/new' starts one.".bright_black());
                }
                let selected = session.selected_thread_id().await;
                for thread in &threads {
                    println!(
                        "{}",
                        render::render_thread_line(thread, selected == Some(thread.id))
                    );
                }
            }
            Command::Open(id) => {
                let known = session.threads().await.iter().any(|t| t.id == id);
                if !known {
                    println!("{}", "No such chat id".bright_black());
                    continue;
                }
                session.select_thread(id).await;
                let view = session.view().await;
                if view.is_empty() {
                    println!("{}", "(empty chat)".bright_black());
                } else {
                    println!("{}", render::render_view(&view));
                }
            }
            Command::Rename(name) => match session.selected_thread_id().await {
                Some(id) => {
                    if let Err(e) = session.rename_thread(id, name).await {
                        eprintln!("{}", format!("Rename failed: {}", e).red());
                    }
                }
                None => println!("{}", "No chat selected".bright_black()),
            },
            Command::Delete => match session.selected_thread_id().await {
                Some(id) => {
                    let Some(name) = session.request_delete(id).await else {
                        continue;
                    };
                    let confirmed = matches!(
                        rl.readline(&format!("Delete '{}'? (y/N) ", name)),
                        Ok(answer) if answer.trim().eq_ignore_ascii_case("y")
                    );
                    if confirmed {
                        if let Err(e) = session.confirm_delete().await {
                            eprintln!("{}", format!("Delete failed: {}", e).red());
                        }
                    } else {
                        session.cancel_delete().await;
                        println!("{}", "Cancelled".bright_black());
                    }
                }
                None => println!("{}", "No chat selected".bright_black()),
            },
            Command::Models => {
                let models = session.models().await;
                if models.is_empty() {
                    println!("{}", "No models available".yellow());
                    continue;
                }
                let selected = session.selected_model().await;
                for model in &models {
                    let marker = if selected.as_deref() == Some(model) {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}", marker, model);
                }
            }
            Command::Model(name) => {
                if session.select_model(&name).await {
                    println!("{}", format!("Model set to {}", name).green());
                } else {
                    println!("{}", "Unknown model; '/models' lists them".bright_black());
                }
            }
            Command::Edit { index, text } => {
                dispatch_send(&session, SendKind::Edit { index, text }).await;
            }
            Command::Send(text) => {
                dispatch_send(&session, SendKind::Message(text)).await;
            }
            Command::Unknown(input) => {
                println!(
                    "{}",
                    format!("Unknown command '{}'; '/help' lists commands", input).bright_black()
                );
            }
        }
    }

    drop(session);
    printer.abort();
    Ok(())
}

enum SendKind {
    Message(String),
    Edit { index: usize, text: String },
}

/// Spawns a send or edit so the REPL stays responsive while the reply
/// streams. The busy flag is advisory only; it suppresses submissions but
/// is not a lock.
async fn dispatch_send(session: &Arc<ChatSession>, kind: SendKind) {
    if session.is_sending().await {
        println!(
            "{}",
            "A reply is still streaming; wait for it to finish.".yellow()
        );
        return;
    }

    let session = Arc::clone(session);
    tokio::spawn(async move {
        let outcome = match kind {
            SendKind::Message(text) => session.send_message(text).await,
            SendKind::Edit { index, text } => session.edit_message(index, text).await,
        };
        match outcome {
            Ok(SendOutcome::Ignored) => {
                println!(
                    "{}",
                    "Nothing sent: select a chat ('/new' or '/open') and a model first."
                        .bright_black()
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Send failed: {}", e);
                eprintln!("{}", format!("Send failed: {}", e).red());
            }
        }
    });
}
