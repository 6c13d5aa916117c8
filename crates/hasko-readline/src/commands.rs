//! REPL command parsing.
//!
//! Slash commands drive session management; any other non-empty line is
//! sent as a chat message.

/// A parsed REPL input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/new` - create a thread and select it.
    New,
    /// `/chats` - list all threads.
    List,
    /// `/open <id>` - select a thread.
    Open(i64),
    /// `/rename <name>` - rename the selected thread.
    Rename(String),
    /// `/delete` - delete the selected thread (with confirmation).
    Delete,
    /// `/edit <index> <text>` - edit a user message and replay from there.
    Edit { index: usize, text: String },
    /// `/models` - list available models.
    Models,
    /// `/model <name>` - select a model.
    Model(String),
    /// `/help` - show command help.
    Help,
    /// `quit` / `exit`.
    Quit,
    /// Unrecognized slash command.
    Unknown(String),
    /// Plain chat message.
    Send(String),
}

/// Parses a line into a command. Returns `None` for empty input.
pub fn parse(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed == "quit" || trimmed == "exit" {
        return Some(Command::Quit);
    }

    if !trimmed.starts_with('/') {
        return Some(Command::Send(trimmed.to_string()));
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    let command = match name {
        "/new" => Command::New,
        "/chats" => Command::List,
        "/open" => match rest.parse::<i64>() {
            Ok(id) => Command::Open(id),
            Err(_) => Command::Unknown(trimmed.to_string()),
        },
        "/rename" => Command::Rename(rest.to_string()),
        "/delete" => Command::Delete,
        "/edit" => match rest.split_once(char::is_whitespace) {
            Some((index, text)) => match index.parse::<usize>() {
                Ok(index) => Command::Edit {
                    index,
                    text: text.trim().to_string(),
                },
                Err(_) => Command::Unknown(trimmed.to_string()),
            },
            None => Command::Unknown(trimmed.to_string()),
        },
        "/models" => Command::Models,
        "/model" if !rest.is_empty() => Command::Model(rest.to_string()),
        "/help" => Command::Help,
        _ => Command::Unknown(trimmed.to_string()),
    };
    Some(command)
}

/// The command names offered for completion.
pub fn command_names() -> Vec<String> {
    [
        "/new", "/chats", "/open", "/rename", "/delete", "/edit", "/models", "/model", "/help",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Help text printed by `/help`.
pub const HELP_TEXT: &str = "\
/new                start a new chat
/chats              list chats
/open <id>          open a chat
/rename <name>      rename the current chat
/delete             delete the current chat (asks for confirmation)
/edit <i> <text>    edit your message at index <i> and replay from there
/models             list available models
/model <name>       switch model
/help               show this help
quit                exit";
