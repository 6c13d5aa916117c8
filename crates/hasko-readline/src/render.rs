//! Terminal rendering for chat history.
//!
//! Assistant output may contain fenced code blocks; those render in a
//! distinct color so code stands out from prose.

use colored::Colorize;
use hasko_core::chat::{ChatThread, Message};

/// Renders an assistant message, coloring fenced code blocks.
pub fn render_assistant(text: &str) -> String {
    let mut in_code = false;
    let mut lines = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
            lines.push(line.bright_black().to_string());
        } else if in_code {
            lines.push(line.cyan().to_string());
        } else {
            lines.push(line.bright_blue().to_string());
        }
    }
    lines.join("\n")
}

/// Renders the full message history of the active view, with indices so
/// `/edit <i> <text>` can address user messages.
pub fn render_view(messages: &[Message]) -> String {
    let mut out = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        if message.is_user {
            out.push(format!("{} {}", format!("[{}] you:", index).green(), message.text.green()));
        } else {
            out.push(format!(
                "{}\n{}",
                format!("[{}] hasko:", index).bright_magenta(),
                render_assistant(&message.text)
            ));
        }
    }
    out.join("\n")
}

/// Renders one line of the thread list.
pub fn render_thread_line(thread: &ChatThread, selected: bool) -> String {
    let marker = if selected { "*" } else { " " };
    format!(
        "{} {}  {}  {} ({} messages)",
        marker,
        thread.id.to_string().bright_black(),
        thread.name.bold(),
        thread.created_date.bright_black(),
        thread.messages.len()
    )
}
