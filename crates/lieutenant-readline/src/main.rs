//! Readline REPL front-end for Local Lieutenant.
//!
//! A thin presentation layer over the conversation core: it relays input
//! lines into the reducer and renders state snapshots as they are published,
//! printing assistant deltas as they stream in. The core never depends on
//! anything in this crate.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write as _;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::EnvFilter;

use lieutenant_core::instructions::ASSISTANT_SYSTEM_INSTRUCTION;
use lieutenant_core::{Conversation, ConversationState, MessageRole, Mode, SessionManager};
use lieutenant_interaction::GeminiClient;

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/mode assistant".to_string(),
                "/mode command".to_string(),
                "/clear".to_string(),
            ],
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

        if line.starts_with('/') {
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

/// Submits one line and renders snapshots until the turn settles.
///
/// Assistant deltas are printed incrementally by diffing the streamed
/// message's content against what has already been written.
async fn run_turn(conversation: Arc<Conversation>, text: String, mode: Mode) {
    let mut snapshots = conversation.subscribe();
    snapshots.borrow_and_update();

    let turn = {
        let conversation = conversation.clone();
        let text = text.clone();
        tokio::spawn(async move { conversation.submit(&text, mode).await })
    };

    let mut printed = 0usize;
    let mut stream_idx: Option<usize> = None;
    loop {
        if snapshots.changed().await.is_err() {
            break;
        }
        let state = snapshots.borrow_and_update().clone();

        if mode == Mode::Assistant {
            if stream_idx.is_none()
                && state.pending
                && state.last_message().map(|m| m.role) == Some(MessageRole::Model)
            {
                stream_idx = Some(state.transcript.len() - 1);
            }
            if let Some(idx) = stream_idx {
                if let Some(message) = state.transcript.get(idx) {
                    if message.content.len() > printed {
                        print!("{}", message.content[printed..].bright_blue());
                        let _ = std::io::stdout().flush();
                        printed = message.content.len();
                    }
                }
            }
        }

        if !state.pending {
            render_settled(&state, mode, stream_idx, printed);
            break;
        }
    }

    let _ = turn.await;
}

fn render_settled(
    state: &ConversationState,
    mode: Mode,
    stream_idx: Option<usize>,
    printed: usize,
) {
    match mode {
        Mode::Command => match state.last_message() {
            Some(message) if message.is_command => {
                println!(
                    "{}",
                    "Suggested command to run on your server:".bright_black()
                );
                println!("{}", format!("  $ {}", message.content).bright_yellow().bold());
            }
            Some(message) => println!("{}", message.content.red()),
            None => {}
        },
        Mode::Assistant => {
            if printed > 0 {
                println!();
            }
            if let Some(idx) = stream_idx {
                // An error notice lands after the streamed message.
                for message in state.transcript.iter().skip(idx + 1) {
                    println!("{}", message.content.red());
                }
            } else if let Some(message) = state.last_message() {
                if message.role == MessageRole::Model {
                    println!("{}", message.content.red());
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // ===== Backend Initialization =====
    let client = Arc::new(GeminiClient::try_from_env()?);
    let sessions = Arc::new(SessionManager::new(client.clone()));
    if let Err(err) = sessions.create(ASSISTANT_SYSTEM_INSTRUCTION).await {
        eprintln!("{}", format!("Could not start a chat session: {err}").red());
    }
    let conversation = Arc::new(Conversation::new(client, sessions));

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Local Lieutenant ===".bright_magenta().bold());
    println!(
        "{}",
        "Ask your Lieutenant anything, or describe a command to generate.".bright_black()
    );
    println!(
        "{}",
        "'/mode assistant|command' switches modes, '/clear' starts over, 'quit' exits.".bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let mode = conversation.snapshot().await.mode;
        let prompt = match mode {
            Mode::Assistant => "(assistant) >> ",
            Mode::Command => "(command) >> ",
        };

        let readline = rl.readline(prompt);

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if let Some(rest) = trimmed.strip_prefix("/mode") {
                    match rest.trim() {
                        "assistant" => conversation.set_mode(Mode::Assistant).await,
                        "command" => conversation.set_mode(Mode::Command).await,
                        _ => println!("{}", "Usage: /mode assistant|command".bright_black()),
                    }
                    continue;
                }

                if trimmed == "/clear" {
                    if let Err(err) = conversation.clear().await {
                        eprintln!(
                            "{}",
                            format!("Could not start a fresh session: {err}").red()
                        );
                    }
                    println!("{}", "Conversation cleared.".bright_black());
                    continue;
                }

                // Submit the line exactly as typed; trimming is only an
                // emptiness check.
                run_turn(conversation.clone(), line.clone(), mode).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Readline error: {err:?}").red());
                break;
            }
        }
    }

    Ok(())
}
