//! Terminal operator surface: command parsing, stdin prompts and the command loop.

use allowgate_application::{OperatorConfirmation, RemovalOutcome, SessionControls};
use allowgate_core::{AppError, AppResult};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

const HELP: &str = "commands: view <piano|admin>, add <uid>, remove <uid>, grant-self, whoami, list, help, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    View(String),
    Add(String),
    Remove(String),
    GrantSelf,
    WhoAmI,
    List,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (line, ""),
        };

        let command = match name {
            "view" if !argument.is_empty() => Self::View(argument.to_owned()),
            "add" => Self::Add(argument.to_owned()),
            "remove" if !argument.is_empty() => Self::Remove(argument.to_owned()),
            "view" | "remove" => {
                return Err(AppError::Validation(format!("usage: {name} <argument>")));
            }
            "grant-self" => Self::GrantSelf,
            "whoami" => Self::WhoAmI,
            "list" => Self::List,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => {
                return Err(AppError::Validation(format!(
                    "unknown command '{other}'; type 'help'"
                )));
            }
        };

        Ok(Some(command))
    }
}

/// Line-oriented stdin/stdout shared by the command loop and confirmation prompts.
pub struct TerminalConsole {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    stdout: Mutex<Stdout>,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }

    /// Reads the next line. `None` at end of input.
    pub async fn read_line(&self) -> AppResult<Option<String>> {
        self.lines
            .lock()
            .await
            .next_line()
            .await
            .map_err(|error| AppError::Internal(format!("failed to read stdin: {error}")))
    }

    pub async fn write(&self, text: &str) -> AppResult<()> {
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|error| AppError::Internal(format!("failed to write stdout: {error}")))?;
        stdout
            .flush()
            .await
            .map_err(|error| AppError::Internal(format!("failed to flush stdout: {error}")))
    }

    pub async fn write_line(&self, text: &str) -> AppResult<()> {
        self.write(&format!("{text}\n")).await
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorConfirmation for TerminalConsole {
    async fn confirm(&self, prompt: &str) -> bool {
        if let Err(error) = self.write(&format!("{prompt} [y/N] ")).await {
            warn!(error = %error, "confirmation prompt could not be shown");
            return false;
        }

        match self.read_line().await {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(error) => {
                warn!(error = %error, "confirmation answer could not be read");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Runs operator commands until `quit` or end of input.
pub async fn run_operator_loop(controls: &SessionControls, console: &TerminalConsole) -> AppResult<()> {
    console.write_line(HELP).await?;

    loop {
        console.write("> ").await?;
        let Some(line) = console.read_line().await? else {
            return Ok(());
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                console.write_line(error.message()).await?;
                continue;
            }
        };

        if command == Command::Quit {
            return Ok(());
        }

        let reply = execute(controls, command).await;
        console.write_line(&reply).await?;
    }
}

async fn execute(controls: &SessionControls, command: Command) -> String {
    match command {
        Command::View(view_id) => match controls.change_view(&view_id) {
            Ok(sub_view) => format!("Showing the {} view.", sub_view.as_str()),
            Err(error) => error.message().to_owned(),
        },
        Command::Add(raw_input) => controls.add_entry(&raw_input).await.message().to_owned(),
        Command::Remove(identity) => match controls.remove_entry(&identity).await {
            Ok(RemovalOutcome::Removed) => format!("User {identity} removed."),
            Ok(RemovalOutcome::Declined) => "Removal cancelled.".to_owned(),
            Err(error) => format!("Error removing user: {}", error.message()),
        },
        Command::GrantSelf => controls.grant_self_access().await.message().to_owned(),
        Command::WhoAmI => {
            let session = controls.current();
            let identity = session
                .identity
                .map(|identity| identity.to_string())
                .unwrap_or_else(|| "not loaded yet".to_owned());
            let stale = if session.stale { " (allow-list may be outdated)" } else { "" };
            format!(
                "Your user ID: {identity}\nAccess: {}{stale}",
                session.decision.label()
            )
        }
        Command::List => {
            let session = controls.current();
            if !session.decision.is_granted() {
                return "Only allowed users can view the allow-list.".to_owned();
            }
            if session.allow_list.is_empty() {
                return "No users in the allowed list yet.".to_owned();
            }
            session
                .allow_list
                .identities()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Help => HELP.to_owned(),
        Command::Quit => String::new(),
    }
}
