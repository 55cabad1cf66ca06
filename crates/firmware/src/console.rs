//! Command surface
//!
//! A small command table bound to the session, network and startup status:
//!
//! | command               | effect                                   |
//! |-----------------------|------------------------------------------|
//! | `start`               | start the session on the console task    |
//! | `stop`                | stop the session on a new `stop` task    |
//! | `text <message>`      | send a text message; no message is a no-op |
//! | `wifi <ssid> [password]` | switch networks                       |
//! | `i`                   | print system status                      |
//! | `help`                | list commands                            |
//!
//! The line editor itself belongs to the host; [`Console::run`] is a plain
//! read/dispatch/print loop over any `BufRead`/`Write` pair.

use std::io::{BufRead, Write};
use std::sync::Arc;

use platform::ThreadBudget;
use tracing::warn;

use crate::lifecycle::StartupLog;
use crate::media::PlatformError;
use crate::network::{NetworkError, NetworkJoin};
use crate::session::{SessionController, SessionError};
use crate::tasks::{SpawnError, TaskFactory, TaskHandle};

/// Task name for the read/dispatch loop
pub const CONSOLE_TASK: &str = "console";

/// REPL settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Prompt printed before each line
    pub prompt: &'static str,
    /// Stack for the console task
    pub task_stack_bytes: u32,
    /// Priority for the console task
    pub task_priority: u8,
    /// Longest accepted command line in bytes
    pub max_line_len: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "esp>",
            task_stack_bytes: 10 * 1024,
            task_priority: 22,
            max_line_len: 1024,
        }
    }
}

impl ConsoleConfig {
    /// Budget for the console task.
    pub const fn budget(&self) -> ThreadBudget {
        ThreadBudget::stack(self.task_stack_bytes).with_priority(self.task_priority)
    }
}

/// One registered command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command word
    pub name: &'static str,
    /// Help text
    pub help: &'static str,
}

/// Every command the console accepts
pub const COMMANDS: [CommandSpec; 6] = [
    CommandSpec {
        name: "start",
        help: "Start realtime voice chat",
    },
    CommandSpec {
        name: "stop",
        help: "Stop chat",
    },
    CommandSpec {
        name: "i",
        help: "Show system status",
    },
    CommandSpec {
        name: "wifi",
        help: "wifi <ssid> [password]",
    },
    CommandSpec {
        name: "text",
        help: "Send text message",
    },
    CommandSpec {
        name: "help",
        help: "List commands",
    },
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `text [message]`
    Text(Option<String>),
    /// `wifi <ssid> [password]`
    Wifi {
        /// Network name
        ssid: String,
        /// Passphrase
        password: Option<String>,
    },
    /// `i`
    Status,
    /// `help`
    Help,
}

/// A command line could not be executed.
#[derive(Debug, thiserror_no_std::Error)]
pub enum CommandError {
    /// Line longer than the configured maximum
    #[error("command line too long ({len} > {max} bytes)")]
    TooLong {
        /// Line length
        len: usize,
        /// Configured maximum
        max: usize,
    },
    /// First word is not a registered command
    #[error("unrecognized command `{0}`")]
    Unknown(String),
    /// `wifi` without an SSID
    #[error("usage: wifi <ssid> [password]")]
    MissingSsid,
    /// Session library refused
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Network stack refused
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// Worker task could not be created
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

impl Command {
    /// Parse one line. Blank lines parse to `None`.
    pub fn parse(line: &str, max_line_len: usize) -> Result<Option<Self>, CommandError> {
        if line.len() > max_line_len {
            return Err(CommandError::TooLong {
                len: line.len(),
                max: max_line_len,
            });
        }
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word {
            "" => return Ok(None),
            "start" => Self::Start,
            "stop" => Self::Stop,
            "i" => Self::Status,
            "help" => Self::Help,
            "text" => Self::Text((!rest.is_empty()).then(|| rest.to_owned())),
            "wifi" => {
                let mut args = rest.split_whitespace();
                let ssid = args.next().ok_or(CommandError::MissingSsid)?;
                Self::Wifi {
                    ssid: ssid.to_owned(),
                    password: args.next().map(str::to_owned),
                }
            }
            other => return Err(CommandError::Unknown(other.to_owned())),
        };
        Ok(Some(command))
    }
}

/// Result of one command
#[derive(Debug)]
pub enum Reply {
    /// Nothing to print
    Done,
    /// Work continues on a background task
    Spawned(TaskHandle<()>),
    /// Text for the operator
    Output(String),
}

/// Command dispatcher
pub struct Console {
    config: ConsoleConfig,
    session: SessionController,
    network: Arc<dyn NetworkJoin>,
    log: Arc<StartupLog>,
}

impl core::fmt::Debug for Console {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Console")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Console over the given collaborators.
    pub fn new(
        config: ConsoleConfig,
        session: SessionController,
        network: Arc<dyn NetworkJoin>,
        log: Arc<StartupLog>,
    ) -> Self {
        Self {
            config,
            session,
            network,
            log,
        }
    }

    /// REPL settings
    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Execute a parsed command.
    pub fn dispatch(&self, command: Command) -> Result<Reply, CommandError> {
        match command {
            Command::Start => {
                self.session.start_now()?;
                Ok(Reply::Done)
            }
            Command::Stop => Ok(Reply::Spawned(self.session.stop_async()?)),
            Command::Text(Some(text)) => {
                self.session.send_text(&text)?;
                Ok(Reply::Done)
            }
            Command::Text(None) => Ok(Reply::Done),
            Command::Wifi { ssid, password } => {
                self.network.connect(&ssid, password.as_deref())?;
                Ok(Reply::Done)
            }
            Command::Status => Ok(Reply::Output(self.status_line())),
            Command::Help => Ok(Reply::Output(help_text())),
        }
    }

    /// Parse and execute one line.
    pub fn execute(&self, line: &str) -> Result<Option<Reply>, CommandError> {
        match Command::parse(line, self.config.max_line_len)? {
            Some(command) => self.dispatch(command).map(Some),
            None => Ok(None),
        }
    }

    /// One-line system status.
    pub fn status_line(&self) -> String {
        let trace: Vec<&str> = self.log.visited().iter().map(|s| s.name()).collect();
        let codec = self
            .log
            .codec()
            .map_or_else(|| "pending".to_owned(), |c| c.to_string());
        format!(
            "state: {} | codec: {codec} | session: {} | trace: {}",
            self.log.current().map_or("none", |s| s.name()),
            self.session.poll(),
            trace.join(" > ")
        )
    }

    /// Read lines from `input` until end of input, executing each.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> std::io::Result<()> {
        let mut line = String::new();
        loop {
            write!(output, "{} ", self.config.prompt)?;
            output.flush()?;
            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }
            // The length limit applies to the command, not its terminator.
            match self.execute(line.trim_end_matches(['\r', '\n'])) {
                Ok(Some(Reply::Output(text))) => writeln!(output, "{text}")?,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "command failed");
                    writeln!(output, "error: {e}")?;
                }
            }
        }
    }

    /// Run the loop on its own task with the console budget.
    pub fn spawn<R, W>(
        self: Arc<Self>,
        tasks: &TaskFactory,
        input: R,
        output: W,
    ) -> Result<TaskHandle<std::io::Result<()>>, SpawnError>
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        tasks.spawn_with_budget(CONSOLE_TASK, self.config.budget(), move || {
            self.run(input, output)
        })
    }
}

fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|c| format!("{:<6} {}", c.name, c.help))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Installs the command surface on the device's terminal.
pub trait ConsoleHost {
    /// Start serving `console`, spawning through `tasks`.
    fn install(&mut self, console: Arc<Console>, tasks: &TaskFactory) -> Result<(), PlatformError>;
}
