use std::path::PathBuf;
use std::time::Duration;

use roam_console::SERVER_LOG_CHANNEL;

/// Prefix put in front of every stdout/stderr line of the managed process.
pub const DEFAULT_OUTPUT_PREFIX: &str = "[MC]: ";
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

pub const MESSAGE_STOPPING: &str = "\u{1f6d1} Stopping server...";
pub const MESSAGE_STOPPED: &str = "\u{2705} Server stopped gracefully";
pub const MESSAGE_FORCE_KILL: &str = "\u{26a0}\u{fe0f} Graceful shutdown timed out, force killing...";
pub const MESSAGE_EXITED: &str = "\u{1f6d1} Server exited.";

pub fn started_message(pid: u32) -> String {
    format!("\u{2705} Server started (PID: {pid})")
}

pub fn command_sent_message(command: &str) -> String {
    format!("\u{1f4bb} Command Sent: {command}")
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("command is required")]
    MissingCommand,
    #[error("server is already running")]
    AlreadyRunning,
    #[error("spawn process: {0}")]
    Spawn(String),
    #[error("stdin is closed")]
    StdinClosed,
    #[error("io: {0}")]
    Io(String),
}

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Written to stdin on `stop` before falling back to a kill.
    pub stop_command: Option<String>,
    pub stop_timeout: Duration,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stop_command: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Build from an argv list; the first entry is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self, RunnerError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(RunnerError::MissingCommand);
        };
        if program.trim().is_empty() {
            return Err(RunnerError::MissingCommand);
        }
        Ok(Self::new(program.trim()).with_args(args.iter().cloned()))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_stop_command(mut self, command: impl Into<String>, timeout: Duration) -> Self {
        self.stop_command = Some(command.into());
        self.stop_timeout = timeout;
        self
    }
}

/// Where and how output is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    pub channel: String,
    pub prefix: String,
    /// Target id accepted by `send_command`; an empty target always matches.
    pub server_id: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            channel: SERVER_LOG_CHANNEL.to_owned(),
            prefix: DEFAULT_OUTPUT_PREFIX.to_owned(),
            server_id: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{command_sent_message, started_message, ProcessSpec, RunnerError};

    #[test]
    fn argv_requires_a_program() {
        assert!(matches!(
            ProcessSpec::from_argv(&[]),
            Err(RunnerError::MissingCommand)
        ));
        assert!(matches!(
            ProcessSpec::from_argv(&["  ".to_owned()]),
            Err(RunnerError::MissingCommand)
        ));

        let spec = match ProcessSpec::from_argv(&["java".to_owned(), "-jar".to_owned()]) {
            Ok(spec) => spec,
            Err(err) => panic!("unexpected error: {err}"),
        };
        assert_eq!(spec.program, "java");
        assert_eq!(spec.args, vec!["-jar"]);
    }

    #[test]
    fn lifecycle_messages() {
        assert_eq!(started_message(42), "\u{2705} Server started (PID: 42)");
        assert_eq!(command_sent_message("list"), "\u{1f4bb} Command Sent: list");
    }
}
