use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Operator console for a managed server process.
#[derive(Parser, Debug)]
#[command(name = "roam", version, about = "Operator console for a managed server", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Diagnostic log format (console, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a server process and attach the console to it
    Run(RunArgs),
    /// Feed a saved log file through the console
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Prefix for each line the process prints
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Hub channel the output is published on
    #[arg(long, value_name = "NAME")]
    pub channel: Option<String>,

    /// Command written to stdin to ask the server to stop
    #[arg(long, value_name = "CMD")]
    pub stop_command: Option<String>,

    /// Program and arguments to run
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub argv: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Log file to replay, one line per event
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Delay between lines
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub interval_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn run_takes_trailing_argv() {
        let cli = match Cli::try_parse_from([
            "roam",
            "--log-level",
            "debug",
            "run",
            "--prefix",
            "[Game]: ",
            "--",
            "java",
            "-jar",
            "server.jar",
        ]) {
            Ok(cli) => cli,
            Err(err) => panic!("parse: {err}"),
        };
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.prefix.as_deref(), Some("[Game]: "));
                assert_eq!(args.argv, vec!["java", "-jar", "server.jar"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn replay_defaults_interval() {
        let cli = match Cli::try_parse_from(["roam", "replay", "server.log"]) {
            Ok(cli) => cli,
            Err(err) => panic!("parse: {err}"),
        };
        match cli.command {
            Command::Replay(args) => {
                assert_eq!(args.file.to_str(), Some("server.log"));
                assert_eq!(args.interval_ms, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_command() {
        assert!(Cli::try_parse_from(["roam", "run"]).is_err());
    }
}
