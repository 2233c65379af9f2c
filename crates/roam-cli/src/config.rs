use std::path::{Path, PathBuf};

use serde::Deserialize;

use roam_console::{ConfigError, ConsoleConfig};
use roam_runner::DEFAULT_OUTPUT_PREFIX;

use crate::logging::{LogFormat, LogLevel};

pub const LOG_LEVEL_ENV: &str = "ROAM_LOG_LEVEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid console config: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub console: ConsoleConfig,
    pub logging: LoggingConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub prefix: String,
    /// Overrides the console's log channel for the runner's output.
    pub channel: Option<String>,
    pub stop_command: Option<String>,
    pub stop_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            logging: LoggingConfig {
                level: LogLevel::Info,
                format: LogFormat::Console,
            },
            runner: RunnerConfig {
                prefix: DEFAULT_OUTPUT_PREFIX.to_owned(),
                channel: None,
                stop_command: None,
                stop_timeout_ms: 10_000,
            },
        }
    }
}

impl Config {
    /// Channel the runner publishes on and the console subscribes to.
    pub fn log_channel(&self) -> &str {
        self.runner
            .channel
            .as_deref()
            .unwrap_or(&self.console.log_channel)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    console: PartialConsoleConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
    #[serde(default)]
    runner: PartialRunnerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConsoleConfig {
    scrollback_capacity: Option<usize>,
    flush_interval_ms: Option<u64>,
    staging_flush_threshold: Option<usize>,
    progress_idle_timeout_ms: Option<u64>,
    progress_completion_timeout_ms: Option<u64>,
    autoscroll_threshold: Option<u32>,
    prompt: Option<String>,
    log_channel: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialRunnerConfig {
    prefix: Option<String>,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    stop_command: String,
    #[serde(default)]
    stop_timeout_ms: u64,
}

/// Load config with precedence defaults < config file < `ROAM_LOG_LEVEL`.
///
/// An explicit path that cannot be read is an error; a missing file at the
/// default location is not.
pub fn load_config(config_file: Option<&Path>) -> Result<(Config, Option<PathBuf>), ConfigLoadError> {
    let (mut cfg, used) = load_config_file(config_file, default_config_path())?;
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        if !level.trim().is_empty() {
            cfg.logging.level = LogLevel::parse(&level);
        }
    }
    Ok((cfg, used))
}

fn load_config_file(
    explicit: Option<&Path>,
    fallback: Option<PathBuf>,
) -> Result<(Config, Option<PathBuf>), ConfigLoadError> {
    let mut cfg = Config::default();

    let explicit = explicit
        .filter(|path| !path.as_os_str().is_empty())
        .map(Path::to_path_buf);
    let required = explicit.is_some();
    let Some(path) = explicit.or(fallback) else {
        return Ok((cfg, None));
    };

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(source) if required => return Err(ConfigLoadError::Read { path, source }),
        Err(_) => return Ok((cfg, None)),
    };
    let partial: PartialConfig = if text.trim().is_empty() {
        PartialConfig::default()
    } else {
        serde_yaml::from_str(&text).map_err(|source| ConfigLoadError::Parse {
            path: path.clone(),
            source,
        })?
    };
    apply_partial(&mut cfg, partial);
    cfg.console = cfg.console.normalized();
    cfg.console.validate()?;
    Ok((cfg, Some(path)))
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("roam").join("config.yaml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(
                PathBuf::from(home)
                    .join(".config")
                    .join("roam")
                    .join("config.yaml"),
            );
        }
    }
    None
}

fn apply_partial(cfg: &mut Config, partial: PartialConfig) {
    let console = partial.console;
    let target = &mut cfg.console;
    if let Some(value) = console.scrollback_capacity {
        target.scrollback_capacity = value;
    }
    if let Some(value) = console.flush_interval_ms {
        target.flush_interval_ms = value;
    }
    if let Some(value) = console.staging_flush_threshold {
        target.staging_flush_threshold = value;
    }
    if let Some(value) = console.progress_idle_timeout_ms {
        target.progress_idle_timeout_ms = value;
    }
    if let Some(value) = console.progress_completion_timeout_ms {
        target.progress_completion_timeout_ms = value;
    }
    if let Some(value) = console.autoscroll_threshold {
        target.autoscroll_threshold = value;
    }
    if let Some(value) = console.prompt {
        target.prompt = value;
    }
    if let Some(value) = console.log_channel {
        target.log_channel = value.trim().to_owned();
    }
    if let Some(value) = console.target {
        target.target = value.trim().to_owned();
    }

    if !partial.logging.level.trim().is_empty() {
        cfg.logging.level = LogLevel::parse(&partial.logging.level);
    }
    if !partial.logging.format.trim().is_empty() {
        cfg.logging.format = LogFormat::parse(&partial.logging.format);
    }

    if let Some(prefix) = partial.runner.prefix {
        cfg.runner.prefix = prefix;
    }
    if !partial.runner.channel.trim().is_empty() {
        cfg.runner.channel = Some(partial.runner.channel.trim().to_owned());
    }
    if !partial.runner.stop_command.trim().is_empty() {
        cfg.runner.stop_command = Some(partial.runner.stop_command.trim().to_owned());
    }
    if partial.runner.stop_timeout_ms > 0 {
        cfg.runner.stop_timeout_ms = partial.runner.stop_timeout_ms;
    }
}
