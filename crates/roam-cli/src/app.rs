//! `roam run` and `roam replay`.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use roam_console::mock::MockBackend;
use roam_console::{ConsoleBackend, ConsoleEvent, ConsoleHandle, ConsoleService, LogHub};
use roam_runner::types::MESSAGE_EXITED;
use roam_runner::{ProcessBackend, ProcessSpec, RunnerOptions};

use crate::args::{Cli, Command, ReplayArgs, RunArgs};
use crate::config::{load_config, Config};
use crate::input::{parse_input, OperatorInput};
use crate::logging::{self, LogFormat, LogLevel};
use crate::render::ConsoleView;

const STOP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Parse `args`, run, and return the process exit code: 0 on success, 1 on
/// runtime failure, 2 on usage errors.
pub fn run_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 2 } else { 0 };
            let _ = err.print();
            return code;
        }
    };
    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let (mut cfg, used) = load_config(cli.config.as_deref()).context("load config")?;
    if let Some(level) = cli.log_level.as_deref().filter(|v| !v.trim().is_empty()) {
        cfg.logging.level = LogLevel::parse(level);
    }
    if let Some(format) = cli.log_format.as_deref().filter(|v| !v.trim().is_empty()) {
        cfg.logging.format = LogFormat::parse(format);
    }
    logging::init(cfg.logging.level, cfg.logging.format);
    if let Some(path) = used {
        debug!(path = %path.display(), "config loaded");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime.block_on(async move {
        match cli.command {
            Command::Run(args) => run_server(cfg, args).await,
            Command::Replay(args) => replay_file(cfg, args).await,
        }
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn run_server(mut cfg: Config, args: RunArgs) -> Result<()> {
    if let Some(prefix) = args.prefix {
        cfg.runner.prefix = prefix;
    }
    if let Some(channel) = args.channel.filter(|c| !c.trim().is_empty()) {
        cfg.runner.channel = Some(channel.trim().to_owned());
    }
    if let Some(stop_command) = args.stop_command.filter(|c| !c.trim().is_empty()) {
        cfg.runner.stop_command = Some(stop_command);
    }

    let mut spec = ProcessSpec::from_argv(&args.argv)?;
    if let Some(stop_command) = &cfg.runner.stop_command {
        spec = spec.with_stop_command(
            stop_command.clone(),
            Duration::from_millis(cfg.runner.stop_timeout_ms),
        );
    }

    let channel = cfg.log_channel().to_owned();
    let backend = Arc::new(ProcessBackend::new(
        LogHub::new(),
        RunnerOptions {
            channel: channel.clone(),
            prefix: cfg.runner.prefix.clone(),
            server_id: cfg.console.target.clone(),
        },
    ));
    let mut console_cfg = cfg.console.clone();
    console_cfg.log_channel = channel;
    // Subscribe before starting so the startup line is not missed.
    let mut console = ConsoleService::spawn(console_cfg, Arc::clone(&backend));
    let pid = backend.start(spec).await.context("start server process")?;
    info!(pid, "attached console");

    let mut view = ConsoleView::new(std::io::stdout());
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupt received");
                break;
            }
            event = console.next_event() => {
                let Some(event) = event else { break };
                view.on_event(&event)?;
                if is_exit_event(&event) {
                    break;
                }
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_input(&line, &console, &mut view).await? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    stdin_open = false;
                }
            },
        }
    }

    if backend.is_running() {
        backend.stop().await;
        drain_until_exit(&mut console, &mut view).await?;
    }
    console.shutdown();
    console.join().await;
    Ok(())
}

/// Returns false when the operator asked to quit.
async fn handle_input<W: Write>(
    line: &str,
    console: &ConsoleHandle,
    view: &mut ConsoleView<W>,
) -> Result<bool> {
    match parse_input(line) {
        OperatorInput::Command(command) => {
            console.submit(command).await?;
        }
        OperatorInput::Filter(channel) => {
            console.set_channel(channel)?;
            let snapshot = console.snapshot().await?;
            view.render_snapshot(&snapshot)?;
        }
        OperatorInput::Quit => return Ok(false),
        OperatorInput::Unknown(directive) => {
            view.note(&format!("unknown directive {directive}"))?;
        }
    }
    Ok(true)
}

fn is_exit_event(event: &ConsoleEvent) -> bool {
    match event {
        ConsoleEvent::Appended { records, .. } => {
            records.iter().any(|r| r.text() == MESSAGE_EXITED)
        }
        _ => false,
    }
}

async fn drain_until_exit<W: Write>(
    console: &mut ConsoleHandle,
    view: &mut ConsoleView<W>,
) -> Result<()> {
    let deadline = Instant::now() + STOP_DRAIN_TIMEOUT;
    loop {
        tokio::select! {
            event = console.next_event() => {
                let Some(event) = event else { return Ok(()) };
                view.on_event(&event)?;
                if is_exit_event(&event) {
                    return Ok(());
                }
            }
            _ = sleep_until(deadline) => return Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

async fn replay_file(cfg: Config, args: ReplayArgs) -> Result<()> {
    let lines = read_log_lines(&args.file)?;
    info!(file = %args.file.display(), lines = lines.len(), "replaying log");
    let view = ConsoleView::new(std::io::stdout());
    replay_lines(&cfg, lines, Duration::from_millis(args.interval_ms), view).await?;
    Ok(())
}

/// Read a log file, decoding invalid UTF-8 lossily.
pub fn read_log_lines(path: &Path) -> Result<Vec<String>> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_owned)
        .collect())
}

/// Publish `lines` through a hub into a fresh console with the server
/// offline, rendering events into `view` until every line was flushed.
pub async fn replay_lines<W: Write>(
    cfg: &Config,
    lines: Vec<String>,
    interval: Duration,
    mut view: ConsoleView<W>,
) -> Result<ConsoleView<W>> {
    let hub = LogHub::new();
    let backend = Arc::new(MockBackend::new().with_hub(hub.clone()).with_running(false));
    let console_cfg = cfg.console.normalized();
    let channel = console_cfg.log_channel.clone();
    let flush_interval = console_cfg.flush_interval();
    let expected = lines.len();
    let mut console = ConsoleService::spawn(console_cfg, backend);

    let feeder = tokio::spawn(async move {
        for line in lines {
            hub.publish(&channel, line);
            if !interval.is_zero() {
                sleep(interval).await;
            }
        }
    });

    let mut rendered = 0usize;
    while rendered < expected {
        let Some(event) = console.next_event().await else {
            break;
        };
        if let ConsoleEvent::Appended { records, .. } = &event {
            rendered += records.len();
        }
        view.on_event(&event)?;
    }
    if let Err(err) = feeder.await {
        warn!(error = %err, "replay feeder failed");
    }

    // Let a trailing progress update or expiry surface before stopping.
    sleep(flush_interval).await;
    while let Some(event) = console.try_next_event() {
        view.on_event(&event)?;
    }
    console.shutdown();
    console.join().await;
    Ok(view)
}
