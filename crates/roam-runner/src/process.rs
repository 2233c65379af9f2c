use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use roam_console::{BackendError, ConsoleBackend, LogHub, LogSubscription};

use crate::control::{pump_lines, write_line};
use crate::types::{
    command_sent_message, started_message, ProcessSpec, RunnerError, RunnerOptions,
    MESSAGE_EXITED, MESSAGE_FORCE_KILL, MESSAGE_STOPPED, MESSAGE_STOPPING,
};

struct Session {
    pid: u32,
    kill: CancellationToken,
    waiter: JoinHandle<()>,
    stop_command: Option<String>,
    stop_timeout: Duration,
}

/// A managed child process exposed as a console backend.
///
/// Output lines and lifecycle messages are published on the configured hub
/// channel. At most one process runs at a time.
pub struct ProcessBackend {
    hub: LogHub,
    options: RunnerOptions,
    running: Arc<AtomicBool>,
    stdin: Arc<AsyncMutex<Option<ChildStdin>>>,
    session: Mutex<Option<Session>>,
}

impl ProcessBackend {
    pub fn new(hub: LogHub, options: RunnerOptions) -> Self {
        Self {
            hub,
            options,
            running: Arc::new(AtomicBool::new(false)),
            stdin: Arc::new(AsyncMutex::new(None)),
            session: Mutex::new(None),
        }
    }

    pub fn hub(&self) -> &LogHub {
        &self.hub
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn pid(&self) -> Option<u32> {
        lock_session(&self.session).as_ref().map(|session| session.pid)
    }

    /// Spawn `spec` with piped stdio. Returns the child's pid.
    pub async fn start(&self, spec: ProcessSpec) -> Result<u32, RunnerError> {
        if spec.program.trim().is_empty() {
            return Err(RunnerError::MissingCommand);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(RunnerError::AlreadyRunning);
        }
        // A previous session that exited on its own still holds its waiter.
        let stale = lock_session(&self.session).take();
        if let Some(stale) = stale {
            if let Err(err) = stale.waiter.await {
                warn!(error = %err, "previous process waiter failed");
            }
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|err| RunnerError::Spawn(err.to_string()))?;
        let pid = child.id().unwrap_or_default();

        *self.stdin.lock().await = child.stdin.take();
        self.running.store(true, Ordering::SeqCst);
        info!(pid, program = %spec.program, "server process started");
        self.publish(started_message(pid));

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(
                stdout,
                self.hub.clone(),
                self.options.channel.clone(),
                self.options.prefix.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(
                stderr,
                self.hub.clone(),
                self.options.channel.clone(),
                self.options.prefix.clone(),
            )));
        }

        let kill = CancellationToken::new();
        let waiter = tokio::spawn(supervise(Supervisor {
            child,
            pumps,
            kill: kill.clone(),
            running: Arc::clone(&self.running),
            stdin: Arc::clone(&self.stdin),
            hub: self.hub.clone(),
            channel: self.options.channel.clone(),
        }));

        *lock_session(&self.session) = Some(Session {
            pid,
            kill,
            waiter,
            stop_command: spec.stop_command,
            stop_timeout: spec.stop_timeout,
        });
        Ok(pid)
    }

    /// Stop the process: ask politely when a stop command is configured,
    /// kill after the timeout. Returns once the exit was published. Calling
    /// it with nothing running is a no-op.
    pub async fn stop(&self) {
        let session = lock_session(&self.session).take();
        let Some(mut session) = session else {
            return;
        };

        if self.running.load(Ordering::SeqCst) {
            if let Some(stop_command) = session.stop_command.as_deref() {
                self.publish(MESSAGE_STOPPING);
                if self.write_command(stop_command).await.is_ok() {
                    match tokio::time::timeout(session.stop_timeout, &mut session.waiter).await {
                        Ok(joined) => {
                            if let Err(err) = joined {
                                warn!(error = %err, "process waiter failed");
                            }
                            self.publish(MESSAGE_STOPPED);
                            return;
                        }
                        Err(_) => self.publish(MESSAGE_FORCE_KILL),
                    }
                }
            }
        }

        session.kill.cancel();
        if let Err(err) = session.waiter.await {
            warn!(error = %err, "process waiter failed");
        }
    }

    async fn write_command(&self, command: &str) -> Result<(), RunnerError> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(RunnerError::StdinClosed);
        };
        write_line(stdin, command).await
    }

    fn publish(&self, line: impl Into<String>) {
        self.hub.publish(&self.options.channel, line);
    }
}

impl Drop for ProcessBackend {
    fn drop(&mut self) {
        if let Some(session) = lock_session(&self.session).take() {
            session.kill.cancel();
        }
    }
}

#[async_trait]
impl ConsoleBackend for ProcessBackend {
    fn subscribe(&self, channel: &str) -> LogSubscription {
        self.hub.subscribe(channel)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn send_command(&self, target: &str, command: &str) -> Result<(), BackendError> {
        if !target.is_empty() && !self.options.server_id.is_empty() && target != self.options.server_id
        {
            return Err(BackendError::UnknownTarget {
                target: target.to_owned(),
            });
        }
        let command = command.trim();
        if command.is_empty() {
            return Err(BackendError::EmptyCommand);
        }
        if !self.is_running() {
            return Err(BackendError::NotRunning);
        }
        match self.write_command(command).await {
            Ok(()) => {
                debug!(command, "command written to stdin");
                self.publish(command_sent_message(command));
                Ok(())
            }
            Err(RunnerError::StdinClosed) => Err(BackendError::NotRunning),
            Err(err) => Err(BackendError::Io(err.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervision
// ---------------------------------------------------------------------------

struct Supervisor {
    child: Child,
    pumps: Vec<JoinHandle<()>>,
    kill: CancellationToken,
    running: Arc<AtomicBool>,
    stdin: Arc<AsyncMutex<Option<ChildStdin>>>,
    hub: LogHub,
    channel: String,
}

async fn supervise(mut supervisor: Supervisor) {
    let status = tokio::select! {
        status = supervisor.child.wait() => status,
        _ = supervisor.kill.cancelled() => {
            if let Err(err) = supervisor.child.kill().await {
                warn!(error = %err, "failed to kill server process");
            }
            supervisor.child.wait().await
        }
    };

    // Output read before the exit is published ahead of the exit line.
    for pump in supervisor.pumps {
        if let Err(err) = pump.await {
            warn!(error = %err, "output pump failed");
        }
    }

    supervisor.running.store(false, Ordering::SeqCst);
    supervisor.stdin.lock().await.take();
    match status {
        Ok(status) => info!(code = ?status.code(), "server process exited"),
        Err(err) => warn!(error = %err, "failed to wait for server process"),
    }
    supervisor.hub.publish(&supervisor.channel, MESSAGE_EXITED);
}

fn lock_session(session: &Mutex<Option<Session>>) -> MutexGuard<'_, Option<Session>> {
    match session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
