//! External process supervision
//!
//! Owns the analysis process: spawns it with piped stdio, pumps stdout lines
//! into the [`LineQueue`] from a reader thread, logs stderr, writes commands to
//! stdin and tears the process down (`QUIT`, grace period, kill).

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use wait_timeout::ChildExt;

use crate::config::ProcessConfig;
use crate::error::{KioskError, Result};
use crate::protocol::QUIT_COMMAND;
use crate::queue::{LineQueue, RawLine};

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub executable: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn from_config(config: &ProcessConfig) -> Self {
        let mut spec = Self::new(config.executable.clone()).args(config.argv());
        spec.working_dir = config.working_dir.clone();
        // Unbuffered Python output, otherwise lines arrive in 4K bursts
        spec.env("PYTHONUNBUFFERED", "1")
    }
}

/// A successfully started process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Nothing to stop: never started, already exited, or already shut down
    NotRunning,
    /// Exited on its own within the grace period
    Graceful,
    /// Had to be killed
    Killed,
}

/// Where stdin commands go. The kiosk only needs this much of a supervisor.
pub trait CommandChannel {
    /// Write one command line; false when it could not be delivered
    fn send_command(&mut self, text: &str) -> bool;

    fn shutdown(&mut self, grace: Duration) -> ShutdownOutcome;
}

/// Called once per failed launch
pub type LaunchErrorHook = Box<dyn FnMut(&KioskError) + Send>;

pub struct ProcessSupervisor {
    queue: LineQueue,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    grace_period: Duration,
    on_launch_error: Option<LaunchErrorHook>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("pid", &self.pid())
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new(queue: LineQueue, grace_period: Duration) -> Self {
        Self {
            queue,
            child: None,
            stdin: None,
            grace_period,
            on_launch_error: None,
        }
    }

    pub fn with_launch_error_hook(mut self, hook: LaunchErrorHook) -> Self {
        self.on_launch_error = Some(hook);
        self
    }

    pub fn queue(&self) -> &LineQueue {
        &self.queue
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the process and start pumping its output.
    pub fn start(&mut self, spec: &ProcessSpec) -> Result<ProcessHandle> {
        if self.is_alive() {
            let pid = self.pid().unwrap_or_default();
            warn!(pid, "analysis process already running, start rejected");
            return Err(KioskError::AlreadyRunning { pid });
        }
        // Previous process exited on its own
        self.child = None;
        self.stdin = None;

        match self.spawn(spec) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                error!(executable = %spec.executable, error = %err, "failed to start analysis process");
                if let Some(hook) = self.on_launch_error.as_mut() {
                    hook(&err);
                }
                Err(err)
            }
        }
    }

    fn spawn(&mut self, spec: &ProcessSpec) -> Result<ProcessHandle> {
        let mut cmd = Command::new(&spec.executable);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| KioskError::LaunchFailed {
            executable: spec.executable.clone(),
            reason: e.to_string(),
        })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            (None, _) => return Err(abandon(child, "stdout")),
            (_, None) => return Err(abandon(child, "stderr")),
        };

        let queue = self.queue.clone();
        let readers = thread::Builder::new()
            .name("kiosk-stdout".into())
            .spawn(move || {
                let result = pump_lines(stdout, |line| queue.push(RawLine::new(line)));
                if let Err(e) = result {
                    warn!(error = %e, "stdout reader stopped");
                }
                debug!("stdout closed");
            })
            .and_then(|_| {
                thread::Builder::new()
                    .name("kiosk-stderr".into())
                    .spawn(move || {
                        let result = pump_lines(stderr, |line| warn!(target: "oracle", "{}", line));
                        if let Err(e) = result {
                            warn!(error = %e, "stderr reader stopped");
                        }
                    })
            });
        if let Err(e) = readers {
            kill_and_reap(&mut child);
            return Err(KioskError::Io(e));
        }

        let handle = ProcessHandle {
            pid: child.id(),
            started_at: Instant::now(),
        };
        info!(pid = handle.pid, executable = %spec.executable, args = ?spec.args, "analysis process started");

        self.stdin = child.stdin.take();
        self.child = Some(child);
        Ok(handle)
    }

    /// Stop the process: `QUIT`, close stdin, wait `grace`, then kill.
    ///
    /// Safe to call any number of times.
    pub fn shutdown(&mut self, grace: Duration) -> ShutdownOutcome {
        let Some(mut child) = self.child.take() else {
            return ShutdownOutcome::NotRunning;
        };

        if let Ok(Some(status)) = child.try_wait() {
            info!(%status, "analysis process had already exited");
            self.stdin = None;
            return ShutdownOutcome::NotRunning;
        }

        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = writeln!(stdin, "{}", QUIT_COMMAND).and_then(|_| stdin.flush()) {
                debug!(error = %e, "could not deliver QUIT");
            }
            // Dropping stdin closes the pipe
        }

        match child.wait_timeout(grace) {
            Ok(Some(status)) => {
                info!(%status, "analysis process exited");
                ShutdownOutcome::Graceful
            }
            Ok(None) => {
                warn!(grace_ms = grace.as_millis() as u64, "analysis process ignored QUIT, killing");
                kill_and_reap(&mut child);
                ShutdownOutcome::Killed
            }
            Err(e) => {
                warn!(error = %e, "wait failed, killing analysis process");
                kill_and_reap(&mut child);
                ShutdownOutcome::Killed
            }
        }
    }

    pub fn send_command(&mut self, text: &str) -> bool {
        if !self.is_alive() {
            warn!(command = text, "analysis process not running, command dropped");
            return false;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            warn!(command = text, "stdin closed, command dropped");
            return false;
        };
        match writeln!(stdin, "{}", text).and_then(|_| stdin.flush()) {
            Ok(()) => {
                debug!(command = text, "command sent");
                true
            }
            Err(e) => {
                error!(command = text, error = %e, "failed to write command");
                false
            }
        }
    }
}

impl CommandChannel for ProcessSupervisor {
    fn send_command(&mut self, text: &str) -> bool {
        ProcessSupervisor::send_command(self, text)
    }

    fn shutdown(&mut self, grace: Duration) -> ShutdownOutcome {
        ProcessSupervisor::shutdown(self, grace)
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        let grace = self.grace_period;
        self.shutdown(grace);
    }
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed");
    }
    let _ = child.wait();
}

fn abandon(mut child: Child, stream: &'static str) -> KioskError {
    kill_and_reap(&mut child);
    KioskError::StreamUnavailable { stream }
}

/// Read `\n`-terminated lines until EOF, decoding lossily.
///
/// A trailing `\r` is stripped, blank lines are skipped and an unterminated
/// tail at EOF is dropped.
pub fn pump_lines<R: Read>(reader: R, mut on_line: impl FnMut(String)) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') {
            debug!(bytes = buf.len(), "dropping partial line at EOF");
            return Ok(());
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        on_line(line.into_owned());
    }
}
