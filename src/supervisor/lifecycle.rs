//! Server start: precondition checks, log preparation and spawning.

use super::Supervisor;
use crate::Result;
use crate::error::{LaunchError, PreconditionError};
use crate::pid_file;
use crate::probe::ProcessTable;
use crate::server::ServerDefinition;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::pin::pin;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::{select, time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum LaunchMode {
    /// Block until the server exits, teeing its output to the console and log
    Foreground,
    /// Detach the server and redirect its output into the log
    Background,
}

/// How the log file is opened for a new run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIs)]
pub enum LogMode {
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A live process was already recorded; nothing was spawned
    AlreadyRunning { pid: u32 },
    /// Background server still alive after the start check delay
    Started { pid: u32 },
    /// Background server exited before the start check delay elapsed
    ExitedEarly { pid: u32 },
    /// Foreground server ran to completion
    Exited { pid: u32, code: Option<i32> },
}

impl StartOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StartOutcome::AlreadyRunning { pid }
            | StartOutcome::Started { pid }
            | StartOutcome::ExitedEarly { pid }
            | StartOutcome::Exited { pid, .. } => *pid,
        }
    }
}

/// Makes room for a fresh log. The previous log is deleted so the new run
/// starts from an empty file; if it cannot be deleted (locked, permissions)
/// the new run appends to it instead.
pub fn prepare_log_file(path: &Path) -> LogMode {
    if let Some(parent) = path.parent()
        && let Err(e) = xx::file::mkdirp(parent)
    {
        warn!("could not create log directory {}: {e}", parent.display());
    }
    match std::fs::remove_file(path) {
        Ok(()) => LogMode::Truncate,
        Err(e) if e.kind() == io::ErrorKind::NotFound => LogMode::Truncate,
        Err(e) => {
            warn!(
                "could not remove old log {}: {e}; appending instead",
                path.display()
            );
            LogMode::Append
        }
    }
}

fn open_log(path: &Path, mode: LogMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        LogMode::Truncate => options.write(true).truncate(true),
        LogMode::Append => options.append(true),
    };
    options.open(path)
}

/// Puts the child in its own session so signals aimed at servman's process
/// group (terminal hangup, ctrl-c) do not reach it.
#[cfg(unix)]
fn detach(cmd: &mut Command) {
    // SAFETY: setsid() is async-signal-safe and touches no parent state
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(io::Error::from)
        });
    }
}

#[cfg(not(unix))]
fn detach(_cmd: &mut Command) {}

impl<T: ProcessTable> Supervisor<T> {
    /// Starts `server` unless it is already running.
    ///
    /// Precondition failures (missing directory, executable not on PATH) are
    /// returned as errors before anything is spawned.
    pub async fn start(
        &self,
        server: &ServerDefinition,
        mode: LaunchMode,
    ) -> Result<StartOutcome> {
        let key = &server.key;
        if !server.directory.is_dir() {
            return Err(PreconditionError::DirectoryNotFound {
                server: key.clone(),
                dir: server.directory.clone(),
            }
            .into());
        }
        if let Err(e) = which::which(&server.executable) {
            debug!("which {}: {e}", server.executable);
            return Err(PreconditionError::ExecutableNotFound {
                server: key.clone(),
                executable: server.executable.clone(),
            }
            .into());
        }

        if let Some(pid) = pid_file::read(&server.pid_file)
            && self.procs.is_alive(pid)
        {
            println!("[{key}] Already running (PID {pid})");
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        let log_mode = prepare_log_file(&server.log_file);
        let how = match mode {
            LaunchMode::Foreground => "in foreground",
            LaunchMode::Background => "in background",
        };
        println!("[{key}] Starting {how}...");
        println!("[{key}] Command: {}", server.display_command());
        println!("[{key}] Logs -> {}", server.log_file.display());

        match mode {
            LaunchMode::Background => self.start_background(server, log_mode).await,
            LaunchMode::Foreground => self.start_foreground(server, log_mode).await,
        }
    }

    fn command(&self, server: &ServerDefinition) -> Command {
        let mut cmd = Command::new(server.program());
        cmd.args(server.args())
            .current_dir(&server.directory)
            .kill_on_drop(false);
        cmd
    }

    fn spawn(&self, server: &ServerDefinition, cmd: &mut Command) -> Result<(Child, u32)> {
        debug!("spawning {}: {:?}", server.key, server.command);
        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            server: server.key.clone(),
            program: server.program().to_string(),
            source,
        })?;
        let pid = child.id().ok_or_else(|| LaunchError::NoPid {
            server: server.key.clone(),
        })?;
        pid_file::write(&server.pid_file, pid).map_err(|e| LaunchError::PidFile {
            server: server.key.clone(),
            path: server.pid_file.clone(),
            details: Some(e.to_string()),
        })?;
        Ok((child, pid))
    }

    async fn start_background(
        &self,
        server: &ServerDefinition,
        log_mode: LogMode,
    ) -> Result<StartOutcome> {
        let key = &server.key;
        let log_error = |source: io::Error| LaunchError::LogFile {
            server: key.clone(),
            path: server.log_file.clone(),
            source,
        };
        let stdout = open_log(&server.log_file, log_mode).map_err(log_error)?;
        let stderr = stdout.try_clone().map_err(log_error)?;

        let mut cmd = self.command(server);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));
        detach(&mut cmd);
        let (mut child, pid) = self.spawn(server, &mut cmd)?;

        // a single delayed check: servers that take longer than this to fail
        // are still reported as running
        time::sleep(self.settings.start_check_delay).await;
        match child.try_wait() {
            Ok(None) => {
                println!("[{key}] Running (PID {pid})");
                Ok(StartOutcome::Started { pid })
            }
            Ok(Some(status)) => {
                debug!("{key} exited early with {status}");
                println!("[{key}] Warning: process exited immediately. Check logs.");
                Ok(StartOutcome::ExitedEarly { pid })
            }
            Err(e) => {
                warn!("could not poll {key} (pid {pid}): {e}");
                Ok(StartOutcome::Started { pid })
            }
        }
    }

    async fn start_foreground(
        &self,
        server: &ServerDefinition,
        log_mode: LogMode,
    ) -> Result<StartOutcome> {
        let key = &server.key;
        let log_file =
            open_log(&server.log_file, log_mode).map_err(|source| LaunchError::LogFile {
                server: key.clone(),
                path: server.log_file.clone(),
                source,
            })?;

        let mut cmd = self.command(server);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let (mut child, pid) = self.spawn(server, &mut cmd)?;

        let mut log = BufWriter::new(tokio::fs::File::from_std(log_file));
        let status = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => {
                tee_output(key, stdout, stderr, &mut log).await;
                child.wait().await
            }
            _ => {
                error!("failed to capture output of {key}");
                child.wait().await
            }
        };
        if let Err(e) = log.flush().await {
            error!("failed to flush log for {key}: {e}");
        }

        if let Err(e) = pid_file::remove(&server.pid_file) {
            warn!("could not remove pid file {}: {e}", server.pid_file.display());
        }
        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                error!("failed waiting for {key}: {e}");
                None
            }
        };
        match code {
            Some(0) => println!("[{key}] Process exited cleanly"),
            Some(code) => println!("[{key}] Process exited with code {code}"),
            None => println!("[{key}] Process terminated by signal"),
        }
        Ok(StartOutcome::Exited { pid, code })
    }
}

/// Copies every line the child writes to the console and the log until both
/// streams close. Invalid UTF-8 is replaced rather than dropped.
async fn tee_output<W>(
    key: &str,
    stdout: impl AsyncRead + Unpin,
    stderr: impl AsyncRead + Unpin,
    log: &mut BufWriter<W>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_open = true;
    let mut err_open = true;
    // the child shares our terminal and gets the ctrl-c itself; keep teeing
    // until it exits so the pid file is cleaned up
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut interrupted = false;

    while out_open || err_open {
        let read = select! {
            r = stdout.read_until(b'\n', &mut out_buf), if out_open => (r, true),
            r = stderr.read_until(b'\n', &mut err_buf), if err_open => (r, false),
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                info!("interrupted, waiting for {key} to exit");
                continue;
            }
        };
        let (result, is_stdout) = read;
        let buf = if is_stdout { &mut out_buf } else { &mut err_buf };
        match result {
            Ok(0) => {
                if is_stdout {
                    out_open = false;
                } else {
                    err_open = false;
                }
            }
            Ok(_) => {
                let mut line = String::from_utf8_lossy(buf).into_owned();
                if !line.ends_with('\n') {
                    line.push('\n');
                }
                print!("{line}");
                if let Err(e) = log.write_all(line.as_bytes()).await {
                    error!("failed to write to log for {key}: {e}");
                }
            }
            Err(e) => {
                error!("failed reading output of {key}: {e}");
                if is_stdout {
                    out_open = false;
                } else {
                    err_open = false;
                }
            }
        }
        buf.clear();
    }
}
