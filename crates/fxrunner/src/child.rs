use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

use crate::console::ConsoleChannel;
use crate::spawn_plan::SpawnPlan;

/// Index of the dedicated structured-message stream in the child's stdio.
pub const EVENT_CHANNEL_FD: usize = 3;

pub enum StdioStream {
    Readable(Box<dyn Read + Send>),
    Writable(Box<dyn Write + Send>),
}

impl StdioStream {
    pub fn is_readable(&self) -> bool {
        matches!(self, StdioStream::Readable(_))
    }
}

impl std::fmt::Debug for StdioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StdioStream::Readable(_) => f.write_str("Readable"),
            StdioStream::Writable(_) => f.write_str("Writable"),
        }
    }
}

/// What process creation hands back, before anything about it is trusted.
#[derive(Debug, Default)]
pub struct RawProcessHandle {
    pub pid: Option<u32>,
    pub stdio: Vec<Option<StdioStream>>,
    pub child: Option<Child>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidHandle {
    MissingPid,
    TooFewStreams { found: usize },
    EventChannelNotReadable,
}

impl std::fmt::Display for InvalidHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidHandle::MissingPid => f.write_str("child process has no pid"),
            InvalidHandle::TooFewStreams { found } => write!(
                f,
                "child process exposes {found} stdio streams, expected at least {}",
                EVENT_CHANNEL_FD + 1
            ),
            InvalidHandle::EventChannelNotReadable => write!(
                f,
                "child process stdio[{EVENT_CHANNEL_FD}] is not a readable stream"
            ),
        }
    }
}

impl std::error::Error for InvalidHandle {}

/// Turns a raw creation-time handle into a [`ServerHandle`], or says why not.
pub fn validate_child(mut raw: RawProcessHandle) -> Result<ServerHandle, InvalidHandle> {
    let pid = raw.pid.ok_or(InvalidHandle::MissingPid)?;
    if raw.stdio.len() <= EVENT_CHANNEL_FD {
        return Err(InvalidHandle::TooFewStreams {
            found: raw.stdio.len(),
        });
    }
    let events = match raw.stdio[EVENT_CHANNEL_FD].take() {
        Some(StdioStream::Readable(r)) => r,
        _ => return Err(InvalidHandle::EventChannelNotReadable),
    };

    let mut stdio = raw.stdio.into_iter();
    let stdin = match stdio.next().flatten() {
        Some(StdioStream::Writable(w)) => Some(w),
        _ => None,
    };
    let mut next_reader = || match stdio.next().flatten() {
        Some(StdioStream::Readable(r)) => Some(r),
        _ => None,
    };
    let stdout = next_reader();
    let stderr = next_reader();

    Ok(ServerHandle {
        pid,
        stdin,
        stdout,
        stderr,
        events: Some(events),
        child: raw.child,
        exit_status: None,
        exited: false,
    })
}

/// A validated server process. At most one exists per supervised instance.
pub struct ServerHandle {
    pid: u32,
    stdin: Option<Box<dyn Write + Send>>,
    stdout: Option<Box<dyn Read + Send>>,
    stderr: Option<Box<dyn Read + Send>>,
    events: Option<Box<dyn Read + Send>>,
    child: Option<Child>,
    exit_status: Option<ExitStatus>,
    exited: bool,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("pid", &self.pid)
            .field("exited", &self.exited)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

impl ServerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Validity predicate: false once the process has exited.
    pub fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.exit_status = Some(status);
                self.exited = true;
                false
            }
            Err(_) => {
                self.exited = true;
                false
            }
        }
    }

    /// For handles without an owned [`Child`], exit is reported by the caller.
    pub fn mark_exited(&mut self) {
        self.exited = true;
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.stderr.take()
    }

    pub fn take_events(&mut self) -> Option<Box<dyn Read + Send>> {
        self.events.take()
    }

    pub fn take_console(&mut self) -> Option<ConsoleChannel<Box<dyn Write + Send>>> {
        self.stdin.take().map(ConsoleChannel::new)
    }

    pub fn kill(&mut self) -> Result<()> {
        if let Some(child) = self.child.as_mut() {
            child.kill().context("kill server process")?;
            let status = child.wait().context("wait server process after kill")?;
            self.exit_status = Some(status);
        }
        self.exited = true;
        Ok(())
    }
}

/// Starts the server described by `plan`. stdin/stdout/stderr are piped; on
/// unix the child also gets a write-only pipe on fd 3 for structured events.
pub fn spawn_server(plan: &SpawnPlan) -> Result<RawProcessHandle> {
    let mut cmd = Command::new(&plan.executable);
    cmd.args(&plan.argv);
    cmd.current_dir(&plan.data_path);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let (mut child, events) = spawn_with_event_channel(cmd)
        .with_context(|| format!("spawn server: {}", plan.executable))?;
    tracing::info!(pid = child.id(), "server process spawned");

    let mut stdio: Vec<Option<StdioStream>> = Vec::with_capacity(EVENT_CHANNEL_FD + 1);
    stdio.push(
        child
            .stdin
            .take()
            .map(|w| StdioStream::Writable(Box::new(w))),
    );
    stdio.push(
        child
            .stdout
            .take()
            .map(|r| StdioStream::Readable(Box::new(r))),
    );
    stdio.push(
        child
            .stderr
            .take()
            .map(|r| StdioStream::Readable(Box::new(r))),
    );
    if let Some(events) = events {
        stdio.push(Some(StdioStream::Readable(events)));
    }

    Ok(RawProcessHandle {
        pid: Some(child.id()),
        stdio,
        child: Some(child),
    })
}

#[cfg(unix)]
fn spawn_with_event_channel(mut cmd: Command) -> Result<(Child, Option<Box<dyn Read + Send>>)> {
    use std::os::fd::{AsRawFd as _, FromRawFd as _, OwnedFd};
    use std::os::unix::process::CommandExt as _;

    let mut fds: [libc::c_int; 2] = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error()).context("create event pipe");
    }
    let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    for fd in [read_end.as_raw_fd(), write_end.as_raw_fd()] {
        if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            return Err(std::io::Error::last_os_error()).context("mark event pipe close-on-exec");
        }
    }

    let target = EVENT_CHANNEL_FD as libc::c_int;
    let write_raw = write_end.as_raw_fd();
    unsafe {
        cmd.pre_exec(move || {
            if write_raw == target {
                // dup2 onto itself keeps FD_CLOEXEC set.
                if libc::fcntl(target, libc::F_SETFD, 0) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
            } else if libc::dup2(write_raw, target) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn()?;
    drop(write_end);
    let reader: Box<dyn Read + Send> = Box::new(std::fs::File::from(read_end));
    Ok((child, Some(reader)))
}

#[cfg(not(unix))]
fn spawn_with_event_channel(mut cmd: Command) -> Result<(Child, Option<Box<dyn Read + Send>>)> {
    // No fd inheritance beyond stdio here; validation rejects the handle.
    let child = cmd.spawn()?;
    Ok((child, None))
}
