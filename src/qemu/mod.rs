//! QEMU hypervisor backend.
//!
//! [`Qemu`] owns one hypervisor process: it builds the [`Invocation`]
//! for a [`RunConfig`], runs QEMU in the foreground with the caller's
//! standard streams, and can kill it from another thread.
//!
//! ```text
//! NotStarted ──start()──► Running ──exit / stop()──► Terminated
//! ```

mod devices;
mod invocation;
mod render;

pub use devices::{Display, Drive, NetBackend, NetBackendKind, NetDevice, PortForward, Protocol, Serial};
pub use invocation::{Invocation, BRIDGED_MAC, NETDEV_ID, NIC_DRIVER, TAP_IFNAME};
pub use render::{Descriptor, Render};

use crate::config::{RunConfig, DEFAULT_HYPERVISOR};
use crate::error::{Error, Result};
use crate::process;
use parking_lot::Mutex;
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

/// Lifecycle state of a [`Qemu`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    /// `start` has not spawned a process yet.
    NotStarted,
    /// The hypervisor process is running.
    Running,
    /// The process exited or was killed.
    Terminated,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::NotStarted => write!(f, "not started"),
            VmState::Running => write!(f, "running"),
            VmState::Terminated => write!(f, "terminated"),
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: VmState,
    pid: Option<libc::pid_t>,
}

/// Handle to a single QEMU process.
///
/// One instance runs at most one process; launching again requires a
/// new instance.
#[derive(Debug)]
pub struct Qemu {
    binary: String,
    lifecycle: Mutex<Lifecycle>,
}

impl Default for Qemu {
    fn default() -> Self {
        Self::new()
    }
}

impl Qemu {
    /// Create a handle using `qemu-system-x86_64` from PATH.
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_HYPERVISOR)
    }

    /// Create a handle using a specific hypervisor binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            lifecycle: Mutex::new(Lifecycle {
                state: VmState::NotStarted,
                pid: None,
            }),
        }
    }

    /// Hypervisor binary this handle launches.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Current lifecycle state.
    pub fn state(&self) -> VmState {
        self.lifecycle.lock().state
    }

    /// Pid of the tracked process, if one was started.
    pub fn pid(&self) -> Option<libc::pid_t> {
        self.lifecycle.lock().pid
    }

    /// Build an unstarted command for `config`.
    ///
    /// The returned command is not tracked; [`Qemu::stop`] has no effect
    /// on processes spawned from it.
    pub fn command(&self, config: &RunConfig) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Invocation::build(config).into_args());
        cmd
    }

    /// Run the hypervisor in the foreground until it exits.
    ///
    /// Standard input, output and error are passed through. Failures are
    /// printed to stderr before being returned.
    pub fn start(&self, config: &RunConfig) -> Result<()> {
        {
            let lifecycle = self.lifecycle.lock();
            if lifecycle.state != VmState::NotStarted {
                return Err(Error::InvalidState {
                    expected: VmState::NotStarted.to_string(),
                    actual: lifecycle.state.to_string(),
                });
            }
        }

        let invocation = Invocation::build(config);
        let command_line = invocation.command_line(&self.binary);
        if let Err(e) = echo_command(&mut std::io::stdout(), config.verbose, &command_line) {
            tracing::warn!(error = %e, "failed to print command line");
        }
        tracing::debug!(command = %command_line, "launching hypervisor");

        let mut child = Command::new(&self.binary)
            .args(invocation.into_args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| {
                report(Error::Launch {
                    binary: self.binary.clone(),
                    source,
                })
            })?;

        let pid = child.id() as libc::pid_t;
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.state = VmState::Running;
            lifecycle.pid = Some(pid);
        }
        tracing::info!(pid = pid, "hypervisor started");

        // Mark terminated while the exited child still holds its pid, so a
        // concurrent stop() can never signal a recycled pid.
        if let Err(e) = process::wait_exited(pid) {
            tracing::warn!(pid = pid, error = %e, "waitid failed, reaping directly");
        }
        self.lifecycle.lock().state = VmState::Terminated;

        let status = child.wait()?;
        tracing::info!(pid = pid, exit_code = process::exit_code(status), "hypervisor exited");

        if status.success() {
            Ok(())
        } else {
            Err(report(Error::HypervisorExit(status)))
        }
    }

    /// Kill the running hypervisor with SIGKILL.
    ///
    /// No-op unless a process is running. Does not wait for it to exit
    /// and keeps the tracked pid, so only the first call has an effect.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != VmState::Running {
            return;
        }

        if let Some(pid) = lifecycle.pid {
            if process::kill(pid) {
                tracing::debug!(pid = pid, "sent SIGKILL to hypervisor");
            } else {
                tracing::warn!(pid = pid, "failed to signal hypervisor");
            }
        }
        lifecycle.state = VmState::Terminated;
    }
}

/// Print the command line when `verbose` is set.
fn echo_command(out: &mut impl Write, verbose: bool, command_line: &str) -> std::io::Result<()> {
    if verbose {
        writeln!(out, "{}", command_line)?;
    }
    Ok(())
}

/// Surface a launch error on stderr and hand it back.
fn report(err: Error) -> Error {
    tracing::error!(error = %err, "hypervisor launch failed");
    eprintln!("{}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_command_is_bound_to_binary() {
        let qemu = Qemu::with_binary("/opt/qemu/bin/qemu-system-x86_64");
        let config = RunConfig::default();
        let cmd = qemu.command(&config);

        assert_eq!(cmd.get_program(), "/opt/qemu/bin/qemu-system-x86_64");
        let args: Vec<_> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, Invocation::build(&config).into_args());
        assert_eq!(qemu.state(), VmState::NotStarted);
    }

    #[test]
    fn test_echo_command_only_when_verbose() {
        let line = Invocation::build(&RunConfig::default()).command_line("qemu-system-x86_64");

        let mut out = Vec::new();
        echo_command(&mut out, false, &line).unwrap();
        assert!(out.is_empty());

        echo_command(&mut out, true, &line).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", line));
    }

    #[test]
    fn test_stop_after_exit_is_noop() {
        let qemu = Qemu::with_binary("true");
        qemu.start(&RunConfig::default()).unwrap();
        let pid = qemu.pid();

        qemu.stop();
        assert_eq!(qemu.state(), VmState::Terminated);
        assert_eq!(qemu.pid(), pid);
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let qemu = Qemu::new();
        qemu.stop();
        qemu.stop();
        assert_eq!(qemu.state(), VmState::NotStarted);
        assert!(qemu.pid().is_none());
    }

    #[test]
    fn test_start_success() {
        let qemu = Qemu::with_binary("true");
        qemu.start(&RunConfig::default()).unwrap();
        assert_eq!(qemu.state(), VmState::Terminated);
        assert!(qemu.pid().is_some());
    }

    #[test]
    fn test_start_reports_exit_failure() {
        let qemu = Qemu::with_binary("false");
        let err = qemu.start(&RunConfig::default()).unwrap_err();
        assert!(matches!(err, Error::HypervisorExit(status) if status.code() == Some(1)));
        assert_eq!(qemu.state(), VmState::Terminated);
    }

    #[test]
    fn test_start_missing_binary() {
        let qemu = Qemu::with_binary("/nonexistent/qemu-system-x86_64");
        let err = qemu.start(&RunConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert_eq!(qemu.state(), VmState::NotStarted);
    }

    #[test]
    fn test_second_start_rejected() {
        let qemu = Qemu::with_binary("true");
        qemu.start(&RunConfig::default()).unwrap();
        let err = qemu.start(&RunConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_stop_kills_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-qemu");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let qemu = Arc::new(Qemu::with_binary(script.to_string_lossy()));
        let runner = {
            let qemu = Arc::clone(&qemu);
            std::thread::spawn(move || qemu.start(&RunConfig::default()))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while qemu.state() != VmState::Running {
            assert!(Instant::now() < deadline, "hypervisor never reached running");
            std::thread::sleep(Duration::from_millis(10));
        }

        let started = Instant::now();
        qemu.stop();
        let result = runner.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(result, Err(Error::HypervisorExit(_))));
        assert_eq!(qemu.state(), VmState::Terminated);

        // Tracked pid is kept; repeated stops do nothing
        assert!(qemu.pid().is_some());
        qemu.stop();
    }
}
