//! Process management utilities.
//!
//! Signal helpers used by the hypervisor lifecycle. They work on raw
//! pids so a process can be signalled from one thread while another
//! thread is blocked waiting on it.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Send SIGKILL to a process.
///
/// Returns true if the signal was sent successfully.
pub fn kill(pid: libc::pid_t) -> bool {
    unsafe { libc::kill(pid, libc::SIGKILL) == 0 }
}

/// Block until child `pid` has exited, without reaping it.
///
/// The pid stays reserved as a zombie until the caller reaps it (for
/// example with `Child::wait`), so it cannot be reused in between.
pub fn wait_exited(pid: libc::pid_t) -> std::io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data and only written by the kernel.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Shell-style exit code for a finished process.
///
/// Normal exits map to their status, signal deaths to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        -1
    }
}
