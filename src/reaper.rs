//! Zombie process reaping.
//!
//! As PID 1, any orphaned descendant gets re-parented to us and must
//! be waited on so the kernel can release its pid slot. The reaper
//! drains everything that is reapable in one pass, which keeps
//! SIGCHLD coalescing correct: one signal, one drain of the whole
//! kernel queue.

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A child process collected by one pass of the reaper.
#[derive(Debug, Clone)]
pub struct ReapedProc {
    /// Pid of the reaped child.
    pub pid: i32,
    /// Raw wait status reported by the kernel.
    pub status: WaitStatus,
    /// Decoded exit status; signal deaths encode as 128 + signum.
    pub exit_status: i32,
}

/// Serialized reaper for everything the kernel re-parents to us.
///
/// The reaper never subscribes to SIGCHLD itself; the supervisor
/// invokes it. At most one waitpid loop is in flight: a concurrent
/// caller serializes behind the first and then finds the kernel
/// queue already drained.
pub struct ZombieReaper {
    lock: Mutex<()>,
}

impl ZombieReaper {
    /// Create a new reaper.
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// Drain every currently reapable child of this process.
    pub async fn reap(&self) -> Vec<ReapedProc> {
        let _guard = self.lock.lock().await;

        let mut reaped = Vec::new();
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status @ WaitStatus::Exited(pid, _))
                | Ok(status @ WaitStatus::Signaled(pid, _, _)) => {
                    debug!(pid = pid.as_raw(), status = ?status, "Reaped child");
                    reaped.push(ReapedProc {
                        pid: pid.as_raw(),
                        status,
                        exit_status: decode_exit_status(status),
                    });
                }
                Ok(_) => continue,
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(err) => {
                    warn!(error = %err, "waitpid failed, ending reap batch");
                    break;
                }
            }
        }
        reaped
    }
}

impl Default for ZombieReaper {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a wait status into the exit code a shell would report.
pub(crate) fn decode_exit_status(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, sig, _) => 128 + sig as i32,
        _ => 0,
    }
}
