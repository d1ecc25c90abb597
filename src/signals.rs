//! Signal subscription for the pump.

use crate::error::{Error, Result};
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Signals the pump subscribes to.
///
/// SIGCHLD triggers reaping; everything else is forwarded to the
/// managed services. SIGKILL and SIGSTOP cannot be caught, so they
/// are left out of the subscription. SIGURG is left out as well:
/// async runtimes are known to consume it internally.
pub(crate) const LISTENED_SIGNALS: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGILL,
    Signal::SIGTRAP,
    Signal::SIGABRT,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGUSR1,
    Signal::SIGSEGV,
    Signal::SIGUSR2,
    Signal::SIGPIPE,
    Signal::SIGALRM,
    Signal::SIGTERM,
    Signal::SIGSTKFLT,
    Signal::SIGCHLD,
    Signal::SIGCONT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGWINCH,
    Signal::SIGIO,
    Signal::SIGPWR,
    Signal::SIGSYS,
];

/// Subscribe to every listened signal, forwarding each delivery into
/// `tx` from a dedicated task.
///
/// Returns the forwarder task handles so the supervisor can abort
/// them during teardown; aborting drops the signal streams, which
/// unregisters the kernel handlers.
pub(crate) fn subscribe(tx: mpsc::Sender<Signal>) -> Result<Vec<JoinHandle<()>>> {
    let mut forwarders = Vec::with_capacity(LISTENED_SIGNALS.len());
    for &sig in LISTENED_SIGNALS {
        let mut stream =
            signal(SignalKind::from_raw(sig as i32)).map_err(|source| Error::SignalSubscribe {
                signal: sig as i32,
                source,
            })?;
        let tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).await.is_err() {
                    break;
                }
            }
        }));
    }
    Ok(forwarders)
}
