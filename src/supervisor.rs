//! Top-level supervision: the signal pump, reap dispatch, and the
//! escalating shutdown sequence.

use crate::config::InitConfig;
use crate::error::Result;
use crate::launcher::ServiceLauncher;
use crate::reaper::{ReapedProc, ZombieReaper};
use crate::repo::ServiceRepository;
use crate::service::{LaunchedService, ServiceSpec};
use crate::signals;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, info, warn};

/// Exit code used when no service supplied a useful one: bootstrap
/// failures, and multi-service shutdowns where the first exit was
/// clean.
pub const DEFAULT_EXIT_CODE: i32 = 77;

/// Coordinates the signal pump, the reaper, and the shutdown
/// sequence for one init lifetime.
///
/// Construction subscribes to signals, starts the pump, and launches
/// the given services. The only operation afterwards is [`wait`],
/// which blocks until the first service terminates, drives every
/// remaining service down, and yields the final exit code.
///
/// [`wait`]: Supervisor::wait
pub struct Supervisor {
    inner: Arc<Inner>,
    /// Rendezvous armed for the first managed-service termination.
    term_rx: oneshot::Receiver<LaunchedService>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor").finish_non_exhaustive()
    }
}

struct Inner {
    config: InitConfig,
    /// True when more than one service is being managed.
    multi_service: bool,
    repo: ServiceRepository,
    reaper: ZombieReaper,
    /// Latch set once by the first managed termination, never unset.
    shutting_down: AtomicBool,
    final_exit_code: AtomicI32,
    /// One-shot wake for the wait() caller, taken by the latch winner.
    term_tx: Mutex<Option<oneshot::Sender<LaunchedService>>>,
    /// Pump teardown handles, taken once during shutdown.
    pump: Mutex<Option<PumpControl>>,
}

struct PumpControl {
    stop_tx: oneshot::Sender<()>,
    done_rx: oneshot::Receiver<()>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Subscribe to signals, start the pump, and launch `specs`.
    ///
    /// On a launch failure the already-spawned services are driven
    /// through the full shutdown sequence before the error is
    /// returned; the caller should then exit with
    /// [`DEFAULT_EXIT_CODE`].
    pub async fn start(config: InitConfig, specs: &[ServiceSpec]) -> Result<Self> {
        let repo = ServiceRepository::new();

        let (sig_tx, sig_rx) = mpsc::channel(64);
        let forwarders = signals::subscribe(sig_tx)?;

        let (term_tx, term_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let inner = Arc::new(Inner {
            config,
            multi_service: specs.len() > 1,
            repo: repo.clone(),
            reaper: ZombieReaper::new(),
            shutting_down: AtomicBool::new(false),
            final_exit_code: AtomicI32::new(DEFAULT_EXIT_CODE),
            term_tx: Mutex::new(Some(term_tx)),
            pump: Mutex::new(Some(PumpControl {
                stop_tx,
                done_rx,
                forwarders,
            })),
        });

        tokio::spawn(Arc::clone(&inner).pump(sig_rx, stop_rx, done_tx));

        let launcher = ServiceLauncher::new(repo);
        if let Err(err) = launcher.launch(specs).await {
            inner.shut_down().await;
            return Err(err);
        }

        Ok(Self { inner, term_rx })
    }

    /// Block until the first managed service terminates, drive every
    /// remaining service down, and return the final exit code.
    ///
    /// Single-service mode returns that service's exit status.
    /// Multi-service mode returns the first-to-die service's status
    /// if non-zero, [`DEFAULT_EXIT_CODE`] otherwise.
    pub async fn wait(self) -> i32 {
        let Supervisor { inner, term_rx } = self;

        if let Ok(service) = term_rx.await {
            info!(service = %service, "Shutting down after service termination");
        }

        inner.shut_down().await;
        inner.final_exit_code.load(Ordering::Acquire)
    }
}

impl Inner {
    /// Signal pump: handles one delivery at a time until torn down.
    async fn pump(
        self: Arc<Self>,
        mut sig_rx: mpsc::Receiver<Signal>,
        mut stop_rx: oneshot::Receiver<()>,
        done_tx: oneshot::Sender<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                delivered = sig_rx.recv() => match delivered {
                    Some(Signal::SIGCHLD) => {
                        debug!("Received SIGCHLD");
                        let batch = self.reaper.reap().await;
                        if !batch.is_empty() {
                            let inner = Arc::clone(&self);
                            tokio::spawn(async move { inner.dispatch_reaped(batch).await });
                        }
                    }
                    Some(sig) => {
                        debug!(signal = %sig, "Forwarding signal");
                        let inner = Arc::clone(&self);
                        tokio::spawn(async move {
                            inner.multicast(sig).await;
                        });
                    }
                    None => break,
                },
            }
        }
        debug!("Signal pump exiting");
        let _ = done_tx.send(());
    }

    /// Classify a reap batch: managed pids trigger termination
    /// handling, everything else was a re-parented orphan and is
    /// already dealt with by having been reaped.
    async fn dispatch_reaped(&self, batch: Vec<ReapedProc>) {
        for proc in batch {
            debug!(pid = proc.pid, status = ?proc.status, "Observed reaped pid");
            match self.repo.remove(proc.pid).await {
                Some(service) => {
                    self.handle_service_termination(service, proc.exit_status)
                        .await;
                }
                None => debug!(pid = proc.pid, "Reaped orphan process"),
            }
        }
    }

    /// The first termination wins the latch, fixes the exit code,
    /// and wakes wait(); later terminations are no-ops.
    async fn handle_service_termination(&self, service: LaunchedService, exit_status: i32) {
        info!(service = %service, exit_status = exit_status, "Service exited");

        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // A prior termination already seized the outcome.
            return;
        }

        let code = if !self.multi_service || exit_status != 0 {
            exit_status
        } else {
            DEFAULT_EXIT_CODE
        };
        self.final_exit_code.store(code, Ordering::Release);

        if let Some(tx) = self.term_tx.lock().await.take() {
            let _ = tx.send(service);
        }
    }

    /// Forward `sig` to every currently tracked service pid and
    /// return how many were targeted. Per-pid delivery errors are
    /// logged and swallowed; the target may have just died and the
    /// reaper will catch up.
    async fn multicast(&self, sig: Signal) -> usize {
        let pids = self.repo.pids().await;
        if !pids.is_empty() {
            info!(signal = %sig, services = pids.len(), "Multicasting signal to services");
        }

        for pid in &pids {
            if let Err(err) = kill(Pid::from_raw(*pid), sig) {
                warn!(signal = %sig, pid = pid, error = %err, "Failed to forward signal");
            }
        }
        pids.len()
    }

    /// Escalating termination: `term_phases` SIGTERM rounds and one
    /// final SIGKILL round, each bounded by the phase budget, then
    /// pump teardown.
    ///
    /// The pump keeps running throughout, so SIGCHLDs delivered as
    /// services die are reaped and drain the repository naturally.
    async fn shut_down(&self) {
        let total = self.config.term_phases;
        let mut sig = Signal::SIGTERM;
        let mut pending = total + 1;
        while pending > 0 {
            if pending == 1 {
                sig = Signal::SIGKILL;
            }
            pending -= 1;

            let count = self.multicast(sig).await;
            if count == 0 {
                break;
            }
            if pending > 0 {
                info!(
                    attempt = total + 1 - pending,
                    attempts = total,
                    signal = %sig,
                    services = count,
                    "Waiting for services to terminate"
                );
            } else {
                info!(
                    signal = %sig,
                    services = count,
                    "Graceful termination attempts exhausted"
                );
            }

            let budget = sleep(self.config.phase_budget);
            tokio::pin!(budget);
            let mut poll = interval(self.config.poll_interval);
            loop {
                tokio::select! {
                    _ = &mut budget => break,
                    _ = poll.tick() => {
                        if self.repo.count().await == 0 {
                            pending = 0;
                            break;
                        }
                    }
                }
            }
        }

        for service in self.repo.clear().await {
            warn!(service = %service, "Service survived shutdown, dropping");
        }

        self.shut_down_pump().await;
        info!("All services have terminated");
    }

    /// Tear down the signal pump: drop the subscriptions, tell the
    /// pump to exit, and give it a short grace to acknowledge.
    async fn shut_down_pump(&self) {
        let control = match self.pump.lock().await.take() {
            Some(control) => control,
            None => return,
        };

        for forwarder in control.forwarders {
            forwarder.abort();
        }
        let _ = control.stop_tx.send(());

        match timeout(self.config.pump_grace, control.done_rx).await {
            Ok(_) => debug!("Signal pump has exited"),
            Err(_) => debug!("Signal pump did not exit in time, proceeding"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceSpec;

    fn test_inner(multi_service: bool) -> (Arc<Inner>, oneshot::Receiver<LaunchedService>) {
        let (term_tx, term_rx) = oneshot::channel();
        let inner = Arc::new(Inner {
            config: InitConfig::default(),
            multi_service,
            repo: ServiceRepository::new(),
            reaper: ZombieReaper::new(),
            shutting_down: AtomicBool::new(false),
            final_exit_code: AtomicI32::new(DEFAULT_EXIT_CODE),
            term_tx: Mutex::new(Some(term_tx)),
            pump: Mutex::new(None),
        });
        (inner, term_rx)
    }

    fn service(pid: i32) -> LaunchedService {
        LaunchedService {
            spec: ServiceSpec::new("/bin/true", Vec::new()),
            pid,
        }
    }

    #[tokio::test]
    async fn first_termination_wins_the_latch() {
        let (inner, mut term_rx) = test_inner(true);

        inner.handle_service_termination(service(100), 3).await;
        inner.handle_service_termination(service(101), 9).await;

        assert!(inner.shutting_down.load(Ordering::Acquire));
        assert_eq!(inner.final_exit_code.load(Ordering::Acquire), 3);

        // Exactly one wake, carrying the first service.
        assert_eq!(term_rx.try_recv().expect("one wake").pid, 100);
        assert!(term_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn single_service_mode_keeps_the_exit_status() {
        let (inner, _term_rx) = test_inner(false);
        inner.handle_service_termination(service(100), 0).await;
        assert_eq!(inner.final_exit_code.load(Ordering::Acquire), 0);

        let (inner, _term_rx) = test_inner(false);
        inner.handle_service_termination(service(100), 42).await;
        assert_eq!(inner.final_exit_code.load(Ordering::Acquire), 42);
    }

    #[tokio::test]
    async fn multi_service_mode_maps_clean_exit_to_default() {
        let (inner, _term_rx) = test_inner(true);
        inner.handle_service_termination(service(100), 0).await;
        assert_eq!(
            inner.final_exit_code.load(Ordering::Acquire),
            DEFAULT_EXIT_CODE
        );

        let (inner, _term_rx) = test_inner(true);
        inner.handle_service_termination(service(100), 7).await;
        assert_eq!(inner.final_exit_code.load(Ordering::Acquire), 7);
    }

    #[tokio::test]
    async fn dispatch_discards_foreign_pids() {
        let (inner, mut term_rx) = test_inner(false);
        inner.repo.add(service(500)).await;

        let foreign = ReapedProc {
            pid: 12345,
            status: nix::sys::wait::WaitStatus::Exited(Pid::from_raw(12345), 0),
            exit_status: 0,
        };
        inner.dispatch_reaped(vec![foreign]).await;

        // No latch, no wake, repository untouched.
        assert!(!inner.shutting_down.load(Ordering::Acquire));
        assert!(term_rx.try_recv().is_err());
        assert_eq!(inner.repo.count().await, 1);
    }
}
