//! Reaper drain behavior against real children.
//!
//! Both tests call waitpid(-1), so they serialize behind a lock to
//! keep one from draining the other's children.

use microinit::ZombieReaper;
use std::collections::HashSet;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrent reap calls collectively observe every death exactly
/// once: the serialized waitpid loop drains the kernel queue, and a
/// caller arriving second finds it empty.
#[tokio::test]
async fn concurrent_reaps_observe_each_death_once() {
    let _guard = serial();
    const CHILDREN: usize = 8;

    let mut expected = HashSet::new();
    for _ in 0..CHILDREN {
        let child = Command::new("/bin/true").spawn().expect("spawn /bin/true");
        expected.insert(child.id() as i32);
        drop(child);
    }

    let reaper = Arc::new(ZombieReaper::new());
    let mut seen = Vec::new();
    for _ in 0..200 {
        let (a, b) = tokio::join!(reaper.reap(), reaper.reap());
        seen.extend(a);
        seen.extend(b);
        if seen.len() >= CHILDREN {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let pids: Vec<i32> = seen.iter().map(|p| p.pid).collect();
    let unique: HashSet<i32> = pids.iter().copied().collect();
    assert_eq!(pids.len(), CHILDREN, "each death observed exactly once");
    assert_eq!(unique, expected);
    assert!(seen.iter().all(|p| p.exit_status == 0));
}

/// With no children at all, a reap ends on ECHILD with an empty batch.
#[tokio::test]
async fn reap_with_no_children_returns_empty_batch() {
    let _guard = serial();

    let reaper = ZombieReaper::new();
    assert!(reaper.reap().await.is_empty());
}
