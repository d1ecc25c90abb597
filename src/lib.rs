//! Minimal PID 1 init and service manager.
//!
//! microinit is meant to run as the entry process of a container or
//! lightweight sandbox. It has two intertwined duties:
//!
//! - Reap any orphaned process the kernel re-parents to PID 1.
//! - Launch a fixed set of services, forward signals to them, and
//!   drive an escalating shutdown once the first of them exits.
//!
//! # Architecture
//!
//! - **Supervisor**: owns the signal pump, dispatches reaped pids,
//!   and runs the shutdown sequence
//! - **ServiceRepository**: pid to launched-service bookkeeping
//! - **ZombieReaper**: serialized non-blocking waitpid drain
//! - **ServiceLauncher**: spawns the initial services
//!
//! # Example
//!
//! ```no_run
//! use microinit::{InitConfig, ServiceSpec, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let specs = vec![ServiceSpec::new("/bin/sleep", vec!["60".to_string()])];
//!     let supervisor = Supervisor::start(InitConfig::default(), &specs).await?;
//!     std::process::exit(supervisor.wait().await);
//! }
//! ```

pub mod config;
pub mod error;
pub mod launcher;
pub mod reaper;
pub mod repo;
pub mod service;
mod signals;
pub mod supervisor;

// Re-export main types
pub use config::InitConfig;
pub use error::{Error, Result};
pub use launcher::ServiceLauncher;
pub use reaper::{ReapedProc, ZombieReaper};
pub use repo::ServiceRepository;
pub use service::{LaunchedService, ServiceSpec};
pub use supervisor::{Supervisor, DEFAULT_EXIT_CODE};
