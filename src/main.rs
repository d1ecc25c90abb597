//! microinit binary.
//!
//! Runs as PID 1 inside a container: launches the given commands,
//! forwards signals to them, reaps orphans, and exits with the code
//! derived from the first service to terminate.

use clap::Parser;
use microinit::{InitConfig, ServiceSpec, Supervisor, DEFAULT_EXIT_CODE};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "microinit",
    about = "Minimal PID 1 init and service manager",
    version
)]
struct Cli {
    /// Log level filter (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Commands to launch; separate services with --
    #[arg(
        trailing_var_arg = true,
        required = true,
        allow_hyphen_values = true,
        value_name = "CMD"
    )]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let specs = parse_specs(&cli.command)?;

    let supervisor = match Supervisor::start(InitConfig::default(), &specs).await {
        Ok(supervisor) => supervisor,
        Err(err) => {
            error!(error = %err, "Failed to launch services");
            std::process::exit(DEFAULT_EXIT_CODE);
        }
    };

    std::process::exit(supervisor.wait().await)
}

/// Split the trailing argv into one service per `--` separated group.
fn parse_specs(argv: &[String]) -> anyhow::Result<Vec<ServiceSpec>> {
    let mut specs = Vec::new();
    for group in argv.split(|arg| arg == "--") {
        match group.split_first() {
            Some((program, args)) => specs.push(ServiceSpec::new(program, args.to_vec())),
            None => anyhow::bail!("empty service command"),
        }
    }
    if specs.is_empty() {
        anyhow::bail!("no service command given");
    }
    Ok(specs)
}
