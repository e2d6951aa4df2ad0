use std::process::ExitCode;

use clap::Parser;
use tokio::sync::watch;
use tollgate::{LockoutPolicy, RepositoryProvider, Tollgate, TollgateBuilder};
use tracing_subscriber::EnvFilter;

/// Command line interface for Tollgate
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://tollgate.db")]
    database_url: String,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Run database migrations
    ///
    /// Other storage commands apply pending migrations on their own.
    Migrate,
    /// Delete login attempts older than the retention period
    Cleanup,
    /// Show the lockout state of an identity and origin pair
    Status {
        /// Email address or other login identity
        identity: String,
        /// Client address the attempts came from
        origin: String,
    },
    /// Print the security report for the last 24 hours as JSON
    Report,
    /// Run cleanup on the policy's interval until interrupted
    Schedule,
    /// Print version information
    Version,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Version = cli.command {
        println!("Tollgate v{}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "postgres")]
fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

/// Whether the command should bring the schema up to date before running.
fn applies_migrations(command: &Commands) -> bool {
    !matches!(command, Commands::Migrate | Commands::Version)
}

async fn run(cli: Cli) -> CliResult {
    let policy = LockoutPolicy::from_env()?;
    let migrate = applies_migrations(&cli.command);

    #[cfg(feature = "postgres")]
    if is_postgres_url(&cli.database_url) {
        let tollgate = TollgateBuilder::new()
            .with_postgres(&cli.database_url)
            .await?
            .with_lockout_policy(policy.clone())
            .apply_migrations(migrate)
            .build()
            .await?;
        return execute(&tollgate, cli.command).await;
    }

    let tollgate = TollgateBuilder::new()
        .with_sqlite(&cli.database_url)
        .await?
        .with_lockout_policy(policy)
        .apply_migrations(migrate)
        .build()
        .await?;
    execute(&tollgate, cli.command).await
}

async fn execute<R: RepositoryProvider>(tollgate: &Tollgate<R>, command: Commands) -> CliResult {
    match command {
        Commands::Migrate => {
            println!("Running migrations...");
            tollgate.migrate().await?;
        }
        Commands::Cleanup => {
            let deleted = tollgate.cleanup().await?;
            println!("Deleted {deleted} expired login attempts");
        }
        Commands::Status { identity, origin } => {
            let status = tollgate.lockout_status(&identity, &origin).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Report => {
            let report = tollgate.security_report().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Schedule => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = tollgate.start_cleanup_task(shutdown_rx);

            tracing::info!(
                interval_secs = tollgate.policy().cleanup_interval.as_secs(),
                "Cleanup scheduled, press Ctrl-C to stop"
            );
            tokio::signal::ctrl_c().await?;

            shutdown_tx.send(true)?;
            handle.await?;
        }
        Commands::Version => {
            println!("Tollgate v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
