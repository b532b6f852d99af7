use clap::Parser;
use payment_ledger::adapters::{InMemoryLedgerStore, PostgresLedgerStore};
use payment_ledger::cli::{self, Cli, Commands, DbCommands, LedgerCommands};
use payment_ledger::config::{Config, LogFormat};
use payment_ledger::ports::LedgerStore;
use payment_ledger::{create_app, db, startup, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { in_memory: false }) {
        Commands::Serve { in_memory } => serve(config, in_memory).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Ledger(LedgerCommands::Verify) => cli::handle_ledger_verify(&config).await,
        Commands::Ledger(LedgerCommands::Balance) => cli::handle_ledger_balance(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config, in_memory: bool) -> anyhow::Result<()> {
    let mut pool = None;
    let store: Arc<dyn LedgerStore> = if in_memory {
        tracing::warn!("Running with the in-memory store, nothing is persisted");
        Arc::new(InMemoryLedgerStore::new())
    } else {
        let pg = db::create_pool(config.require_database_url()?).await?;
        db::run_migrations(&pg).await?;
        pool = Some(pg.clone());
        Arc::new(PostgresLedgerStore::new(pg))
    };

    let report = startup::validate_environment(&config, pool.as_ref()).await;
    if !report.is_valid() {
        report.print();
    }
    if !report.environment || !report.database {
        anyhow::bail!("Startup validation failed");
    }

    let app = create_app(AppState::from_config(&config, store));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(base_currency = %config.base_currency, "listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
