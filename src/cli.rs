use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::adapters::PostgresLedgerStore;
use crate::config::Config;
use crate::services::LedgerQueryService;

#[derive(Parser)]
#[command(name = "payment-ledger")]
#[command(about = "Payment Ledger - provider webhooks to a base-currency ledger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Keep payments and ledger entries in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Ledger inspection commands
    #[command(subcommand)]
    Ledger(LedgerCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Re-derive the balance chain from stored entries and report the first break
    Verify,

    /// Print the current running balance
    Balance,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config.require_database_url()?).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!(
        "  Database URL: {}",
        config
            .database_url
            .as_deref()
            .map(mask_password)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  Base Currency: {}", config.base_currency);
    println!("  Exchange Rates URL: {}", config.exchange_rates_url);
    println!(
        "  Exchange Rates App ID: {}",
        if config.open_exchange_app_id.is_some() { "set" } else { "not set (parity fallback)" }
    );
    println!("  Rate Lookup Timeout: {} ms", config.rate_lookup_timeout_ms);
    println!("  Stripe API URL: {}", config.stripe_api_url);
    println!(
        "  Stripe API Key: {}",
        if config.stripe_api_key.is_some() { "set" } else { "not set (no customer lookups)" }
    );

    config.validate()?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

async fn ledger_service(config: &Config) -> anyhow::Result<LedgerQueryService> {
    let pool = crate::db::create_pool(config.require_database_url()?).await?;
    let store = Arc::new(PostgresLedgerStore::new(pool));
    Ok(LedgerQueryService::new(store, config.base_currency.clone()))
}

pub async fn handle_ledger_verify(config: &Config) -> anyhow::Result<()> {
    let service = ledger_service(config).await?;

    match service.verify().await? {
        Ok(count) => {
            tracing::info!(entries = count, "Balance chain verified");
            println!("✓ Balance chain intact across {} entries", count);
            Ok(())
        }
        Err(chain_break) => {
            tracing::error!("{}", chain_break);
            anyhow::bail!(chain_break)
        }
    }
}

pub async fn handle_ledger_balance(config: &Config) -> anyhow::Result<()> {
    let service = ledger_service(config).await?;
    let balance = service.current_balance().await?;

    println!("{} {}", balance.balance, balance.currency);

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
