use crate::clients::ExchangeRateClient;
use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub rate_source: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.rate_source
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Exchange Rate Source:  {}", status(self.rate_source));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

/// Checks configuration and reachability of the collaborators the server
/// depends on. `pool` is `None` when the store runs in memory.
///
/// A failing rate source is reported but does not stop the server: lookups
/// fall back to parity.
pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        rate_source: true,
        errors: Vec::new(),
    };

    if let Err(e) = config.validate() {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Some(pool) = pool {
        if let Err(e) = validate_database(pool).await {
            report.database = false;
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    if let Err(e) = validate_rate_source(config).await {
        report.rate_source = false;
        report.errors.push(format!("Exchange rates: {:#}", e));
    }

    report
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_rate_source(config: &Config) -> Result<()> {
    let Some(app_id) = &config.open_exchange_app_id else {
        return Ok(());
    };

    let client = ExchangeRateClient::new(
        config.exchange_rates_url.clone(),
        app_id.clone(),
        config.rate_lookup_timeout(),
    );

    client
        .latest(&config.base_currency)
        .await
        .context("Failed to fetch latest rates")?;

    Ok(())
}
