use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/planvault-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Row counts for the two planvault tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub active_plans: i64,
    pub plan_history: i64,
}

/// Create a connection pool sized for the dispatcher's workload.
///
/// Every operation issues at most three short queries in sequence, so a
/// small pool suffices; under load, requests queue briefly at acquire
/// rather than piling connections onto the server.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))?;
    Ok(pool)
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!("migrations applied successfully");
    Ok(())
}

/// Ensure the target database exists, creating it if necessary.
///
/// Connects to the `postgres` maintenance database on the same server and
/// issues `CREATE DATABASE <name>` when the target is absent.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<()> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;

    let maintenance_url = config.maintenance_url();
    let maint_pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&maintenance_url)
        .await
        .with_context(|| {
            format!("failed to connect to maintenance database at {maintenance_url}")
        })?;

    let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(db_name)
        .fetch_optional(&maint_pool)
        .await
        .context("failed to query pg_database")?
        .is_some();

    if exists {
        info!(db = db_name, "database already exists");
    } else {
        // CREATE DATABASE cannot take a bound parameter; reject anything
        // but a plain identifier before splicing the name in.
        if !db_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!("database name {:?} contains invalid characters", db_name);
        }
        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&maint_pool)
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(())
}

/// Count the rows in `active_plans` and `plan_history`.
///
/// Used by the `planvault db-init` success message.
pub async fn store_counts(pool: &PgPool) -> Result<StoreCounts> {
    let (active_plans, plan_history): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM active_plans), \
                (SELECT COUNT(*) FROM plan_history)",
    )
    .fetch_one(pool)
    .await
    .context("failed to count plan rows")?;

    Ok(StoreCounts {
        active_plans,
        plan_history,
    })
}
