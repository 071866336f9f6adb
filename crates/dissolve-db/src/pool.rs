//! Connection pools, database bootstrap and the embedded schema.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, FromRow, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/dissolve-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const POOL_SIZE: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// What [`ensure_database_exists`] found on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    AlreadyPresent,
}

/// Row counts of the dissolve tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct DatabaseSummary {
    pub companies: i64,
    pub compiled_plans: i64,
    pub scheduled_tasks: i64,
}

/// Open a pool against an explicit URL.
pub async fn connect_url(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Open the application pool.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect_url(&config.database_url, POOL_SIZE).await
}

/// Apply pending migrations and return the resulting schema version.
pub async fn run_migrations(pool: &PgPool) -> Result<i64> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    let version = MIGRATOR.iter().map(|m| m.version).max().unwrap_or(0);
    info!(version, "schema up to date");
    Ok(version)
}

/// Whether `name` can be used unquoted in `CREATE DATABASE`.
///
/// Unquoted identifiers fold to lowercase, so uppercase names are refused
/// rather than silently created under a different name.
pub fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<Bootstrap> {
    let name = config
        .database_name()
        .context("could not determine database name from URL")?;
    if !is_valid_database_name(name) {
        bail!("database name {name:?} must be lowercase letters, digits and underscores");
    }

    let admin = connect_url(&config.maintenance_url(), 1).await?;
    let outcome = create_if_missing(&admin, name).await;
    admin.close().await;
    outcome
}

async fn create_if_missing(admin: &PgPool, name: &str) -> Result<Bootstrap> {
    let present: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(admin)
            .await
            .context("failed to query pg_database")?;

    if present {
        debug!(db = name, "database already present");
        return Ok(Bootstrap::AlreadyPresent);
    }

    // CREATE DATABASE takes no bind parameters; the name was validated.
    admin
        .execute(format!("CREATE DATABASE {name}").as_str())
        .await
        .with_context(|| format!("failed to create database {name}"))?;
    info!(db = name, "database created");
    Ok(Bootstrap::Created)
}

/// Count companies, compiled plans and scheduled tasks.
pub async fn summarize(pool: &PgPool) -> Result<DatabaseSummary> {
    sqlx::query_as::<_, DatabaseSummary>(
        "SELECT (SELECT COUNT(*) FROM companies) AS companies, \
                (SELECT COUNT(*) FROM schedule_compilations) AS compiled_plans, \
                (SELECT COUNT(*) FROM scheduled_tasks) AS scheduled_tasks",
    )
    .fetch_one(pool)
    .await
    .context("failed to summarize database")
}
