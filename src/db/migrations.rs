//! Opens the analytics store and applies `schema.sql`.
//!
//! Every schema statement is `CREATE ... IF NOT EXISTS`, so reopening an
//! existing store only refreshes connection pragmas.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("schema.sql");

/// Applied on every pooled connection. Batch runs write lots and scores for
/// several wallets concurrently, so writers wait instead of failing fast.
const CONNECTION_PRAGMAS: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    "PRAGMA busy_timeout = 5000",
    "PRAGMA synchronous = NORMAL",
];

/// Open (creating if needed) the store at `db_path` and bring its schema up
/// to date.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    ensure_parent_dir(db_path);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { prepare_connection(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    let applied = apply_schema(&pool).await?;
    info!(path = db_path, statements = applied, "Analytics store ready");
    Ok(pool)
}

fn ensure_parent_dir(db_path: &str) {
    let Some(parent) = Path::new(db_path).parent() else {
        return;
    };
    if parent.as_os_str().is_empty() {
        return;
    }
    if let Err(e) = std::fs::create_dir_all(parent) {
        warn!(path = %parent.display(), error = %e, "Failed to create database directory");
    }
}

fn schema_statements() -> impl Iterator<Item = &'static str> {
    SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Apply the schema in one transaction, returning the number of statements.
async fn apply_schema(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0;
    for statement in schema_statements() {
        sqlx::query(statement).execute(&mut *tx).await?;
        applied += 1;
    }
    tx.commit().await?;
    Ok(applied)
}

async fn prepare_connection(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for pragma in CONNECTION_PRAGMAS {
        sqlx::query(pragma).execute(&mut *conn).await?;
    }

    // journal_mode answers with the mode actually in effect.
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    debug!(journal_mode = %journal_mode, "Store connection prepared");
    Ok(())
}
