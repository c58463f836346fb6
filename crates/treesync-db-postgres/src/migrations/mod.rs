//! Embedded schema migrations.
//!
//! SQL files live in `migrations/` at the crate root and are compiled into
//! the binary, so a deployment needs no migration files on disk.

use std::borrow::Cow;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// `(version, description, sql)` in version order. New migrations go at the
/// end with a later timestamp.
const EMBEDDED: &[(i64, &str, &str)] = &[(
    20241016000001,
    "customer_settings",
    include_str!("../../migrations/20241016000001_customer_settings.sql"),
)];

fn build_migrations() -> Vec<Migration> {
    EMBEDDED
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]),
            no_tx: false,
        })
        .collect()
}

/// Applies every pending migration. Applied versions are tracked in
/// `_sqlx_migrations`.
///
/// # Errors
///
/// Returns [`PostgresError::Migration`] if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "Running embedded database migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("Database migrations completed");
    Ok(())
}
