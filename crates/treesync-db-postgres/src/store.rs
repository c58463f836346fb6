//! `customer_settings` access: token lookup and tree upsert.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use treesync_core::{CustomerId, StoreError, StoreWrite, TokenStore, TreeStore, WriteMode};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};
use crate::{migrations, pool};

/// PostgreSQL-backed [`TokenStore`] and [`TreeStore`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects and, if configured, applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        if config.run_migrations {
            migrations::run(&pool).await?;
        }
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn upsert_tree(&self, customer: &CustomerId, document: &str) -> Result<StoreWrite> {
        let customer_id = *customer.as_uuid();
        let mut tx = self.pool.begin().await?;

        let updated = query(
            "UPDATE customer_settings SET tree = $1, tree_updated = now() WHERE customer_id = $2",
        )
        .bind(document)
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

        let mode = if updated.rows_affected() == 0 {
            query(
                "INSERT INTO customer_settings (customer_id, tree, tree_updated) \
                 VALUES ($1, $2, now())",
            )
            .bind(customer_id)
            .bind(document)
            .execute(&mut *tx)
            .await?;
            WriteMode::Inserted
        } else {
            WriteMode::Updated
        };

        tx.commit().await?;
        debug!(customer_id = %customer, ?mode, "tree write committed");

        let stored: Option<Option<i32>> =
            query_scalar("SELECT char_length(tree) FROM customer_settings WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(StoreWrite {
            mode,
            stored_len: stored.flatten().and_then(|len| usize::try_from(len).ok()),
        })
    }
}

#[async_trait]
impl TokenStore for PostgresStore {
    #[instrument(skip(self), fields(customer_id = %customer))]
    async fn stored_token(
        &self,
        customer: &CustomerId,
    ) -> std::result::Result<Option<String>, StoreError> {
        let token: Option<Option<String>> =
            query_scalar("SELECT tbtoken FROM customer_settings WHERE customer_id = $1")
                .bind(*customer.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(PostgresError::from)?;
        Ok(token.flatten())
    }
}

#[async_trait]
impl TreeStore for PostgresStore {
    #[instrument(skip(self, document), fields(customer_id = %customer, len = document.len()))]
    async fn write_tree(
        &self,
        customer: &CustomerId,
        document: &str,
    ) -> std::result::Result<StoreWrite, StoreError> {
        Ok(self.upsert_tree(customer, document).await?)
    }
}
