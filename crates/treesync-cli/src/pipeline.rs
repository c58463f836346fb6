//! One structure-creation run, from token lookup to the stored tree.

use std::sync::Arc;

use anyhow::Context;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use treesync_client::ThingsboardClient;
use treesync_core::{
    CustomerId, DynTokenStore, DynTreeStore, PersistReport, PersistenceGateway, SyncSummary,
    TokenProvider, TopologySync,
};
use treesync_db_postgres::PostgresStore;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub session_id: Uuid,
    pub summary: SyncSummary,
    pub persisted: PersistReport,
}

/// Validates `customer_id`, connects to PostgreSQL and runs [`run`] with the
/// store serving both tokens and trees.
///
/// A malformed id fails before any connection is opened.
pub async fn run_from_config(customer_id: &str, config: &AppConfig) -> anyhow::Result<RunReport> {
    let customer = CustomerId::parse(customer_id)?;

    let pg_config = config.postgres_config().map_err(anyhow::Error::msg)?;
    let store = Arc::new(
        PostgresStore::connect(&pg_config)
            .await
            .context("failed to connect to PostgreSQL")?,
    );

    run(customer, config, store.clone(), store).await
}

/// Rebuilds and stores the tree of `customer`.
///
/// Every log line of the run carries the same `session_id`.
pub async fn run(
    customer: CustomerId,
    config: &AppConfig,
    tokens: DynTokenStore,
    trees: DynTreeStore,
) -> anyhow::Result<RunReport> {
    let session_id = Uuid::new_v4();
    let span = info_span!("sync", %session_id, customer_id = %customer);

    let (summary, persisted) = execute(customer, config, tokens, trees)
        .instrument(span)
        .await?;
    Ok(RunReport {
        session_id,
        summary,
        persisted,
    })
}

async fn execute(
    customer: CustomerId,
    config: &AppConfig,
    tokens: DynTokenStore,
    trees: DynTreeStore,
) -> anyhow::Result<(SyncSummary, PersistReport)> {
    info!(backend = %config.thingsboard.url, "structure creation started");

    let token = TokenProvider::new(tokens, config.thingsboard.token.clone())
        .resolve(&customer)
        .await?;

    let settings = config.sync.client_settings(&config.thingsboard.url)?;
    let client = ThingsboardClient::new(settings, &token)?;

    let outcome = TopologySync::new(Arc::new(client), config.sync.sync_options())
        .build(&customer)
        .await?;
    outcome.summary.log();

    let persisted = PersistenceGateway::new(trees)
        .persist(&customer, &outcome.tree)
        .await?;

    info!(
        mode = ?persisted.mode,
        stored_chars = persisted.serialized_len,
        roots = outcome.tree.len(),
        "structure creation finished"
    );

    Ok((outcome.summary, persisted))
}
