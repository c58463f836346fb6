//! ThingsBoard REST implementation of [`TopologySource`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};
use url::Url;

use treesync_core::{
    AssetPage, AssetRecord, AttributeEntry, CustomerId, DeviceRecord, Relation, SyncError,
    TopologySource,
};

use crate::config::ClientSettings;
use crate::error::{ClientError, ClientResult};
use crate::fetch::{FetchContext, FetchOutcome, RelationFetcher};

/// ThingsBoard expects the bearer token in this header, not `Authorization`.
pub const AUTHORIZATION_HEADER: &str = "x-authorization";

/// Backend client for one run. The token is fixed at construction.
#[derive(Debug, Clone)]
pub struct ThingsboardClient {
    fetcher: RelationFetcher,
    settings: ClientSettings,
}

impl ThingsboardClient {
    /// Builds a client that authenticates every request with `token`.
    ///
    /// # Errors
    ///
    /// Fails if the token is not a valid header value or the HTTP client
    /// cannot be built.
    pub fn new(settings: ClientSettings, token: &str) -> ClientResult<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|e| ClientError::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(AUTHORIZATION_HEADER), auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("treesync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            fetcher: RelationFetcher::new(http),
            settings,
        })
    }

    /// Appends `path` to the base URL and replaces the query with `query`.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.settings.base_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{path}"));
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    async fn relations(&self, query: &[(&str, &str)], context: FetchContext<'_>) -> Vec<Relation> {
        let url = self.endpoint("/api/relations/info", query);
        let relations: Vec<Relation> = self
            .fetcher
            .fetch_with_retry(&url, &self.settings.relation_retry, context)
            .await;
        debug!(
            request = context.request,
            subject = context.subject,
            count = relations.len(),
            "relations fetched"
        );
        relations
    }
}

#[async_trait]
impl TopologySource for ThingsboardClient {
    async fn list_assets(&self, customer: &CustomerId) -> treesync_core::Result<Vec<AssetRecord>> {
        let path = format!("/api/customer/{customer}/assets");
        let page_size = self.settings.page_size.to_string();
        let mut assets = Vec::new();

        for page in 0..self.settings.max_pages {
            let page_number = page.to_string();
            let url = self.endpoint(
                &path,
                &[("pageSize", page_size.as_str()), ("page", page_number.as_str())],
            );
            let outcome: FetchOutcome<AssetPage> = self
                .fetcher
                .fetch_once(&url, self.settings.asset_list_timeout)
                .await;

            let listing = match outcome {
                FetchOutcome::Payload(listing) => listing,
                failed => {
                    return Err(SyncError::asset_list(format!(
                        "asset listing page {page} for customer {customer}: {failed}"
                    )));
                }
            };
            debug!(
                page,
                count = listing.data.len(),
                has_next = listing.has_next,
                "asset page fetched"
            );
            assets.extend(listing.data);
            if !listing.has_next {
                info!(customer_id = %customer, assets = assets.len(), "asset listing complete");
                return Ok(assets);
            }
        }

        warn!(
            max_pages = self.settings.max_pages,
            assets = assets.len(),
            "asset listing still reports more pages, stopping"
        );
        Ok(assets)
    }

    async fn relations_from(&self, asset: &AssetRecord) -> Vec<Relation> {
        self.relations(
            &[("fromId", asset.id()), ("fromType", "ASSET")],
            FetchContext::new("relations from", asset.id()),
        )
        .await
    }

    async fn relations_to(&self, asset: &AssetRecord) -> Vec<Relation> {
        self.relations(
            &[("toId", asset.id()), ("toType", "ASSET")],
            FetchContext::new("relations to", asset.id()),
        )
        .await
    }

    async fn device_relations(&self, asset: &AssetRecord) -> Vec<Relation> {
        self.relations(
            &[
                ("fromId", asset.id()),
                ("fromType", "ASSET"),
                ("relationType", "Contains"),
                ("toType", "DEVICE"),
            ],
            FetchContext::new("device relations", asset.id()),
        )
        .await
    }

    async fn device(&self, device_id: &str) -> Option<DeviceRecord> {
        let url = self.endpoint(&format!("/api/device/{device_id}"), &[]);
        self.fetcher
            .fetch_optional(
                &url,
                self.settings.device_timeout,
                FetchContext::new("device", device_id),
            )
            .await
    }

    async fn attributes(&self, asset: &AssetRecord) -> Vec<AttributeEntry> {
        let url = self.endpoint(
            &format!("/api/plugins/telemetry/ASSET/{}/values/attributes", asset.id()),
            &[],
        );
        self.fetcher
            .fetch_optional(
                &url,
                self.settings.attributes_timeout,
                FetchContext::new("attributes", asset.id()),
            )
            .await
            .unwrap_or_default()
    }
}
