//! HTTP access to a ThingsBoard backend for treesync.
//!
//! [`ThingsboardClient`] implements [`treesync_core::TopologySource`]. Every
//! request runs under its own deadline; the relation queries are retried per
//! [`RetryPolicy`], and every failure other than the asset listing degrades
//! to missing data.

pub mod config;
pub mod error;
pub mod fetch;
pub mod retry;
pub mod thingsboard;

pub use config::{ClientSettings, DEFAULT_BASE_URL};
pub use error::{ClientError, ClientResult};
pub use fetch::{FetchContext, FetchOutcome, RelationFetcher};
pub use retry::{RetryPolicy, RetryReport};
pub use thingsboard::{AUTHORIZATION_HEADER, ThingsboardClient};
