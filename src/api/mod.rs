//! Remote social API seam
//!
//! The crawler talks to the remote service only through the [`SocialApi`]
//! trait. Failures are reported as one of three [`ApiError`] kinds, which the
//! retry layer in `crawler::limiter` absorbs.

mod http;
pub mod record;

pub use http::{HttpApi, DEFAULT_BASE_URL};
pub use record::{extract_record, RawRecord};

use crate::graph::{EntityRef, RelationKind};
use async_trait::async_trait;
use thiserror::Error;

/// Failures surfaced by the remote API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network failure, timeout or server-side error; safe to retry
    #[error("Transient API failure: {0}")]
    Transient(String),

    /// The service refused access (rate limit ban, forbidden)
    #[error("Access denied by API: {0}")]
    AccessDenied(String),

    /// The response could not be decoded at all
    #[error("Malformed API response: {0}")]
    Malformed(String),
}

/// Result type for remote API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// The remote service the crawler discovers the graph from
#[async_trait]
pub trait SocialApi: Send + Sync {
    /// Fetches a single entity record
    async fn get_entity(&self, entity: &EntityRef) -> ApiResult<RawRecord>;

    /// Fetches one page of an entity's relation list
    ///
    /// # Arguments
    ///
    /// * `entity` - The entity whose relations are listed
    /// * `kind` - Which relation list to read
    /// * `offset` - Zero-based index of the first record in the page
    /// * `page_size` - Maximum number of records in the page
    async fn get_relations(
        &self,
        entity: &EntityRef,
        kind: RelationKind,
        offset: usize,
        page_size: usize,
    ) -> ApiResult<Vec<RawRecord>>;
}
