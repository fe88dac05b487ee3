//! HTTP implementation of the social API
//!
//! Talks to the douban v1 people API using its JSON feed representation
//! (`alt=json`). Relation lists are paged with a 1-based `start-index` and
//! `max-results`.

use crate::api::{ApiError, ApiResult, RawRecord, SocialApi};
use crate::graph::{EntityRef, RelationKind};
use crate::{ConfigError, CrawlError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.douban.com";

/// reqwest-backed [`SocialApi`] client
pub struct HttpApi {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpApi {
    /// Creates a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://api.douban.com`
    /// * `api_key` - The API key sent with every request
    ///
    /// # Returns
    ///
    /// * `Ok(HttpApi)` - Client ready for use
    /// * `Err(CrawlError)` - Invalid base URL or the HTTP client could not be built
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, CrawlError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "base-url '{}' cannot carry a path",
                base_url
            ))
            .into());
        }

        let client = Client::builder()
            .user_agent(concat!("douban-ripple/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    /// Builds `{base}/people/{entity}[/{list}]`
    fn people_url(&self, entity: &EntityRef, list: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("people").push(&entity.to_string());
            if let Some(list) = list {
                segments.push(list);
            }
        }
        url
    }

    async fn get_json(&self, url: Url, extra: &[(&str, String)]) -> ApiResult<Value> {
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(&[("alt", "json"), ("apikey", self.api_key.as_str())])
            .query(extra)
            .send()
            .await
            .map_err(|e| ApiError::Transient(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::AccessDenied(format!("HTTP {} for {}", status, url)));
        }
        if !status.is_success() {
            return Err(ApiError::Transient(format!("HTTP {} for {}", status, url)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(format!("{}: {}", url, e)))?;

        serde_json::from_str(&body).map_err(|e| ApiError::Malformed(format!("{}: {}", url, e)))
    }
}

/// Splits a feed object into its entries
///
/// A feed without `entry` is an empty page; a single object entry is
/// treated as a one-element page.
fn feed_entries(feed: Value) -> ApiResult<Vec<RawRecord>> {
    let Value::Object(mut feed) = feed else {
        return Err(ApiError::Malformed("feed is not an object".to_string()));
    };

    match feed.remove("entry") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => Ok(entries.into_iter().map(RawRecord::new).collect()),
        Some(entry @ Value::Object(_)) => Ok(vec![RawRecord::new(entry)]),
        Some(other) => Err(ApiError::Malformed(format!(
            "unexpected feed entry type: {}",
            other
        ))),
    }
}

#[async_trait]
impl SocialApi for HttpApi {
    async fn get_entity(&self, entity: &EntityRef) -> ApiResult<RawRecord> {
        let url = self.people_url(entity, None);
        let value = self.get_json(url, &[]).await?;
        if !value.is_object() {
            return Err(ApiError::Malformed(format!(
                "person {} is not an object",
                entity
            )));
        }
        Ok(RawRecord::new(value))
    }

    async fn get_relations(
        &self,
        entity: &EntityRef,
        kind: RelationKind,
        offset: usize,
        page_size: usize,
    ) -> ApiResult<Vec<RawRecord>> {
        let url = self.people_url(entity, Some(kind.api_path()));
        let feed = self
            .get_json(
                url,
                &[
                    ("start-index", (offset + 1).to_string()),
                    ("max-results", page_size.to_string()),
                ],
            )
            .await?;
        feed_entries(feed)
    }
}
