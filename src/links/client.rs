use std::sync::Arc;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{LinkQuery, Page, ALL_LINKS_ROUTE, LINKS_ROUTE};
use crate::config::{endpoint, parse_base, LinkIndexConfig};
use crate::error::{ConfigError, LinkIndexError};
use crate::utils::truncate::{truncate_body, MAX_DIAGNOSTIC_BYTES};

/// HTTP client for the link index. Cheap to clone; clones share the
/// connection pool and the configuration.
#[derive(Debug, Clone)]
pub struct LinkIndexClient {
    client: Client,
    pub(super) links_url: Url,
    pub(super) all_links_url: Url,
    config: Arc<LinkIndexConfig>,
}

impl LinkIndexClient {
    pub fn new(config: Arc<LinkIndexConfig>) -> Result<Self, ConfigError> {
        let client = config.http_client()?;
        Self::with_client(config, client)
    }

    /// Use a caller-built client. It should send `Accept: application/json`.
    pub fn with_client(config: Arc<LinkIndexConfig>, client: Client) -> Result<Self, ConfigError> {
        let base = parse_base(&config.instance_url)?;
        Ok(Self {
            client,
            links_url: endpoint(&base, LINKS_ROUTE)?,
            all_links_url: endpoint(&base, ALL_LINKS_ROUTE)?,
            config,
        })
    }

    pub fn config(&self) -> &LinkIndexConfig {
        &self.config
    }

    /// Fetch a single page of linking records. `cursor` is omitted on the
    /// first request.
    pub async fn fetch_page(&self, query: &LinkQuery, cursor: Option<&str>) -> Result<Page, LinkIndexError> {
        if query.target.trim().is_empty() {
            return Err(LinkIndexError::EmptyTarget);
        }

        let mut params = vec![
            ("target", query.target.as_str()),
            ("collection", query.collection.as_str()),
            ("path", query.path.as_str()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let page: Page = self.get_json(&self.links_url, &params).await?;
        debug!(
            link_target = %query.target,
            collection = %query.collection,
            records = page.records.len(),
            total = page.total,
            has_more = page.cursor.is_some(),
            "Fetched link page"
        );
        Ok(page)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<T, LinkIndexError> {
        if !self.config.enabled {
            return Err(LinkIndexError::Disabled);
        }

        debug!("Link index GET {} {:?}", url, params);

        let response = self.client.get(url.clone()).query(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LinkIndexError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: truncate_body(&body, MAX_DIAGNOSTIC_BYTES),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
