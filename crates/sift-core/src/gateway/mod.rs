//! Remote item gateway
//!
//! The sync engine talks to the remote source of truth through the
//! [`ItemGateway`] trait; [`HttpItemGateway`] is the production HTTP client.
//! Any non-success outcome (timeout, 4xx, 5xx, transport failure) is treated
//! uniformly as "remote attempt failed" — a 404 on update/delete included,
//! since the item may simply not exist there yet.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Item, ItemFields, ItemId, ItemPatch, ItemStatus, WeekKey};
use crate::util::{compact_text, normalize_text_option};

/// Cap on any single remote call; a mutation must resolve (optimistically at
/// worst) within one timeout window regardless of connectivity.
const HTTP_TIMEOUT_SECS: u64 = 10;

/// Remote call failure; opaque to the sync engine, which degrades every
/// variant to enqueue-and-retry-later.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Gateway HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gateway API error: {0}")]
    Api(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Filter for listing remote items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub week_of: Option<WeekKey>,
}

impl ItemFilter {
    /// Active items of one weekly batch.
    #[must_use]
    pub const fn active_for_week(week_of: WeekKey) -> Self {
        Self {
            status: Some(ItemStatus::Active),
            week_of: Some(week_of),
        }
    }

    fn to_query(self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(week_of) = self.week_of {
            pairs.push(("week_of", week_of.to_string()));
        }
        pairs
    }
}

/// Contract of the remote item store.
#[allow(async_fn_in_trait)]
pub trait ItemGateway {
    /// Fetch items matching the filter
    async fn list(&self, filter: &ItemFilter) -> GatewayResult<Vec<Item>>;

    /// Create an item; the response carries the permanent id
    async fn create(&self, fields: &ItemFields) -> GatewayResult<Item>;

    /// Push changed fields; the response is the updated record
    async fn update(&self, id: &ItemId, patch: &ItemPatch) -> GatewayResult<Item>;

    /// Soft-delete by id
    async fn soft_delete(&self, id: &ItemId) -> GatewayResult<()>;

    /// Transition every item of a weekly batch from one status to another
    async fn bulk_transition_status(
        &self,
        from: ItemStatus,
        week_of: WeekKey,
        to: ItemStatus,
    ) -> GatewayResult<()>;
}

/// HTTP implementation of [`ItemGateway`].
#[derive(Clone)]
pub struct HttpItemGateway {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpItemGateway {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> GatewayResult<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    fn items_url(&self) -> String {
        format!("{}/v1/items", self.base_url)
    }

    fn item_url(&self, id: &ItemId) -> String {
        format!("{}/v1/items/{}", self.base_url, id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-success response into an API error.
    async fn check(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Api(parse_api_error(status, &body)))
    }
}

impl ItemGateway for HttpItemGateway {
    async fn list(&self, filter: &ItemFilter) -> GatewayResult<Vec<Item>> {
        let response = self
            .authorize(self.client.get(self.items_url()))
            .query(&filter.to_query())
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create(&self, fields: &ItemFields) -> GatewayResult<Item> {
        let response = self
            .authorize(self.client.post(self.items_url()))
            .json(fields)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn update(&self, id: &ItemId, patch: &ItemPatch) -> GatewayResult<Item> {
        let response = self
            .authorize(self.client.patch(self.item_url(id)))
            .json(patch)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn soft_delete(&self, id: &ItemId) -> GatewayResult<()> {
        let response = self
            .authorize(self.client.delete(self.item_url(id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn bulk_transition_status(
        &self,
        from: ItemStatus,
        week_of: WeekKey,
        to: ItemStatus,
    ) -> GatewayResult<()> {
        let response = self
            .authorize(self.client.post(format!("{}/transition", self.items_url())))
            .json(&TransitionRequest { from, week_of, to })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TransitionRequest {
    from: ItemStatus,
    week_of: WeekKey,
    to: ItemStatus,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> GatewayResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        GatewayError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(GatewayError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
