//! HTTP client for the notification endpoints.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{ApiError, NotificationApi};
use crate::config::HttpSettings;
use crate::notifications::{
    BadgeCountResponse, MarkAsReadResponse, NotificationRecord, NotificationsResponse, Page,
};

/// `reqwest`-backed implementation of [`NotificationApi`].
pub struct HttpNotificationApi {
    client: reqwest::Client,
    base_url: String,
    base: Url,
    auth_token: Option<String>,
}

impl HttpNotificationApi {
    /// Create a new client.
    ///
    /// The request timeout applies to every call; a timed-out request is
    /// reported as [`ApiError::Timeout`].
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        // Ensure base_url doesn't have trailing slash
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .with_context(|| format!("Invalid base URL {}", base_url))?;
        if base.cannot_be_a_base() {
            bail!("Base URL {} cannot carry a path", base_url);
        }

        Ok(Self {
            client,
            base_url,
            base,
            auth_token: settings.auth_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Always Ok: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_notifications(&self, cursor: Option<String>) -> Result<Page, ApiError> {
        let url = self.endpoint(&["notifications"]);
        let mut request = self.client.get(url.clone());
        if let Some(cursor) = &cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        debug!("GET {} (cursor: {:?})", url, cursor);

        let body: NotificationsResponse = self.send_json(request).await?;
        Ok(body.into())
    }

    async fn mark_as_read(&self, notification_id: String) -> Result<NotificationRecord, ApiError> {
        let url = self.endpoint(&["notifications", notification_id.as_str(), "read"]);
        debug!("POST {}", url);

        let body: MarkAsReadResponse = self.send_json(self.client.post(url)).await?;
        Ok(body.data)
    }

    async fn badge_count(&self) -> Result<u32, ApiError> {
        let url = self.endpoint(&["notifications", "badge-count"]);
        debug!("GET {}", url);

        let body: BadgeCountResponse = self.send_json(self.client.get(url)).await?;
        Ok(body.data.unread_count)
    }
}
