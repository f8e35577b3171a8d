//! Artifactory-backed authorization client.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use keyward_application::{AuthorizationClient, PermissionTargetDefinition};
use keyward_core::{AppError, AppResult};
use keyward_domain::PermissionTargetSpec;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

mod payloads;


/// Payload and endpoint family used to talk to Artifactory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArtifactoryApiVersion {
    /// `/artifactory/api/security/*` with single-letter operation codes.
    Legacy,
    /// Access groups plus `/artifactory/api/v2/security/permissions`.
    #[default]
    V2,
}

impl ArtifactoryApiVersion {
    /// Returns the configuration value for this version.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::V2 => "v2",
        }
    }
}

impl FromStr for ArtifactoryApiVersion {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" => Ok(Self::Legacy),
            "v2" => Ok(Self::V2),
            other => Err(AppError::Validation(format!(
                "unknown Artifactory API version '{other}', expected 'legacy' or 'v2'"
            ))),
        }
    }
}

impl Display for ArtifactoryApiVersion {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Connection settings for [`ArtifactoryAuthorizationClient`].
#[derive(Debug, Clone)]
pub struct ArtifactoryClientConfig {
    /// Platform base URL, e.g. `https://example.jfrog.io/`.
    pub base_url: Url,
    /// Access token sent as a bearer credential.
    pub bearer_token: String,
    /// Endpoint family to use.
    pub api_version: ArtifactoryApiVersion,
    /// Attempts per request, including the first.
    pub max_attempts: u8,
    /// Linear backoff step between attempts.
    pub retry_backoff_ms: u64,
}

/// HTTP implementation of the authorization client port.
pub struct ArtifactoryAuthorizationClient {
    http_client: reqwest::Client,
    base_url: Url,
    bearer_token: String,
    api_version: ArtifactoryApiVersion,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl ArtifactoryAuthorizationClient {
    /// Creates a client, validating the base URL.
    pub fn new(http_client: reqwest::Client, config: ArtifactoryClientConfig) -> AppResult<Self> {
        let ArtifactoryClientConfig {
            base_url,
            bearer_token,
            api_version,
            max_attempts,
            retry_backoff_ms,
        } = config;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "Artifactory URL '{base_url}' must be an http(s) base URL"
            )));
        }

        if bearer_token.trim().is_empty() {
            return Err(AppError::Validation(
                "Artifactory bearer token must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            http_client,
            base_url,
            bearer_token,
            api_version,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        })
    }

    /// Returns the configured endpoint family.
    #[must_use]
    pub fn api_version(&self) -> ArtifactoryApiVersion {
        self.api_version
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Validation(format!(
                    "Artifactory URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn group_url(&self, group_name: &str) -> AppResult<Url> {
        match self.api_version {
            ArtifactoryApiVersion::Legacy => {
                self.endpoint(&["artifactory", "api", "security", "groups", group_name])
            }
            ArtifactoryApiVersion::V2 => self.endpoint(&["access", "api", "v2", "groups", group_name]),
        }
    }

    fn permission_target_url(&self, name: &str) -> AppResult<Url> {
        match self.api_version {
            ArtifactoryApiVersion::Legacy => {
                self.endpoint(&["artifactory", "api", "security", "permissions", name])
            }
            ArtifactoryApiVersion::V2 => self.endpoint(&[
                "artifactory",
                "api",
                "v2",
                "security",
                "permissions",
                name,
            ]),
        }
    }

    async fn send_with_retry<F>(&self, operation: &str, mut build: F) -> AppResult<reqwest::Response>
    where
        F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = build(&self.http_client)
                .bearer_auth(self.bearer_token.as_str())
                .send()
                .await;

            match response {
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} for {operation}",
                        response.status()
                    ));
                }
                Ok(response) => {
                    debug!(operation, status = %response.status(), attempt, "artifactory responded");
                    return Ok(response);
                }
                Err(error) => {
                    last_error = Some(format!("transport error for {operation}: {error}"));
                }
            }

            if attempt < self.max_attempts {
                warn!(
                    operation,
                    attempt,
                    error = last_error.as_deref().unwrap_or_default(),
                    "retrying artifactory request"
                );
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Unavailable(last_error.unwrap_or_else(|| {
            format!("{operation} exhausted retries")
        })))
    }

    async fn delete_object(&self, operation: &str, url: Url) -> AppResult<()> {
        let response = self
            .send_with_retry(operation, |client| client.delete(url.clone()))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(operation, "artifactory object already absent");
            return Ok(());
        }

        expect_success(operation, response).await
    }
}

#[async_trait]
impl AuthorizationClient for ArtifactoryAuthorizationClient {
    async fn create_or_replace_group(&self, group_name: &str, description: &str) -> AppResult<()> {
        let operation = format!("group upsert '{group_name}'");

        match self.api_version {
            ArtifactoryApiVersion::Legacy => {
                let url = self.group_url(group_name)?;
                let body = payloads::legacy_group(group_name, description);
                let response = self
                    .send_with_retry(&operation, |client| client.put(url.clone()).json(&body))
                    .await?;
                expect_success(&operation, response).await
            }
            ArtifactoryApiVersion::V2 => {
                let collection = self.endpoint(&["access", "api", "v2", "groups"])?;
                let body = payloads::v2_group(group_name, description);
                let response = self
                    .send_with_retry(&operation, |client| {
                        client.post(collection.clone()).json(&body)
                    })
                    .await?;
                if response.status() != StatusCode::CONFLICT {
                    return expect_success(&operation, response).await;
                }

                let url = self.group_url(group_name)?;
                let update = payloads::v2_group_update(description);
                let response = self
                    .send_with_retry(&operation, |client| client.patch(url.clone()).json(&update))
                    .await?;
                expect_success(&operation, response).await
            }
        }
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<()> {
        let url = self.group_url(group_name)?;
        self.delete_object(&format!("group delete '{group_name}'"), url)
            .await
    }

    async fn permission_target_exists(&self, name: &str) -> AppResult<bool> {
        let operation = format!("permission target lookup '{name}'");
        let url = self.permission_target_url(name)?;
        let response = self
            .send_with_retry(&operation, |client| client.get(url.clone()))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(response_error(&operation, response).await),
        }
    }

    async fn create_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        let operation = format!("permission target create '{}'", definition.name);
        let url = self.permission_target_url(definition.name.as_str())?;

        let response = match self.api_version {
            ArtifactoryApiVersion::Legacy => {
                let body = payloads::legacy_permission_target(definition)?;
                self.send_with_retry(&operation, |client| client.put(url.clone()).json(&body))
                    .await?
            }
            ArtifactoryApiVersion::V2 => {
                let body = payloads::v2_permission_target(definition)?;
                self.send_with_retry(&operation, |client| client.post(url.clone()).json(&body))
                    .await?
            }
        };

        if response.status() == StatusCode::CONFLICT {
            debug!(operation = %operation, "permission target already exists, updating it");
            return self.update_permission_target(definition).await;
        }

        expect_success(&operation, response).await
    }

    async fn update_permission_target(
        &self,
        definition: &PermissionTargetDefinition,
    ) -> AppResult<()> {
        let operation = format!("permission target update '{}'", definition.name);
        let url = self.permission_target_url(definition.name.as_str())?;

        let response = match self.api_version {
            ArtifactoryApiVersion::Legacy => {
                let body = payloads::legacy_permission_target(definition)?;
                self.send_with_retry(&operation, |client| client.put(url.clone()).json(&body))
                    .await?
            }
            ArtifactoryApiVersion::V2 => {
                let body = payloads::v2_permission_target(definition)?;
                self.send_with_retry(&operation, |client| client.put(url.clone()).json(&body))
                    .await?
            }
        };

        expect_success(&operation, response).await
    }

    async fn delete_permission_target(&self, name: &str) -> AppResult<()> {
        let url = self.permission_target_url(name)?;
        self.delete_object(&format!("permission target delete '{name}'"), url)
            .await
    }

    fn check_compatibility(&self, spec: &PermissionTargetSpec) -> AppResult<()> {
        match self.api_version {
            ArtifactoryApiVersion::Legacy => payloads::check_legacy_compatibility(spec),
            ArtifactoryApiVersion::V2 => Ok(()),
        }
    }
}

async fn expect_success(operation: &str, response: reqwest::Response) -> AppResult<()> {
    if response.status().is_success() {
        return Ok(());
    }

    Err(response_error(operation, response).await)
}

async fn response_error(operation: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());

    status_error(operation, status, body.as_str())
}

fn status_error(operation: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{operation} failed with status {status}: {body}");
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        status if status.is_client_error() => AppError::Validation(message),
        _ => AppError::Unavailable(message),
    }
}
