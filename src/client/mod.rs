// This file is part of the terraform-provider-dbtcloud project
//
// Copyright (C) ANEO, 2024-2026. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use reqwest_middleware::ClientWithMiddleware;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tf_provider::Diagnostics;
use tokio::sync::RwLock;
use url::Url;

mod error;
mod retry;

pub use error::{is_not_found, ApiError};

pub const DEFAULT_HOST_URL: &str = "https://cloud.getdbt.com/api";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRIABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("terraform-provider-dbtcloud/", env!("CARGO_PKG_VERSION"));

/// Resolved settings used to build a [`DbtCloudClient`]
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host_url: String,
    pub account_id: i64,
    pub token: String,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub retriable_status_codes: Vec<u16>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(account_id: i64, token: impl Into<String>) -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.to_owned(),
            account_id,
            token: token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retriable_status_codes: DEFAULT_RETRIABLE_STATUS_CODES.to_vec(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host_url", &self.host_url)
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .field("retry_interval", &self.retry_interval)
            .field("retriable_status_codes", &self.retriable_status_codes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// HTTP client for the dbt Cloud v2 and v3 REST APIs
pub struct DbtCloudClient {
    http: ClientWithMiddleware,
    host_url: String,
    account_id: i64,
}

impl Debug for DbtCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbtCloudClient")
            .field("host_url", &self.host_url)
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl DbtCloudClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let host_url = Url::parse(config.host_url.trim_end_matches('/'))?;

        let mut authorization = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| ApiError::InvalidToken)?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http: retry::with_retries(
                http,
                config.max_retries,
                config.retry_interval,
                config.retriable_status_codes.clone(),
            ),
            host_url: host_url.as_str().trim_end_matches('/').to_owned(),
            account_id: config.account_id,
        })
    }

    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// URL of a v2 endpoint of the configured account
    pub fn v2(&self, path: &str) -> String {
        self.url("v2", path)
    }

    /// URL of a v3 endpoint of the configured account
    pub fn v3(&self, path: &str) -> String {
        self.url("v3", path)
    }

    fn url(&self, version: &str, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/{version}/accounts/{}/", self.host_url, self.account_id)
        } else {
            format!(
                "{}/{version}/accounts/{}/{path}/",
                self.host_url, self.account_id
            )
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let body = self.send(Method::GET, url, None::<&()>).await?;
        decode(url, &body)
    }

    pub async fn post<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::POST, url, Some(body)).await?;
        decode(url, &body)
    }

    pub async fn put<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::PUT, url, Some(body)).await?;
        decode(url, &body)
    }

    pub async fn patch<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(Method::PATCH, url, Some(body)).await?;
        decode(url, &body)
    }

    pub async fn delete(&self, url: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, url, None::<&()>).await?;
        Ok(())
    }

    pub async fn delete_with_body<B>(&self, url: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        self.send(Method::DELETE, url, Some(body)).await?;
        Ok(())
    }

    /// Fetch the configured account, failing if the token cannot access it
    pub async fn verify_account(&self) -> Result<(), ApiError> {
        let _: serde_json::Value = self.get(&self.v2("")).await?;
        Ok(())
    }

    async fn send<B>(&self, method: Method, url: &str, body: Option<&B>) -> Result<String, ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        tracing::debug!(%method, url, "calling dbt Cloud");

        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(%method, url, "dbt Cloud object not found");
            return Err(ApiError::NotFound(url.to_owned()));
        }
        if !status.is_success() {
            tracing::warn!(%method, url, %status, "dbt Cloud request failed");
            return Err(ApiError::status(status, url, text));
        }
        Ok(text)
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(|envelope| envelope.data)
        .map_err(|source| ApiError::Decode {
            url: url.to_owned(),
            source,
        })
}

/// Shared slot filled by the provider once it is configured
///
/// Resources and data sources are instantiated before Terraform sends the
/// provider configuration, so they keep a handle and look the client up on
/// every call.
#[derive(Debug, Clone, Default)]
pub struct ClientHandle(Arc<RwLock<Option<Arc<DbtCloudClient>>>>);

impl ClientHandle {
    pub async fn set(&self, client: DbtCloudClient) {
        *self.0.write().await = Some(Arc::new(client));
    }

    /// Get the configured client, or report that the provider is not configured
    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<DbtCloudClient>> {
        let client = self.0.read().await.clone();
        if client.is_none() {
            diags.root_error(
                "Provider not configured",
                "The dbt Cloud client is not available: the provider has not been configured yet.",
            );
        }
        client
    }
}
