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

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueBool, ValueList, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema,
    value::ValueEmpty, AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider,
};
use url::Url;

use crate::client::{
    ClientConfig, ClientHandle, DbtCloudClient, DEFAULT_HOST_URL, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRIABLE_STATUS_CODES, DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT,
};
use crate::lifecycle::schema::{optional, sensitive};
use crate::lifecycle::{GenericApiDataSource, GenericApiResource};
use crate::objects::{
    BigQueryCredential, DatabricksCredential, Environment, EnvironmentVariable, IpRestrictionsRule,
    Job, LicenseMap, OAuthConfiguration, PostgresCredential, PostgresFlavour, Project,
    ProjectRepository, Repository, SemanticLayerConfiguration, SnowflakeCredential,
};
use crate::utils::{check_non_negative, known, known_str};

pub const ENV_TOKEN: &str = "DBT_CLOUD_TOKEN";
pub const ENV_ACCOUNT_ID: &str = "DBT_CLOUD_ACCOUNT_ID";
pub const ENV_HOST_URL: &str = "DBT_CLOUD_HOST_URL";
pub const ENV_MAX_RETRIES: &str = "DBT_CLOUD_MAX_RETRIES";
pub const ENV_RETRY_INTERVAL: &str = "DBT_CLOUD_RETRY_INTERVAL_SECONDS";
pub const ENV_TIMEOUT: &str = "DBT_CLOUD_TIMEOUT_SECONDS";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub token: ValueString<'a>,
    pub account_id: ValueNumber,
    pub host_url: ValueString<'a>,
    pub max_retries: ValueNumber,
    pub retry_interval_seconds: ValueNumber,
    pub retriable_status_codes: ValueList<ValueNumber>,
    pub timeout_seconds: ValueNumber,
    pub skip_credentials_validation: ValueBool,
}

#[derive(Debug, Default, Clone)]
pub struct DbtCloudProvider {
    client: ClientHandle,
}

fn check_host_url(diags: &mut Diagnostics, attr_path: AttributePath, host_url: &str) {
    match Url::parse(host_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => (),
        Ok(url) => diags.error(
            format!("Invalid host URL `{host_url}`"),
            format!("Expected an http(s) URL, got the `{}` scheme", url.scheme()),
            attr_path,
        ),
        Err(err) => diags.error(
            format!("Invalid host URL `{host_url}`"),
            err.to_string(),
            attr_path,
        ),
    }
}

fn check_status_codes(diags: &mut Diagnostics, codes: &ValueList<ValueNumber>) {
    for (i, code) in known(codes).into_iter().flatten().enumerate() {
        if let Value::Value(code) = code {
            if !(100..=599).contains(code) {
                diags.error_short(
                    format!("`{code}` is not an HTTP status code"),
                    AttributePath::new("retriable_status_codes").index(i as i64),
                );
            }
        }
    }
}

/// Parse an environment variable, reporting it by name when malformed
fn parse_env<T: FromStr>(
    diags: &mut Diagnostics,
    env: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = env(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            diags.root_error(
                format!("Invalid `{name}` environment variable"),
                format!("`{raw}` is not a valid value"),
            );
            None
        }
    }
}

/// Configured value, then the environment variable, then the default
fn number_setting<T: FromStr + TryFrom<i64>>(
    diags: &mut Diagnostics,
    env: &impl Fn(&str) -> Option<String>,
    value: &ValueNumber,
    attribute: &'static str,
    env_name: &str,
    default: T,
) -> T {
    match known(value) {
        Some(value) => T::try_from(*value).unwrap_or_else(|_| {
            diags.error_short(
                format!("`{value}` is out of range"),
                AttributePath::new(attribute),
            );
            default
        }),
        None => parse_env(diags, env, env_name).unwrap_or(default),
    }
}

/// Merge the provider block with the `DBT_CLOUD_*` environment variables
///
/// Returns `None` after reporting errors when no usable configuration can be
/// built.
pub(crate) fn resolve(
    diags: &mut Diagnostics,
    config: &ProviderConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ClientConfig> {
    let errors = diags.errors.len();

    let token = known_str(&config.token)
        .map(str::to_owned)
        .or_else(|| env(ENV_TOKEN))
        .filter(|token| !token.is_empty());
    if token.is_none() {
        diags.error(
            "Missing dbt Cloud token",
            format!("Set `token` in the provider block or the `{ENV_TOKEN}` environment variable"),
            AttributePath::new("token"),
        );
    }

    let account_id = match known(&config.account_id) {
        Some(account_id) => Some(*account_id),
        None => parse_env::<i64>(diags, &env, ENV_ACCOUNT_ID),
    };
    if let Some(account_id) = account_id {
        check_non_negative(
            diags,
            AttributePath::new("account_id"),
            &Value::Value(account_id),
        );
    }
    if account_id.is_none() && env(ENV_ACCOUNT_ID).is_none() {
        diags.error(
            "Missing dbt Cloud account ID",
            format!(
                "Set `account_id` in the provider block or the `{ENV_ACCOUNT_ID}` environment variable"
            ),
            AttributePath::new("account_id"),
        );
    }

    let host_url = known_str(&config.host_url)
        .map(str::to_owned)
        .or_else(|| env(ENV_HOST_URL))
        .unwrap_or_else(|| DEFAULT_HOST_URL.to_owned());
    check_host_url(diags, AttributePath::new("host_url"), &host_url);

    let max_retries = number_setting(
        diags,
        &env,
        &config.max_retries,
        "max_retries",
        ENV_MAX_RETRIES,
        DEFAULT_MAX_RETRIES,
    );
    let retry_interval = number_setting(
        diags,
        &env,
        &config.retry_interval_seconds,
        "retry_interval_seconds",
        ENV_RETRY_INTERVAL,
        DEFAULT_RETRY_INTERVAL.as_secs(),
    );
    let timeout = number_setting(
        diags,
        &env,
        &config.timeout_seconds,
        "timeout_seconds",
        ENV_TIMEOUT,
        DEFAULT_TIMEOUT.as_secs(),
    );

    let retriable_status_codes = match &config.retriable_status_codes {
        Value::Value(codes) => codes
            .iter()
            .filter_map(|code| known(code).and_then(|code| u16::try_from(*code).ok()))
            .collect(),
        Value::Null | Value::Unknown => DEFAULT_RETRIABLE_STATUS_CODES.to_vec(),
    };
    check_status_codes(diags, &config.retriable_status_codes);

    if diags.errors.len() > errors {
        return None;
    }
    Some(ClientConfig {
        host_url,
        account_id: account_id?,
        token: token?,
        max_retries,
        retry_interval: Duration::from_secs(retry_interval),
        retriable_status_codes,
        timeout: Duration::from_secs(timeout),
    })
}

#[async_trait]
impl Provider for DbtCloudProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "token" => sensitive(optional(
                        AttributeType::String,
                        "API token, defaults to the DBT_CLOUD_TOKEN environment variable",
                    )),
                    "account_id" => optional(
                        AttributeType::Number,
                        "Account ID, defaults to the DBT_CLOUD_ACCOUNT_ID environment variable",
                    ),
                    "host_url" => optional(
                        AttributeType::String,
                        "API base URL, defaults to DBT_CLOUD_HOST_URL or https://cloud.getdbt.com/api",
                    ),
                    "max_retries" => optional(
                        AttributeType::Number,
                        "Retries of a failed request, defaults to DBT_CLOUD_MAX_RETRIES or 3",
                    ),
                    "retry_interval_seconds" => optional(
                        AttributeType::Number,
                        "Delay between retries, defaults to DBT_CLOUD_RETRY_INTERVAL_SECONDS or 10",
                    ),
                    "retriable_status_codes" => optional(
                        AttributeType::List(Box::new(AttributeType::Number)),
                        "HTTP statuses worth a retry, defaults to 429, 500, 502, 503 and 504",
                    ),
                    "timeout_seconds" => optional(
                        AttributeType::Number,
                        "Request timeout, defaults to DBT_CLOUD_TIMEOUT_SECONDS or 30",
                    ),
                    "skip_credentials_validation" => optional(
                        AttributeType::Bool,
                        "Do not check the token against the account when configuring the provider",
                    ),
                },
                description: Description::plain("dbt Cloud"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        for (attribute, value) in [
            ("account_id", &config.account_id),
            ("max_retries", &config.max_retries),
            ("retry_interval_seconds", &config.retry_interval_seconds),
            ("timeout_seconds", &config.timeout_seconds),
        ] {
            check_non_negative(diags, AttributePath::new(attribute), value);
        }
        if let Some(host_url) = known_str(&config.host_url) {
            check_host_url(diags, AttributePath::new("host_url"), host_url);
        }
        check_status_codes(diags, &config.retriable_status_codes);

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let client_config = resolve(diags, &config, |name| std::env::var(name).ok())?;
        tracing::debug!(
            ?client_config,
            terraform_version,
            "configuring dbt Cloud provider"
        );

        let client = match DbtCloudClient::new(&client_config) {
            Ok(client) => client,
            Err(err) => {
                diags.root_error("Cannot create the dbt Cloud client", err.to_string());
                return None;
            }
        };

        if known(&config.skip_credentials_validation) != Some(&true) {
            if let Err(err) = client.verify_account().await {
                diags.root_error(
                    format!(
                        "Cannot access dbt Cloud account {}",
                        client_config.account_id
                    ),
                    err.to_string(),
                );
                return None;
            }
        }

        self.client.set(client).await;
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let client = &self.client;
        Some(map! {
            "project" => GenericApiResource::new(Project, client.clone()),
            "environment" => GenericApiResource::new(Environment, client.clone()),
            "repository" => GenericApiResource::new(Repository, client.clone()),
            "project_repository" => GenericApiResource::new(ProjectRepository, client.clone()),
            "snowflake_credential" => GenericApiResource::new(SnowflakeCredential, client.clone()),
            "bigquery_credential" => GenericApiResource::new(BigQueryCredential, client.clone()),
            "postgres_credential" => GenericApiResource::new(
                PostgresCredential::new(PostgresFlavour::Postgres),
                client.clone(),
            ),
            "redshift_credential" => GenericApiResource::new(
                PostgresCredential::new(PostgresFlavour::Redshift),
                client.clone(),
            ),
            "databricks_credential" => GenericApiResource::new(DatabricksCredential, client.clone()),
            "job" => GenericApiResource::new(Job, client.clone()),
            "environment_variable" => GenericApiResource::new(EnvironmentVariable, client.clone()),
            "oauth_configuration" => GenericApiResource::new(OAuthConfiguration, client.clone()),
            "ip_restrictions_rule" => GenericApiResource::new(IpRestrictionsRule, client.clone()),
            "license_map" => GenericApiResource::new(LicenseMap, client.clone()),
            "semantic_layer_configuration" => GenericApiResource::new(
                SemanticLayerConfiguration,
                client.clone(),
            ),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        let client = &self.client;
        Some(map! {
            "project" => GenericApiDataSource::new(Project, client.clone()),
            "environment" => GenericApiDataSource::new(Environment, client.clone()),
            "repository" => GenericApiDataSource::new(Repository, client.clone()),
            "snowflake_credential" => GenericApiDataSource::new(SnowflakeCredential, client.clone()),
            "bigquery_credential" => GenericApiDataSource::new(BigQueryCredential, client.clone()),
            "postgres_credential" => GenericApiDataSource::new(
                PostgresCredential::new(PostgresFlavour::Postgres),
                client.clone(),
            ),
            "redshift_credential" => GenericApiDataSource::new(
                PostgresCredential::new(PostgresFlavour::Redshift),
                client.clone(),
            ),
            "databricks_credential" => GenericApiDataSource::new(DatabricksCredential, client.clone()),
            "job" => GenericApiDataSource::new(Job, client.clone()),
            "environment_variable" => GenericApiDataSource::new(EnvironmentVariable, client.clone()),
            "oauth_configuration" => GenericApiDataSource::new(OAuthConfiguration, client.clone()),
            "ip_restrictions_rule" => GenericApiDataSource::new(IpRestrictionsRule, client.clone()),
            "license_map" => GenericApiDataSource::new(LicenseMap, client.clone()),
            "semantic_layer_configuration" => GenericApiDataSource::new(
                SemanticLayerConfiguration,
                client.clone(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer};

    use crate::testing::{data, s, v2, ACCOUNT_ID};

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn environment_fills_missing_attributes() {
        let env = |name: &str| match name {
            ENV_TOKEN => Some("from-env".to_owned()),
            ENV_ACCOUNT_ID => Some(" 12 ".to_owned()),
            ENV_MAX_RETRIES => Some("5".to_owned()),
            _ => None,
        };
        let mut diags = Diagnostics::default();
        let config = resolve(
            &mut diags,
            &ProviderConfig {
                retry_interval_seconds: Value::Value(2),
                ..Default::default()
            },
            env,
        )
        .unwrap();
        assert_eq!(config.token, "from-env");
        assert_eq!(config.account_id, 12);
        assert_eq!(config.host_url, DEFAULT_HOST_URL);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_interval, Duration::from_secs(2));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            config.retriable_status_codes,
            DEFAULT_RETRIABLE_STATUS_CODES
        );
    }

    #[test]
    fn attributes_win_over_the_environment() {
        let env = |name: &str| (name == ENV_TOKEN).then(|| "from-env".to_owned());
        let mut diags = Diagnostics::default();
        let config = resolve(
            &mut diags,
            &ProviderConfig {
                token: s("from-config"),
                account_id: Value::Value(3),
                retriable_status_codes: Value::Value(vec![Value::Value(429)]),
                ..Default::default()
            },
            env,
        )
        .unwrap();
        assert_eq!(config.token, "from-config");
        assert_eq!(config.retriable_status_codes, vec![429]);
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut diags = Diagnostics::default();
        assert!(resolve(&mut diags, &ProviderConfig::default(), no_env).is_none());
        assert_eq!(diags.errors.len(), 2);

        let mut diags = Diagnostics::default();
        let env = |name: &str| (name == ENV_ACCOUNT_ID).then(|| "abc".to_owned());
        let config = ProviderConfig {
            token: s("t"),
            ..Default::default()
        };
        assert!(resolve(&mut diags, &config, env).is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn negative_account_from_the_environment_is_rejected() {
        let env = |name: &str| (name == ENV_ACCOUNT_ID).then(|| "-4".to_owned());
        let config = ProviderConfig {
            token: s("t"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        assert!(resolve(&mut diags, &config, env).is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn validate_checks_ranges_and_urls() {
        let provider = DbtCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            host_url: Value::Value(Cow::Borrowed("ftp://cloud.getdbt.com")),
            max_retries: Value::Value(-1),
            retriable_status_codes: Value::Value(vec![Value::Value(503), Value::Value(42)]),
            timeout_seconds: Value::Unknown,
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 3);

        let mut diags = Diagnostics::default();
        assert!(provider
            .validate(&mut diags, ProviderConfig::default())
            .await
            .is_some());
    }

    #[tokio::test]
    async fn configure_verifies_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(v2("")))
            .and(header("Authorization", "Token good"))
            .respond_with(data(json!({"id": ACCOUNT_ID, "name": "acme"})))
            .expect(1)
            .mount(&server)
            .await;

        let provider = DbtCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            token: s("good"),
            account_id: Value::Value(ACCOUNT_ID),
            host_url: Value::Value(Cow::Owned(format!("{}/api", server.uri()))),
            max_retries: Value::Value(0),
            ..Default::default()
        };
        assert!(provider
            .configure(&mut diags, "1.9.0".to_owned(), config)
            .await
            .is_some());
        assert!(provider.client.get(&mut diags).await.is_some());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn configure_rejects_unknown_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(v2("")))
            .respond_with(wiremock::ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = DbtCloudProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            token: s("bad"),
            account_id: Value::Value(ACCOUNT_ID),
            host_url: Value::Value(Cow::Owned(format!("{}/api", server.uri()))),
            max_retries: Value::Value(0),
            ..Default::default()
        };
        assert!(provider
            .configure(&mut diags, "1.9.0".to_owned(), config)
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn every_object_is_registered() {
        let provider = DbtCloudProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(resources.len(), 15);
        assert_eq!(data_sources.len(), 14);
        assert!(resources.contains_key("project_repository"));
        assert!(!data_sources.contains_key("project_repository"));
    }
}
