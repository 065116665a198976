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

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::decode_id;
use crate::lifecycle::schema::{computed, id, optional, required, sensitive};
use crate::lifecycle::{ApiObject, ChangeSet};
use crate::utils::{check_one_of, check_requires, known, known_str, non_empty, plan_computed};

pub const OAUTH_TYPES: &[&str] = &["entra", "okta"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfigurationState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub oauth_configuration_id: ValueNumber,
    pub r#type: ValueString<'a>,
    pub name: ValueString<'a>,
    pub client_id: ValueString<'a>,
    pub client_secret: ValueString<'a>,
    pub authorize_url: ValueString<'a>,
    pub token_url: ValueString<'a>,
    pub redirect_uri: ValueString<'a>,
    pub application_id_uri: ValueString<'a>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OAuthExtra {
    #[serde(default)]
    pub application_id_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfigurationModel {
    pub id: i64,
    #[serde(rename = "type")]
    pub oauth_type: String,
    pub name: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub oauth_configuration_extra: Option<OAuthExtra>,
}

#[derive(Debug, Default, Serialize)]
struct OAuthExtraPayload<'b> {
    application_id_uri: Option<&'b str>,
}

#[derive(Debug, Default, Serialize)]
struct OAuthPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    oauth_type: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorize_url: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_url: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oauth_configuration_extra: Option<OAuthExtraPayload<'b>>,
}

/// `dbtcloud_oauth_configuration`: external OAuth for warehouse connections
#[derive(Debug, Default, Clone)]
pub struct OAuthConfiguration;

fn configuration_id(state: &OAuthConfigurationState) -> Result<i64> {
    known(&state.oauth_configuration_id)
        .copied()
        .context("The OAuth configuration ID is not known")
}

fn extra<'b>(state: &'b OAuthConfigurationState) -> Option<OAuthExtraPayload<'b>> {
    (known_str(&state.r#type) == Some("entra")).then(|| OAuthExtraPayload {
        application_id_uri: known_str(&state.application_id_uri),
    })
}

#[async_trait]
impl ApiObject for OAuthConfiguration {
    const ID_FORMAT: &'static str = "`oauth_configuration_id`";
    const KEYS: &'static [&'static str] = &["oauth_configuration_id"];
    const REPLACE_ON: &'static [&'static str] = &["type"];

    type State<'a> = OAuthConfigurationState<'a>;
    type Model = OAuthConfigurationModel;

    fn kind(&self) -> &'static str {
        "OAuth configuration"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the OAuth configuration"),
                    "oauth_configuration_id" => computed(
                        AttributeType::Number,
                        "The numeric ID of the OAuth configuration",
                    ),
                    "type" => required(AttributeType::String, "Identity provider: `entra` or `okta`"),
                    "name" => required(AttributeType::String, "Name of the configuration"),
                    "client_id" => required(AttributeType::String, "OAuth client ID"),
                    "client_secret" => sensitive(required(AttributeType::String, "OAuth client secret")),
                    "authorize_url" => required(AttributeType::String, "Authorization endpoint"),
                    "token_url" => required(AttributeType::String, "Token endpoint"),
                    "redirect_uri" => required(AttributeType::String, "Redirect URI registered at the identity provider"),
                    "application_id_uri" => optional(
                        AttributeType::String,
                        "Application ID URI, only for `entra`",
                    ),
                },
                description: Description::plain(
                    "External OAuth configuration of the dbt Cloud account",
                ),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_one_of(
            diags,
            AttributePath::new("type"),
            &config.r#type,
            OAUTH_TYPES,
        );
        if let Some(oauth_type) = known_str(&config.r#type) {
            check_requires(
                diags,
                AttributePath::new("application_id_uri"),
                &config.application_id_uri,
                oauth_type == "entra",
                "`application_id_uri` is only used by `entra` configurations",
            );
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("type", &prior.r#type, &planned.r#type)
            .track("name", &prior.name, &planned.name)
            .track("client_id", &prior.client_id, &planned.client_id)
            .track(
                "client_secret",
                &prior.client_secret,
                &planned.client_secret,
            )
            .track(
                "authorize_url",
                &prior.authorize_url,
                &planned.authorize_url,
            )
            .track("token_url", &prior.token_url, &planned.token_url)
            .track("redirect_uri", &prior.redirect_uri, &planned.redirect_uri)
            .track(
                "application_id_uri",
                &prior.application_id_uri,
                &planned.application_id_uri,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.oauth_configuration_id,
            prior.map(|prior| &prior.oauth_configuration_id),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [configuration_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(OAuthConfigurationState {
            oauth_configuration_id: Value::Value(configuration_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(model.id.to_string().into());
        state.oauth_configuration_id = Value::Value(model.id);
        state.r#type = Value::Value(model.oauth_type.into());
        state.name = Value::Value(model.name.into());
        state.client_id = non_empty(&state.client_id, model.client_id);
        state.authorize_url = non_empty(&state.authorize_url, model.authorize_url);
        state.token_url = non_empty(&state.token_url, model.token_url);
        state.redirect_uri = non_empty(&state.redirect_uri, model.redirect_uri);
        state.application_id_uri = non_empty(
            &state.application_id_uri,
            model
                .oauth_configuration_extra
                .and_then(|extra| extra.application_id_uri),
        );
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = OAuthPayload {
            account_id: Some(client.account_id()),
            oauth_type: known_str(&planned.r#type),
            name: known_str(&planned.name),
            client_id: known_str(&planned.client_id),
            client_secret: known_str(&planned.client_secret),
            authorize_url: known_str(&planned.authorize_url),
            token_url: known_str(&planned.token_url),
            redirect_uri: known_str(&planned.redirect_uri),
            oauth_configuration_extra: extra(planned),
        };
        Ok(client
            .post(&client.v3("oauth-configurations"), &payload)
            .await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let configuration_id = configuration_id(state)?;
        Ok(client
            .get(&client.v3(&format!("oauth-configurations/{configuration_id}")))
            .await?)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let configuration_id = configuration_id(prior)?;
        let payload = OAuthPayload {
            name: changes.pick("name", known_str(&planned.name)).flatten(),
            client_id: changes
                .pick("client_id", known_str(&planned.client_id))
                .flatten(),
            client_secret: changes
                .pick("client_secret", known_str(&planned.client_secret))
                .flatten(),
            authorize_url: changes
                .pick("authorize_url", known_str(&planned.authorize_url))
                .flatten(),
            token_url: changes
                .pick("token_url", known_str(&planned.token_url))
                .flatten(),
            redirect_uri: changes
                .pick("redirect_uri", known_str(&planned.redirect_uri))
                .flatten(),
            oauth_configuration_extra: changes.pick("application_id_uri", extra(planned)).flatten(),
            ..Default::default()
        };
        Ok(client
            .patch(
                &client.v3(&format!("oauth-configurations/{configuration_id}")),
                &payload,
            )
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let configuration_id = configuration_id(state)?;
        client
            .delete(&client.v3(&format!("oauth-configurations/{configuration_id}")))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tf_provider::Resource;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::Mock;

    use crate::lifecycle::GenericApiResource;
    use crate::testing::{data, mock_dbt_cloud, s, v3, ACCOUNT_ID};

    use super::*;

    fn okta() -> OAuthConfigurationState<'static> {
        OAuthConfigurationState {
            id: Value::Unknown,
            oauth_configuration_id: Value::Unknown,
            r#type: s("okta"),
            name: s("Okta"),
            client_id: s("client"),
            client_secret: s("secret"),
            authorize_url: s("https://example.okta.com/authorize"),
            token_url: s("https://example.okta.com/token"),
            redirect_uri: s("https://cloud.getdbt.com/complete/okta"),
            application_id_uri: Value::Null,
        }
    }

    #[test]
    fn application_id_uri_is_entra_only() {
        let mut diags = Diagnostics::default();
        OAuthConfiguration.validate(&mut diags, &okta());
        assert!(diags.errors.is_empty());

        let mut diags = Diagnostics::default();
        OAuthConfiguration.validate(
            &mut diags,
            &OAuthConfigurationState {
                application_id_uri: s("api://dbt"),
                ..okta()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        OAuthConfiguration.validate(
            &mut diags,
            &OAuthConfigurationState {
                r#type: s("google"),
                ..okta()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn create_keeps_the_secret_in_the_state() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("POST"))
            .and(path(v3("oauth-configurations/")))
            .and(body_json(json!({
                "account_id": ACCOUNT_ID,
                "type": "okta",
                "name": "Okta",
                "client_id": "client",
                "client_secret": "secret",
                "authorize_url": "https://example.okta.com/authorize",
                "token_url": "https://example.okta.com/token",
                "redirect_uri": "https://cloud.getdbt.com/complete/okta",
            })))
            .respond_with(data(json!({
                "id": 4,
                "type": "okta",
                "name": "Okta",
                "client_id": "client",
                "authorize_url": "https://example.okta.com/authorize",
                "token_url": "https://example.okta.com/token",
                "redirect_uri": "https://cloud.getdbt.com/complete/okta",
                "oauth_configuration_extra": null,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(OAuthConfiguration, client);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .create(
                &mut diags,
                Value::Value(okta()),
                Value::Value(okta()),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.id, s("4"));
        assert_eq!(state.client_secret, s("secret"));
        assert_eq!(state.application_id_uri, Value::Null);
    }

    #[test]
    fn changing_the_provider_replaces_the_configuration() {
        assert!(OAuthConfiguration::REPLACE_ON.contains(&"type"));
        let changes = OAuthConfiguration.diff(
            &okta(),
            &OAuthConfigurationState {
                r#type: s("entra"),
                ..okta()
            },
        );
        assert!(changes.contains("type"));
    }
}
