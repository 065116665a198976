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

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueBool, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::{decode_id, encode_id};
use crate::lifecycle::schema::{computed, id, optional, optional_computed, required, sensitive};
use crate::lifecycle::{active_state, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{check_non_negative, known, known_str, non_empty, plan_computed};

use super::{
    create_credential, credential_ids, delete_credential, project_id, read_credential,
    update_credential, CREDENTIAL_ID_FORMAT,
};

const ADAPTER_VERSION: &str = "databricks_v0";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabricksCredentialState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub credential_id: ValueNumber,
    pub project_id: ValueNumber,
    pub is_active: ValueBool,
    pub token: ValueString<'a>,
    pub schema: ValueString<'a>,
    pub catalog: ValueString<'a>,
    pub target_name: ValueString<'a>,
    pub num_threads: ValueNumber,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabricksDetails {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub threads: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabricksCredentialModel {
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub adapter_version: Option<String>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub credential_details: DatabricksDetails,
}

/// Adapter credentials hold their warehouse settings in `credential_details`
#[derive(Debug, Default, Serialize)]
struct DetailsPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<i64>,
}

impl DetailsPayload<'_> {
    fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.schema.is_none()
            && self.catalog.is_none()
            && self.threads.is_none()
    }
}

#[derive(Debug, Default, Serialize)]
struct DatabricksPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    credential_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    adapter_version: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_name: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credential_details: Option<DetailsPayload<'b>>,
}

/// `dbtcloud_databricks_credential`
#[derive(Debug, Default, Clone)]
pub struct DatabricksCredential;

#[async_trait]
impl ApiObject for DatabricksCredential {
    const ID_FORMAT: &'static str = CREDENTIAL_ID_FORMAT;
    const KEYS: &'static [&'static str] = &["project_id", "credential_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id"];

    type State<'a> = DatabricksCredentialState<'a>;
    type Model = DatabricksCredentialModel;

    fn kind(&self) -> &'static str {
        "Databricks credential"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the credential, as `project_id:credential_id`"),
                    "credential_id" => computed(AttributeType::Number, "The numeric ID of the credential"),
                    "project_id" => required(AttributeType::Number, "Project of the credential"),
                    "is_active" => optional_computed(AttributeType::Bool, "Whether the credential is active"),
                    "token" => sensitive(required(AttributeType::String, "Personal access token")),
                    "schema" => required(AttributeType::String, "Default schema"),
                    "catalog" => optional(AttributeType::String, "Unity catalog"),
                    "target_name" => optional_computed(AttributeType::String, "dbt target name"),
                    "num_threads" => optional_computed(AttributeType::Number, "Number of threads dbt uses"),
                },
                description: Description::plain("Databricks credential of a dbt Cloud project"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_non_negative(
            diags,
            AttributePath::new("num_threads"),
            &config.num_threads,
        );
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track("is_active", &prior.is_active, &planned.is_active)
            .track("token", &prior.token, &planned.token)
            .track("schema", &prior.schema, &planned.schema)
            .track("catalog", &prior.catalog, &planned.catalog)
            .track("target_name", &prior.target_name, &planned.target_name)
            .track("num_threads", &prior.num_threads, &planned.num_threads)
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.credential_id,
            prior.map(|prior| &prior.credential_id),
        );
        plan_computed(&mut planned.is_active, prior.map(|prior| &prior.is_active));
        plan_computed(
            &mut planned.target_name,
            prior.map(|prior| &prior.target_name),
        );
        plan_computed(
            &mut planned.num_threads,
            prior.map(|prior| &prior.num_threads),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, credential_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(DatabricksCredentialState {
            project_id: Value::Value(project_id),
            credential_id: Value::Value(credential_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(encode_id([model.project_id, model.id]).into());
        state.credential_id = Value::Value(model.id);
        state.project_id = Value::Value(model.project_id);
        state.is_active = Value::Value(model.state.map_or(true, |state| state == STATE_ACTIVE));
        state.target_name = non_empty(&state.target_name, model.target_name);
        state.schema = non_empty(&state.schema, model.credential_details.schema);
        state.catalog = non_empty(&state.catalog, model.credential_details.catalog);
        state.num_threads = model
            .credential_details
            .threads
            .map_or(Value::Null, Value::Value);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = project_id(&planned.project_id)?;
        let payload = DatabricksPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            credential_type: Some("adapter"),
            adapter_version: Some(ADAPTER_VERSION),
            state: Some(active_state(&planned.is_active)),
            target_name: known_str(&planned.target_name).map(Some),
            credential_details: Some(DetailsPayload {
                token: known_str(&planned.token),
                schema: known_str(&planned.schema),
                catalog: Some(known_str(&planned.catalog)),
                threads: known(&planned.num_threads).copied(),
            }),
        };
        create_credential(client, project_id, &payload).await
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&state.project_id, &state.credential_id)?;
        let model: DatabricksCredentialModel = read_credential(client, ids, "adapter").await?;
        match model.adapter_version.as_deref() {
            Some(version) if !version.starts_with("databricks") => bail!(
                "Credential {} uses the `{version}` adapter, not Databricks",
                model.id
            ),
            _ => Ok(model),
        }
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&prior.project_id, &prior.credential_id)?;
        let details = DetailsPayload {
            token: changes.pick("token", known_str(&planned.token)).flatten(),
            schema: changes.pick("schema", known_str(&planned.schema)).flatten(),
            catalog: changes.pick("catalog", known_str(&planned.catalog)),
            threads: changes
                .pick("num_threads", known(&planned.num_threads).copied())
                .flatten(),
        };
        let payload = DatabricksPayload {
            state: changes.pick("is_active", active_state(&planned.is_active)),
            target_name: changes.pick("target_name", known_str(&planned.target_name)),
            credential_details: (!details.is_empty()).then_some(details),
            ..Default::default()
        };
        update_credential(client, ids, &payload).await
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let ids = credential_ids(&state.project_id, &state.credential_id)?;
        delete_credential(client, ids).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tf_provider::Resource;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::Mock;

    use crate::lifecycle::GenericApiResource;
    use crate::testing::{data, mock_dbt_cloud, s, v3};

    use super::*;

    fn existing() -> DatabricksCredentialState<'static> {
        DatabricksCredentialState {
            id: s("3:30"),
            credential_id: Value::Value(30),
            project_id: Value::Value(3),
            is_active: Value::Value(true),
            token: s("dapi-secret"),
            schema: s("analytics"),
            catalog: Value::Null,
            target_name: s("default"),
            num_threads: Value::Value(4),
        }
    }

    fn response(schema: &str) -> serde_json::Value {
        json!({
            "id": 30,
            "project_id": 3,
            "type": "adapter",
            "adapter_version": "databricks_v0",
            "state": 1,
            "target_name": "default",
            "credential_details": {"schema": schema, "threads": 4},
        })
    }

    #[tokio::test]
    async fn settings_are_nested_in_credential_details() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PATCH"))
            .and(path(v3("projects/3/credentials/30/")))
            .and(body_json(json!({
                "credential_details": {"schema": "staging"},
            })))
            .respond_with(data(response("staging")))
            .expect(1)
            .mount(&server)
            .await;

        let planned = DatabricksCredentialState {
            schema: s("staging"),
            ..existing()
        };
        let resource = GenericApiResource::new(DatabricksCredential, client);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .update(
                &mut diags,
                Value::Value(existing()),
                Value::Value(planned.clone()),
                Value::Value(planned),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.schema, s("staging"));
        assert_eq!(state.token, s("dapi-secret"));
    }

    #[tokio::test]
    async fn other_adapters_are_rejected() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/3/credentials/30/")))
            .respond_with(data(json!({
                "id": 30,
                "project_id": 3,
                "type": "adapter",
                "adapter_version": "trino_v0",
                "state": 1,
            })))
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let client = client.get(&mut diags).await.unwrap();
        let err = DatabricksCredential
            .read(&client, &existing())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("trino_v0"));
    }
}
