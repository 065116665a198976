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

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueBool, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::{decode_id, encode_id};
use crate::lifecycle::schema::{computed, id, optional_computed, required};
use crate::lifecycle::{active_state, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{check_non_negative, known, known_str, non_empty, plan_computed};

use super::{
    create_credential, credential_ids, delete_credential, project_id, read_credential,
    update_credential, CREDENTIAL_ID_FORMAT,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BigQueryCredentialState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub credential_id: ValueNumber,
    pub project_id: ValueNumber,
    pub is_active: ValueBool,
    pub dataset: ValueString<'a>,
    pub num_threads: ValueNumber,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BigQueryCredentialModel {
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub num_threads: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct BigQueryPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    credential_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_threads: Option<i64>,
}

/// `dbtcloud_bigquery_credential`
///
/// The service account itself lives on the connection, a credential only
/// selects the dataset used by the project.
#[derive(Debug, Default, Clone)]
pub struct BigQueryCredential;

#[async_trait]
impl ApiObject for BigQueryCredential {
    const ID_FORMAT: &'static str = CREDENTIAL_ID_FORMAT;
    const KEYS: &'static [&'static str] = &["project_id", "credential_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id"];

    type State<'a> = BigQueryCredentialState<'a>;
    type Model = BigQueryCredentialModel;

    fn kind(&self) -> &'static str {
        "BigQuery credential"
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
                    "dataset" => required(AttributeType::String, "Default dataset"),
                    "num_threads" => required(AttributeType::Number, "Number of threads dbt uses"),
                },
                description: Description::plain("BigQuery credential of a dbt Cloud project"),
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
            .track("dataset", &prior.dataset, &planned.dataset)
            .track("num_threads", &prior.num_threads, &planned.num_threads)
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.credential_id,
            prior.map(|prior| &prior.credential_id),
        );
        plan_computed(&mut planned.is_active, prior.map(|prior| &prior.is_active));
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, credential_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(BigQueryCredentialState {
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
        state.dataset = non_empty(&state.dataset, model.dataset);
        state.num_threads = model.num_threads.map_or(Value::Null, Value::Value);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = project_id(&planned.project_id)?;
        let payload = BigQueryPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            credential_type: Some("bigquery"),
            state: Some(active_state(&planned.is_active)),
            dataset: known_str(&planned.dataset),
            num_threads: known(&planned.num_threads).copied(),
        };
        create_credential(client, project_id, &payload).await
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&state.project_id, &state.credential_id)?;
        read_credential(client, ids, "bigquery").await
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&prior.project_id, &prior.credential_id)?;
        let payload = BigQueryPayload {
            state: changes.pick("is_active", active_state(&planned.is_active)),
            dataset: changes
                .pick("dataset", known_str(&planned.dataset))
                .flatten(),
            num_threads: changes
                .pick("num_threads", known(&planned.num_threads).copied())
                .flatten(),
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
    use crate::testing::{data, mock_dbt_cloud, s, v3, ACCOUNT_ID};

    use super::*;

    #[tokio::test]
    async fn create_sends_the_credential_type() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("POST"))
            .and(path(v3("projects/3/credentials/")))
            .and(body_json(json!({
                "account_id": ACCOUNT_ID,
                "project_id": 3,
                "type": "bigquery",
                "state": 1,
                "dataset": "analytics",
                "num_threads": 4,
            })))
            .respond_with(data(json!({
                "id": 12,
                "project_id": 3,
                "type": "bigquery",
                "state": 1,
                "dataset": "analytics",
                "num_threads": 4,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(BigQueryCredential, client);
        let mut diags = Diagnostics::default();
        let planned = BigQueryCredentialState {
            project_id: Value::Value(3),
            dataset: s("analytics"),
            num_threads: Value::Value(4),
            ..Default::default()
        };
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned.clone()),
                Value::Value(planned),
                Default::default(),
            )
            .await
            .unwrap();
        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.id, s("3:12"));
        assert_eq!(state.credential_id, Value::Value(12));
        assert_eq!(state.is_active, Value::Value(true));
    }

    #[tokio::test]
    async fn credential_of_another_type_is_an_error() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/3/credentials/12/")))
            .respond_with(data(json!({
                "id": 12,
                "project_id": 3,
                "type": "snowflake",
                "state": 1,
            })))
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(BigQueryCredential, client);
        let mut diags = Diagnostics::default();
        let state = BigQueryCredential.import("3:12").unwrap();
        assert!(resource
            .read(
                &mut diags,
                Value::Value(state),
                Default::default(),
                Default::default()
            )
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
