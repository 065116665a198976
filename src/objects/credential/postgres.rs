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
use crate::lifecycle::schema::{computed, id, optional, optional_computed, required, sensitive};
use crate::lifecycle::{active_state, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{check_non_negative, known, known_str, non_empty, plan_computed};

use super::{
    create_credential, credential_ids, delete_credential, project_id, read_credential,
    update_credential, CREDENTIAL_ID_FORMAT,
};

/// Warehouses sharing the Postgres credential layout
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PostgresFlavour {
    #[default]
    Postgres,
    Redshift,
}

impl PostgresFlavour {
    fn credential_type(self) -> &'static str {
        match self {
            PostgresFlavour::Postgres => "postgres",
            PostgresFlavour::Redshift => "redshift",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PostgresCredentialState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub credential_id: ValueNumber,
    pub project_id: ValueNumber,
    pub is_active: ValueBool,
    pub username: ValueString<'a>,
    pub password: ValueString<'a>,
    pub default_schema: ValueString<'a>,
    pub target_name: ValueString<'a>,
    pub num_threads: ValueNumber,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresCredentialModel {
    pub id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub default_schema: Option<String>,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub threads: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct PostgresPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    credential_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_schema: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_name: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<i64>,
}

/// `dbtcloud_postgres_credential` and `dbtcloud_redshift_credential`
#[derive(Debug, Default, Clone)]
pub struct PostgresCredential {
    pub flavour: PostgresFlavour,
}

impl PostgresCredential {
    pub fn new(flavour: PostgresFlavour) -> Self {
        Self { flavour }
    }
}

#[async_trait]
impl ApiObject for PostgresCredential {
    const ID_FORMAT: &'static str = CREDENTIAL_ID_FORMAT;
    const KEYS: &'static [&'static str] = &["project_id", "credential_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id"];

    type State<'a> = PostgresCredentialState<'a>;
    type Model = PostgresCredentialModel;

    fn kind(&self) -> &'static str {
        match self.flavour {
            PostgresFlavour::Postgres => "Postgres credential",
            PostgresFlavour::Redshift => "Redshift credential",
        }
    }

    fn schema(&self) -> Schema {
        let description = match self.flavour {
            PostgresFlavour::Postgres => "Postgres credential of a dbt Cloud project",
            PostgresFlavour::Redshift => "Redshift credential of a dbt Cloud project",
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the credential, as `project_id:credential_id`"),
                    "credential_id" => computed(AttributeType::Number, "The numeric ID of the credential"),
                    "project_id" => required(AttributeType::Number, "Project of the credential"),
                    "is_active" => optional_computed(AttributeType::Bool, "Whether the credential is active"),
                    "username" => required(AttributeType::String, "Database user"),
                    "password" => sensitive(optional(AttributeType::String, "Password of the user")),
                    "default_schema" => required(AttributeType::String, "Default schema"),
                    "target_name" => optional_computed(AttributeType::String, "dbt target name"),
                    "num_threads" => optional_computed(AttributeType::Number, "Number of threads dbt uses"),
                },
                description: Description::plain(description),
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
            .track("username", &prior.username, &planned.username)
            .track("password", &prior.password, &planned.password)
            .track(
                "default_schema",
                &prior.default_schema,
                &planned.default_schema,
            )
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
        Ok(PostgresCredentialState {
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
        state.username = non_empty(&state.username, model.username);
        state.default_schema = non_empty(&state.default_schema, model.default_schema);
        state.target_name = non_empty(&state.target_name, model.target_name);
        state.num_threads = model.threads.map_or(Value::Null, Value::Value);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = project_id(&planned.project_id)?;
        let payload = PostgresPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            credential_type: Some(self.flavour.credential_type()),
            state: Some(active_state(&planned.is_active)),
            username: known_str(&planned.username),
            password: Some(known_str(&planned.password)),
            default_schema: known_str(&planned.default_schema),
            target_name: known_str(&planned.target_name).map(Some),
            threads: known(&planned.num_threads).copied(),
        };
        create_credential(client, project_id, &payload).await
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&state.project_id, &state.credential_id)?;
        read_credential(client, ids, self.flavour.credential_type()).await
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let ids = credential_ids(&prior.project_id, &prior.credential_id)?;
        let payload = PostgresPayload {
            state: changes.pick("is_active", active_state(&planned.is_active)),
            username: changes
                .pick("username", known_str(&planned.username))
                .flatten(),
            password: changes.pick("password", known_str(&planned.password)),
            default_schema: changes
                .pick("default_schema", known_str(&planned.default_schema))
                .flatten(),
            target_name: changes.pick("target_name", known_str(&planned.target_name)),
            threads: changes
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
    async fn redshift_credentials_use_their_own_type() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("POST"))
            .and(path(v3("projects/3/credentials/")))
            .and(body_json(json!({
                "account_id": ACCOUNT_ID,
                "project_id": 3,
                "type": "redshift",
                "state": 1,
                "username": "dbt",
                "password": "hunter2",
                "default_schema": "analytics",
            })))
            .respond_with(data(json!({
                "id": 21,
                "project_id": 3,
                "type": "redshift",
                "state": 1,
                "username": "dbt",
                "default_schema": "analytics",
                "target_name": "default",
                "threads": 4,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource =
            GenericApiResource::new(PostgresCredential::new(PostgresFlavour::Redshift), client);
        let mut diags = Diagnostics::default();
        let planned = PostgresCredentialState {
            project_id: Value::Value(3),
            username: s("dbt"),
            password: s("hunter2"),
            default_schema: s("analytics"),
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
        assert_eq!(state.id, s("3:21"));
        assert_eq!(state.target_name, s("default"));
        assert_eq!(state.num_threads, Value::Value(4));
        assert_eq!(state.password, s("hunter2"));
    }

    #[tokio::test]
    async fn postgres_reader_rejects_redshift_credentials() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/3/credentials/21/")))
            .respond_with(data(json!({
                "id": 21,
                "project_id": 3,
                "type": "redshift",
                "state": 1,
            })))
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(PostgresCredential::default(), client);
        let mut diags = Diagnostics::default();
        let state = PostgresCredential::default().import("3:21").unwrap();
        assert!(resource
            .read(
                &mut diags,
                Value::Value(state),
                Default::default(),
                Default::default()
            )
            .await
            .is_none());
        assert!(!diags.errors.is_empty());
    }
}
