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

use tf_provider::value::{Value, ValueBool, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::{decode_id, encode_id};
use crate::lifecycle::schema::{computed, id, optional, optional_computed, required};
use crate::lifecycle::{ensure_active, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{
    check_one_of, check_requires, known, known_str, non_empty, optional as value_of, plan_computed,
};

pub const ENVIRONMENT_TYPES: &[&str] = &["development", "deployment"];
pub const DEPLOYMENT_TYPES: &[&str] = &["production", "staging"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvironmentState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub environment_id: ValueNumber,
    pub project_id: ValueNumber,
    pub name: ValueString<'a>,
    pub r#type: ValueString<'a>,
    pub dbt_version: ValueString<'a>,
    pub use_custom_branch: ValueBool,
    pub custom_branch: ValueString<'a>,
    pub credential_id: ValueNumber,
    pub deployment_type: ValueString<'a>,
    pub connection_id: ValueNumber,
    pub enable_model_query_history: ValueBool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentModel {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub r#type: String,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub use_custom_branch: Option<bool>,
    #[serde(default)]
    pub custom_branch: Option<String>,
    #[serde(default)]
    pub credentials_id: Option<i64>,
    #[serde(default)]
    pub deployment_type: Option<String>,
    #[serde(default)]
    pub connection_id: Option<i64>,
    #[serde(default)]
    pub enable_model_query_history: Option<bool>,
    #[serde(default)]
    pub state: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct EnvironmentPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dbt_version: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_custom_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_branch: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deployment_type: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection_id: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_model_query_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
}

/// `dbtcloud_environment`
#[derive(Debug, Default, Clone)]
pub struct Environment;

fn environment_path(state: &EnvironmentState) -> Result<String> {
    let project_id = known(&state.project_id).context("The project ID is not known")?;
    let environment_id = known(&state.environment_id).context("The environment ID is not known")?;
    Ok(format!(
        "projects/{project_id}/environments/{environment_id}"
    ))
}

#[async_trait]
impl ApiObject for Environment {
    const ID_FORMAT: &'static str = "`project_id:environment_id`";
    const KEYS: &'static [&'static str] = &["project_id", "environment_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id", "type"];

    type State<'a> = EnvironmentState<'a>;
    type Model = EnvironmentModel;

    fn kind(&self) -> &'static str {
        "environment"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the environment, as `project_id:environment_id`"),
                    "environment_id" => computed(AttributeType::Number, "The numeric ID of the environment"),
                    "project_id" => required(AttributeType::Number, "Project of the environment"),
                    "name" => required(AttributeType::String, "Environment name"),
                    "type" => required(
                        AttributeType::String,
                        "Type of environment: `development` or `deployment`",
                    ),
                    "dbt_version" => optional_computed(
                        AttributeType::String,
                        "Version of dbt used by the environment, e.g. `latest`",
                    ),
                    "use_custom_branch" => optional_computed(
                        AttributeType::Bool,
                        "Whether to use a custom git branch in this environment",
                    ),
                    "custom_branch" => optional(
                        AttributeType::String,
                        "Custom branch name, requires `use_custom_branch`",
                    ),
                    "credential_id" => optional(
                        AttributeType::Number,
                        "Credential used by a deployment environment",
                    ),
                    "deployment_type" => optional(
                        AttributeType::String,
                        "Type of deployment environment: `production` or `staging`",
                    ),
                    "connection_id" => optional(
                        AttributeType::Number,
                        "Global connection used by the environment",
                    ),
                    "enable_model_query_history" => optional_computed(
                        AttributeType::Bool,
                        "Whether model query history is collected",
                    ),
                },
                description: Description::plain("dbt Cloud environment"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_one_of(
            diags,
            AttributePath::new("type"),
            &config.r#type,
            ENVIRONMENT_TYPES,
        );
        check_one_of(
            diags,
            AttributePath::new("deployment_type"),
            &config.deployment_type,
            DEPLOYMENT_TYPES,
        );
        if let Some(env_type) = known_str(&config.r#type) {
            check_requires(
                diags,
                AttributePath::new("deployment_type"),
                &config.deployment_type,
                env_type == "deployment",
                "`deployment_type` can only be set on `deployment` environments",
            );
        }
        if !config.use_custom_branch.is_unknown() {
            check_requires(
                diags,
                AttributePath::new("custom_branch"),
                &config.custom_branch,
                config.use_custom_branch == Value::Value(true),
                "`custom_branch` requires `use_custom_branch = true`",
            );
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track("name", &prior.name, &planned.name)
            .track("type", &prior.r#type, &planned.r#type)
            .track("dbt_version", &prior.dbt_version, &planned.dbt_version)
            .track(
                "use_custom_branch",
                &prior.use_custom_branch,
                &planned.use_custom_branch,
            )
            .track(
                "custom_branch",
                &prior.custom_branch,
                &planned.custom_branch,
            )
            .track(
                "credential_id",
                &prior.credential_id,
                &planned.credential_id,
            )
            .track(
                "deployment_type",
                &prior.deployment_type,
                &planned.deployment_type,
            )
            .track(
                "connection_id",
                &prior.connection_id,
                &planned.connection_id,
            )
            .track(
                "enable_model_query_history",
                &prior.enable_model_query_history,
                &planned.enable_model_query_history,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.environment_id,
            prior.map(|prior| &prior.environment_id),
        );
        plan_computed(
            &mut planned.dbt_version,
            prior.map(|prior| &prior.dbt_version),
        );
        plan_computed(
            &mut planned.use_custom_branch,
            prior.map(|prior| &prior.use_custom_branch),
        );
        plan_computed(
            &mut planned.enable_model_query_history,
            prior.map(|prior| &prior.enable_model_query_history),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, environment_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(EnvironmentState {
            project_id: Value::Value(project_id),
            environment_id: Value::Value(environment_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(encode_id([model.project_id, model.id]).into());
        state.environment_id = Value::Value(model.id);
        state.project_id = Value::Value(model.project_id);
        state.name = Value::Value(model.name.into());
        state.r#type = Value::Value(model.r#type.into());
        state.dbt_version = non_empty(&state.dbt_version, model.dbt_version);
        state.use_custom_branch = Value::Value(model.use_custom_branch.unwrap_or_default());
        state.custom_branch = non_empty(&state.custom_branch, model.custom_branch);
        state.credential_id = value_of(model.credentials_id);
        state.deployment_type = non_empty(&state.deployment_type, model.deployment_type);
        state.connection_id = value_of(model.connection_id);
        state.enable_model_query_history =
            Value::Value(model.enable_model_query_history.unwrap_or_default());
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = known(&planned.project_id)
            .copied()
            .context("The project ID is not known")?;
        let payload = EnvironmentPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            name: known_str(&planned.name),
            r#type: known_str(&planned.r#type),
            dbt_version: known_str(&planned.dbt_version),
            use_custom_branch: known(&planned.use_custom_branch).copied(),
            custom_branch: Some(known_str(&planned.custom_branch)),
            credentials_id: Some(known(&planned.credential_id).copied()),
            deployment_type: Some(known_str(&planned.deployment_type)),
            connection_id: Some(known(&planned.connection_id).copied()),
            enable_model_query_history: known(&planned.enable_model_query_history).copied(),
            state: Some(STATE_ACTIVE),
        };
        Ok(client
            .post(
                &client.v3(&format!("projects/{project_id}/environments")),
                &payload,
            )
            .await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let path = environment_path(state)?;
        let environment: EnvironmentModel = client.get(&client.v3(&path)).await?;
        ensure_active(environment.state, path)?;
        Ok(environment)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let payload = EnvironmentPayload {
            name: changes.pick("name", known_str(&planned.name)).flatten(),
            dbt_version: changes
                .pick("dbt_version", known_str(&planned.dbt_version))
                .flatten(),
            use_custom_branch: changes
                .pick(
                    "use_custom_branch",
                    known(&planned.use_custom_branch).copied(),
                )
                .flatten(),
            custom_branch: changes.pick("custom_branch", known_str(&planned.custom_branch)),
            credentials_id: changes.pick("credential_id", known(&planned.credential_id).copied()),
            deployment_type: changes.pick("deployment_type", known_str(&planned.deployment_type)),
            connection_id: changes.pick("connection_id", known(&planned.connection_id).copied()),
            enable_model_query_history: changes
                .pick(
                    "enable_model_query_history",
                    known(&planned.enable_model_query_history).copied(),
                )
                .flatten(),
            ..Default::default()
        };
        Ok(client
            .patch(&client.v3(&environment_path(prior)?), &payload)
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        client.delete(&client.v3(&environment_path(state)?)).await?;
        Ok(())
    }
}
