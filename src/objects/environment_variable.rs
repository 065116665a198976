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

use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueMap, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::{ApiError, DbtCloudClient};
use crate::ids::{encode_id, split_id};
use crate::lifecycle::schema::{id, required};
use crate::lifecycle::{ApiObject, ChangeSet};
use crate::utils::{known, known_str, plan_computed};

pub const ENV_VAR_PREFIX: &str = "DBT_";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvironmentVariableState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub project_id: ValueNumber,
    pub name: ValueString<'a>,
    pub environment_values: ValueMap<'a, ValueString<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentVariableModel {
    pub project_id: i64,
    pub name: String,
    pub environment_values: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentValue {
    #[serde(default)]
    value: Option<String>,
}

/// Every variable of the project, by name then environment
#[derive(Debug, Deserialize)]
struct ProjectVariables {
    #[serde(default)]
    variables: BTreeMap<String, BTreeMap<String, EnvironmentValue>>,
}

#[derive(Debug, Serialize)]
struct BulkPayload<'b> {
    new_name: &'b str,
    project_id: i64,
    environment_name_values: BTreeMap<&'b str, &'b str>,
}

#[derive(Debug, Serialize)]
struct BulkDeletePayload<'b> {
    env_var_names: [&'b str; 1],
}

/// `dbtcloud_environment_variable`
///
/// Variables have no ID of their own in dbt Cloud, they are addressed by
/// project and name through the bulk endpoints.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentVariable;

fn key<'b>(state: &'b EnvironmentVariableState) -> Result<(i64, &'b str)> {
    let project_id = known(&state.project_id)
        .copied()
        .context("The project ID is not known")?;
    let name = known_str(&state.name).context("The variable name is not known")?;
    Ok((project_id, name))
}

/// Values of `state` for the bulk endpoints
///
/// Environments of `prior` missing from `state` are sent empty, which clears
/// them in dbt Cloud.
fn bulk_payload<'b>(
    state: &'b EnvironmentVariableState,
    prior: Option<&'b EnvironmentVariableState>,
) -> Result<BulkPayload<'b>> {
    let (project_id, name) = key(state)?;
    let mut environment_name_values: BTreeMap<&str, &str> = prior
        .and_then(|prior| known(&prior.environment_values))
        .into_iter()
        .flatten()
        .map(|(environment, _)| (&**environment, ""))
        .collect();
    environment_name_values.extend(
        known(&state.environment_values)
            .into_iter()
            .flatten()
            .filter_map(|(environment, value)| Some((&**environment, known_str(value)?))),
    );
    Ok(BulkPayload {
        new_name: name,
        project_id,
        environment_name_values,
    })
}

fn bulk_url(client: &DbtCloudClient, project_id: i64) -> String {
    client.v3(&format!("projects/{project_id}/environment-variables/bulk"))
}

async fn fetch(
    client: &DbtCloudClient,
    project_id: i64,
    name: &str,
) -> Result<EnvironmentVariableModel> {
    let variables: ProjectVariables = client
        .get(&client.v3(&format!(
            "projects/{project_id}/environment-variables/environment"
        )))
        .await?;
    let values = variables
        .variables
        .into_iter()
        .find_map(|(variable, values)| (variable == name).then_some(values))
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "environment variable {name} of project {project_id}"
            ))
        })?;

    Ok(EnvironmentVariableModel {
        project_id,
        name: name.to_owned(),
        environment_values: values
            .into_iter()
            .filter_map(|(environment, value)| {
                Some((environment, value.value.filter(|value| !value.is_empty())?))
            })
            .collect(),
    })
}

#[async_trait]
impl ApiObject for EnvironmentVariable {
    const ID_FORMAT: &'static str = "`project_id:name`";
    const KEYS: &'static [&'static str] = &["project_id", "name"];
    const REPLACE_ON: &'static [&'static str] = &["project_id", "name"];

    type State<'a> = EnvironmentVariableState<'a>;
    type Model = EnvironmentVariableModel;

    fn kind(&self) -> &'static str {
        "environment variable"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the variable, as `project_id:name`"),
                    "project_id" => required(AttributeType::Number, "Project of the variable"),
                    "name" => required(AttributeType::String, "Name of the variable, starting with `DBT_`"),
                    "environment_values" => required(
                        AttributeType::Map(Box::new(AttributeType::String)),
                        "Value by environment name, `project` holding the project default",
                    ),
                },
                description: Description::plain("Environment variable of a dbt Cloud project"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        if let Some(name) = known_str(&config.name) {
            if !name.starts_with(ENV_VAR_PREFIX) {
                diags.error(
                    format!("Invalid variable name `{name}`"),
                    format!("Environment variable names must start with `{ENV_VAR_PREFIX}`"),
                    AttributePath::new("name"),
                );
            }
        }
        if let Value::Value(values) = &config.environment_values {
            if values.is_empty() {
                diags.error_short(
                    "At least one environment value is required",
                    AttributePath::new("environment_values"),
                );
            }
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track("name", &prior.name, &planned.name)
            .track(
                "environment_values",
                &prior.environment_values,
                &planned.environment_values,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, name] = split_id(id, Self::ID_FORMAT)?;
        let project_id = project_id
            .parse()
            .map_err(|_| anyhow!("`{project_id}` is not a numeric project ID"))?;
        Ok(EnvironmentVariableState {
            project_id: Value::Value(project_id),
            name: Value::Value(Cow::Owned(name.to_owned())),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id =
            Value::Value(encode_id([model.project_id.to_string(), model.name.clone()]).into());
        state.project_id = Value::Value(model.project_id);
        state.name = Value::Value(model.name.into());
        state.environment_values = Value::Value(
            model
                .environment_values
                .into_iter()
                .map(|(environment, value)| (Cow::Owned(environment), Value::Value(value.into())))
                .collect(),
        );
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = bulk_payload(planned, None)?;
        let _: serde_json::Value = client
            .post(&bulk_url(client, payload.project_id), &payload)
            .await?;
        fetch(client, payload.project_id, payload.new_name).await
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let (project_id, name) = key(state)?;
        fetch(client, project_id, name).await
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        _changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let payload = bulk_payload(planned, Some(prior))?;
        let _: serde_json::Value = client
            .put(&bulk_url(client, payload.project_id), &payload)
            .await?;
        fetch(client, payload.project_id, payload.new_name).await
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let (project_id, name) = key(state)?;
        client
            .delete_with_body(
                &bulk_url(client, project_id),
                &BulkDeletePayload {
                    env_var_names: [name],
                },
            )
            .await?;
        Ok(())
    }
}
