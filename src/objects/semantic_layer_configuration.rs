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
use tf_provider::{map, schema::AttributeType, schema::Block, schema::Description, schema::Schema};

use crate::client::DbtCloudClient;
use crate::ids::{decode_id, encode_id};
use crate::lifecycle::schema::{computed, id, required};
use crate::lifecycle::{ensure_active, ApiObject, ChangeSet};
use crate::utils::{known, plan_computed};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SemanticLayerConfigurationState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub configuration_id: ValueNumber,
    pub project_id: ValueNumber,
    pub environment_id: ValueNumber,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticLayerConfigurationModel {
    pub id: i64,
    pub project_id: i64,
    pub environment_id: i64,
    #[serde(default)]
    pub state: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ConfigurationPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    environment_id: i64,
}

/// `dbtcloud_semantic_layer_configuration`: the environment the semantic
/// layer of a project queries
#[derive(Debug, Default, Clone)]
pub struct SemanticLayerConfiguration;

fn ids(state: &SemanticLayerConfigurationState) -> Result<(i64, i64)> {
    let project_id = known(&state.project_id)
        .copied()
        .context("The project ID is not known")?;
    let configuration_id = known(&state.configuration_id)
        .copied()
        .context("The configuration ID is not known")?;
    Ok((project_id, configuration_id))
}

fn environment_id(state: &SemanticLayerConfigurationState) -> Result<i64> {
    known(&state.environment_id)
        .copied()
        .context("The environment ID is not known")
}

fn path(project_id: i64, configuration_id: Option<i64>) -> String {
    match configuration_id {
        Some(configuration_id) => {
            format!("projects/{project_id}/semantic-layer-configurations/{configuration_id}")
        }
        None => format!("projects/{project_id}/semantic-layer-configurations"),
    }
}

#[async_trait]
impl ApiObject for SemanticLayerConfiguration {
    const ID_FORMAT: &'static str = "`project_id:configuration_id`";
    const KEYS: &'static [&'static str] = &["project_id", "configuration_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id"];

    type State<'a> = SemanticLayerConfigurationState<'a>;
    type Model = SemanticLayerConfigurationModel;

    fn kind(&self) -> &'static str {
        "semantic layer configuration"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the configuration, as `project_id:configuration_id`"),
                    "configuration_id" => computed(AttributeType::Number, "The numeric ID of the configuration"),
                    "project_id" => required(AttributeType::Number, "Project of the semantic layer"),
                    "environment_id" => required(AttributeType::Number, "Environment queried by the semantic layer"),
                },
                description: Description::plain(
                    "Semantic layer configuration of a dbt Cloud project",
                ),
                ..Default::default()
            },
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track(
                "environment_id",
                &prior.environment_id,
                &planned.environment_id,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.configuration_id,
            prior.map(|prior| &prior.configuration_id),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, configuration_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(SemanticLayerConfigurationState {
            project_id: Value::Value(project_id),
            configuration_id: Value::Value(configuration_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(encode_id([model.project_id, model.id]).into());
        state.configuration_id = Value::Value(model.id);
        state.project_id = Value::Value(model.project_id);
        state.environment_id = Value::Value(model.environment_id);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = known(&planned.project_id)
            .copied()
            .context("The project ID is not known")?;
        let payload = ConfigurationPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            environment_id: environment_id(planned)?,
        };
        Ok(client
            .post(&client.v3(&path(project_id, None)), &payload)
            .await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let (project_id, configuration_id) = ids(state)?;
        let configuration: SemanticLayerConfigurationModel = client
            .get(&client.v3(&path(project_id, Some(configuration_id))))
            .await?;
        ensure_active(
            configuration.state,
            format!("semantic layer configuration {configuration_id}"),
        )?;
        Ok(configuration)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        _changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let (project_id, configuration_id) = ids(prior)?;
        let payload = ConfigurationPayload {
            account_id: None,
            project_id: None,
            environment_id: environment_id(planned)?,
        };
        Ok(client
            .patch(
                &client.v3(&path(project_id, Some(configuration_id))),
                &payload,
            )
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let (project_id, configuration_id) = ids(state)?;
        client
            .delete(&client.v3(&path(project_id, Some(configuration_id))))
            .await?;
        Ok(())
    }
}
