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
use crate::lifecycle::schema::{computed, id, optional, required};
use crate::lifecycle::{ensure_active, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{known, known_str, non_empty, optional as value_of, plan_computed};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub project_id: ValueNumber,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub dbt_project_subdirectory: ValueString<'a>,
    pub connection_id: ValueNumber,
    pub repository_id: ValueNumber,
    pub semantic_layer_config_id: ValueNumber,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectModel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dbt_project_subdirectory: Option<String>,
    #[serde(default)]
    pub connection_id: Option<i64>,
    #[serde(default)]
    pub repository_id: Option<i64>,
    #[serde(default)]
    pub semantic_layer_config_id: Option<i64>,
    #[serde(default)]
    pub state: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct ProjectPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dbt_project_subdirectory: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
}

/// `dbtcloud_project`
#[derive(Debug, Default, Clone)]
pub struct Project;

impl Project {
    pub(crate) async fn fetch(client: &DbtCloudClient, project_id: i64) -> Result<ProjectModel> {
        let project: ProjectModel = client
            .get(&client.v3(&format!("projects/{project_id}")))
            .await?;
        ensure_active(project.state, format!("project {project_id}"))?;
        Ok(project)
    }
}

fn project_id(state: &ProjectState) -> Result<i64> {
    known(&state.project_id)
        .copied()
        .context("The project ID is not known")
}

#[async_trait]
impl ApiObject for Project {
    const ID_FORMAT: &'static str = "`project_id`";
    const KEYS: &'static [&'static str] = &["project_id"];

    type State<'a> = ProjectState<'a>;
    type Model = ProjectModel;

    fn kind(&self) -> &'static str {
        "project"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the project"),
                    "project_id" => computed(AttributeType::Number, "The numeric ID of the project"),
                    "name" => required(AttributeType::String, "Project name"),
                    "description" => optional(AttributeType::String, "Description for the project"),
                    "dbt_project_subdirectory" => optional(
                        AttributeType::String,
                        "dbt project subdirectory path inside the repository",
                    ),
                    "connection_id" => computed(
                        AttributeType::Number,
                        "Connection used by the project",
                    ),
                    "repository_id" => computed(
                        AttributeType::Number,
                        "Repository linked to the project",
                    ),
                    "semantic_layer_config_id" => computed(
                        AttributeType::Number,
                        "Semantic layer configuration of the project",
                    ),
                },
                description: Description::plain("dbt Cloud project"),
                ..Default::default()
            },
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("name", &prior.name, &planned.name)
            .track("description", &prior.description, &planned.description)
            .track(
                "dbt_project_subdirectory",
                &prior.dbt_project_subdirectory,
                &planned.dbt_project_subdirectory,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.project_id,
            prior.map(|prior| &prior.project_id),
        );
        plan_computed(
            &mut planned.connection_id,
            prior.map(|prior| &prior.connection_id),
        );
        plan_computed(
            &mut planned.repository_id,
            prior.map(|prior| &prior.repository_id),
        );
        plan_computed(
            &mut planned.semantic_layer_config_id,
            prior.map(|prior| &prior.semantic_layer_config_id),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(ProjectState {
            project_id: Value::Value(project_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(encode_id([model.id]).into());
        state.project_id = Value::Value(model.id);
        state.name = Value::Value(model.name.into());
        state.description = non_empty(&state.description, model.description);
        state.dbt_project_subdirectory = non_empty(
            &state.dbt_project_subdirectory,
            model.dbt_project_subdirectory,
        );
        state.connection_id = value_of(model.connection_id);
        state.repository_id = value_of(model.repository_id);
        state.semantic_layer_config_id = value_of(model.semantic_layer_config_id);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = ProjectPayload {
            account_id: Some(client.account_id()),
            name: known_str(&planned.name),
            description: Some(known_str(&planned.description)),
            dbt_project_subdirectory: Some(known_str(&planned.dbt_project_subdirectory)),
            state: Some(STATE_ACTIVE),
        };
        Ok(client.post(&client.v3("projects"), &payload).await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        Self::fetch(client, project_id(state)?).await
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let project_id = project_id(prior)?;
        let payload = ProjectPayload {
            name: changes.pick("name", known_str(&planned.name)).flatten(),
            description: changes.pick("description", known_str(&planned.description)),
            dbt_project_subdirectory: changes.pick(
                "dbt_project_subdirectory",
                known_str(&planned.dbt_project_subdirectory),
            ),
            ..Default::default()
        };
        Ok(client
            .patch(&client.v3(&format!("projects/{project_id}")), &payload)
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let project_id = project_id(state)?;
        client
            .delete(&client.v3(&format!("projects/{project_id}")))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tf_provider::{Diagnostics, Resource};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::lifecycle::GenericApiResource;
    use crate::testing::{data, mock_dbt_cloud, s, v3};

    use super::*;

    fn planned() -> ProjectState<'static> {
        ProjectState {
            name: s("analytics"),
            description: s("Main project"),
            ..Default::default()
        }
    }

    #[test]
    fn configured_empty_description_survives_apply() {
        let mut state = ProjectState {
            description: s(""),
            ..planned()
        };
        let model: ProjectModel = serde_json::from_value(json!({
            "id": 12,
            "name": "analytics",
            "description": "",
            "dbt_project_subdirectory": "",
            "state": 1,
        }))
        .unwrap();
        Project.apply(&mut state, model);
        assert_eq!(state.description, s(""));
        assert_eq!(state.dbt_project_subdirectory, Value::Null);
    }

    #[tokio::test]
    async fn create_fills_computed_attributes() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("POST"))
            .and(path(v3("projects/")))
            .and(body_json(json!({
                "account_id": 1,
                "name": "analytics",
                "description": "Main project",
                "dbt_project_subdirectory": null,
                "state": 1,
            })))
            .respond_with(data(json!({
                "id": 12,
                "name": "analytics",
                "description": "Main project",
                "dbt_project_subdirectory": "",
                "connection_id": null,
                "repository_id": null,
                "state": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let (plan, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned()),
                Value::Value(planned()),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(plan_state) = &plan else {
            panic!("planned state should not be null");
        };
        assert!(plan_state.id.is_unknown());
        assert!(plan_state.project_id.is_unknown());

        let (state, _) = resource
            .create(
                &mut diags,
                plan.clone(),
                plan,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.id, s("12"));
        assert_eq!(state.project_id, Value::Value(12));
        assert!(state.dbt_project_subdirectory.is_null());
        assert!(state.repository_id.is_null());
    }

    #[tokio::test]
    async fn update_only_sends_changed_fields() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PATCH"))
            .and(path(v3("projects/12/")))
            .and(body_json(json!({"name": "renamed"})))
            .respond_with(data(json!({
                "id": 12,
                "name": "renamed",
                "description": "Main project",
                "state": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prior = ProjectState {
            id: s("12"),
            project_id: Value::Value(12),
            ..planned()
        };
        let planned = ProjectState {
            name: s("renamed"),
            ..prior.clone()
        };

        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .update(
                &mut diags,
                Value::Value(prior),
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
        assert_eq!(state.name, s("renamed"));
    }

    #[tokio::test]
    async fn update_without_changes_skips_the_api() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let prior = ProjectState {
            id: s("12"),
            project_id: Value::Value(12),
            ..planned()
        };
        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let result = resource
            .update(
                &mut diags,
                Value::Value(prior.clone()),
                Value::Value(prior.clone()),
                Value::Value(prior),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_some());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn read_drops_deleted_projects() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/12/")))
            .respond_with(data(json!({"id": 12, "name": "analytics", "state": 2})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(v3("projects/13/")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Project, client);
        for project_id in [12, 13] {
            let mut diags = Diagnostics::default();
            let state = ProjectState {
                project_id: Value::Value(project_id),
                ..planned()
            };
            let (state, _) = resource
                .read(
                    &mut diags,
                    Value::Value(state),
                    Default::default(),
                    Default::default(),
                )
                .await
                .unwrap();
            assert!(state.is_null());
            assert!(diags.errors.is_empty());
        }
    }

    #[tokio::test]
    async fn read_reports_server_errors() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let state = ProjectState {
            project_id: Value::Value(12),
            ..planned()
        };
        let result = resource
            .read(
                &mut diags,
                Value::Value(state),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn import_then_read() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/12/")))
            .respond_with(data(json!({
                "id": 12,
                "name": "analytics",
                "description": "",
                "repository_id": 4,
                "state": 1,
            })))
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let (state, private_state) = resource.import(&mut diags, "12".to_owned()).await.unwrap();
        let (state, _) = resource
            .read(&mut diags, state, private_state, Default::default())
            .await
            .unwrap();
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.name, s("analytics"));
        assert_eq!(state.repository_id, Value::Value(4));
        assert!(state.description.is_null());

        assert!(resource
            .import(&mut diags, "analytics".to_owned())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn delete_tolerates_missing_projects() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("DELETE"))
            .and(path(v3("projects/12/")))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Project, client);
        let mut diags = Diagnostics::default();
        let state = ProjectState {
            project_id: Value::Value(12),
            ..planned()
        };
        assert!(resource
            .destroy(
                &mut diags,
                Value::Value(state),
                Default::default(),
                Default::default()
            )
            .await
            .is_some());
        assert!(diags.errors.is_empty());
    }
}
