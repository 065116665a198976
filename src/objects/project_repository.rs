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

use crate::client::{ApiError, DbtCloudClient};
use crate::ids::{decode_id, encode_id};
use crate::lifecycle::schema::{id, required};
use crate::lifecycle::{ApiObject, ChangeSet};
use crate::utils::{known, plan_computed};

use super::project::{Project, ProjectModel};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectRepositoryState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub project_id: ValueNumber,
    pub repository_id: ValueNumber,
}

#[derive(Debug, Serialize)]
struct LinkPayload {
    repository_id: Option<i64>,
}

/// `dbtcloud_project_repository`: links a repository to its project
#[derive(Debug, Default, Clone)]
pub struct ProjectRepository;

fn ids(state: &ProjectRepositoryState) -> Result<(i64, i64)> {
    let project_id = known(&state.project_id)
        .copied()
        .context("The project ID is not known")?;
    let repository_id = known(&state.repository_id)
        .copied()
        .context("The repository ID is not known")?;
    Ok((project_id, repository_id))
}

async fn link(
    client: &DbtCloudClient,
    project_id: i64,
    repository_id: Option<i64>,
) -> Result<ProjectModel> {
    Ok(client
        .patch(
            &client.v3(&format!("projects/{project_id}")),
            &LinkPayload { repository_id },
        )
        .await?)
}

#[async_trait]
impl ApiObject for ProjectRepository {
    const ID_FORMAT: &'static str = "`project_id:repository_id`";
    const KEYS: &'static [&'static str] = &["project_id", "repository_id"];
    const REPLACE_ON: &'static [&'static str] = &["project_id", "repository_id"];

    type State<'a> = ProjectRepositoryState<'a>;
    type Model = ProjectModel;

    fn kind(&self) -> &'static str {
        "project repository link"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the link, as `project_id:repository_id`"),
                    "project_id" => required(AttributeType::Number, "Project to link"),
                    "repository_id" => required(AttributeType::Number, "Repository to link"),
                },
                description: Description::plain(
                    "Link between a dbt Cloud project and its repository",
                ),
                ..Default::default()
            },
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track(
                "repository_id",
                &prior.repository_id,
                &planned.repository_id,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, repository_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(ProjectRepositoryState {
            project_id: Value::Value(project_id),
            repository_id: Value::Value(repository_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.project_id = Value::Value(model.id);
        if let Some(repository_id) = model.repository_id {
            state.repository_id = Value::Value(repository_id);
        }
        if let Value::Value(repository_id) = state.repository_id {
            state.id = Value::Value(encode_id([model.id, repository_id]).into());
        }
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let (project_id, repository_id) = ids(planned)?;
        link(client, project_id, Some(repository_id)).await
    }

    /// The link is gone when the project points to another repository
    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let (project_id, repository_id) = ids(state)?;
        let project = Project::fetch(client, project_id).await?;
        if project.repository_id != Some(repository_id) {
            return Err(ApiError::NotFound(format!(
                "link between project {project_id} and repository {repository_id}"
            ))
            .into());
        }
        Ok(project)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        _prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        _changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let (project_id, repository_id) = ids(planned)?;
        link(client, project_id, Some(repository_id)).await
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let (project_id, _) = ids(state)?;
        link(client, project_id, None).await?;
        Ok(())
    }
}
