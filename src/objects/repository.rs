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
use crate::lifecycle::{active_state, ensure_active, ApiObject, ChangeSet, STATE_ACTIVE};
use crate::utils::{
    check_one_of, check_requires, known, known_str, non_empty, optional as value_of, plan_computed,
};

pub const GIT_CLONE_STRATEGIES: &[&str] = &[
    "deploy_key",
    "github_app",
    "deploy_token",
    "azure_active_directory_app",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepositoryState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub repository_id: ValueNumber,
    pub project_id: ValueNumber,
    pub remote_url: ValueString<'a>,
    pub git_clone_strategy: ValueString<'a>,
    pub github_installation_id: ValueNumber,
    pub gitlab_project_id: ValueNumber,
    pub repository_credentials_id: ValueNumber,
    pub is_active: ValueBool,
    pub pull_request_url_template: ValueString<'a>,
    pub deploy_key: ValueString<'a>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployKey {
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryModel {
    pub id: i64,
    pub project_id: i64,
    pub remote_url: String,
    #[serde(default)]
    pub git_clone_strategy: Option<String>,
    #[serde(default)]
    pub github_installation_id: Option<i64>,
    #[serde(default)]
    pub gitlab_project_id: Option<i64>,
    #[serde(default)]
    pub repository_credentials_id: Option<i64>,
    #[serde(default)]
    pub pull_request_url_template: Option<String>,
    #[serde(default)]
    pub deploy_key: Option<DeployKey>,
    #[serde(default)]
    pub state: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
struct RepositoryPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote_url: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_clone_strategy: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_installation_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gitlab_project_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository_credentials_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request_url_template: Option<Option<&'b str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<i64>,
}

/// `dbtcloud_repository`
#[derive(Debug, Default, Clone)]
pub struct Repository;

fn repository_path(state: &RepositoryState) -> Result<String> {
    let project_id = known(&state.project_id).context("The project ID is not known")?;
    let repository_id = known(&state.repository_id).context("The repository ID is not known")?;
    Ok(format!(
        "projects/{project_id}/repositories/{repository_id}"
    ))
}

#[async_trait]
impl ApiObject for Repository {
    const ID_FORMAT: &'static str = "`project_id:repository_id`";
    const KEYS: &'static [&'static str] = &["project_id", "repository_id"];
    const REPLACE_ON: &'static [&'static str] = &[
        "project_id",
        "remote_url",
        "git_clone_strategy",
        "github_installation_id",
        "gitlab_project_id",
        "repository_credentials_id",
    ];

    type State<'a> = RepositoryState<'a>;
    type Model = RepositoryModel;

    fn kind(&self) -> &'static str {
        "repository"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the repository, as `project_id:repository_id`"),
                    "repository_id" => computed(AttributeType::Number, "The numeric ID of the repository"),
                    "project_id" => required(AttributeType::Number, "Project of the repository"),
                    "remote_url" => required(AttributeType::String, "Git URL of the repository"),
                    "git_clone_strategy" => optional_computed(
                        AttributeType::String,
                        "How dbt Cloud clones the repository: `deploy_key`, `github_app`, `deploy_token` or `azure_active_directory_app`",
                    ),
                    "github_installation_id" => optional(
                        AttributeType::Number,
                        "GitHub application installation, required with `github_app`",
                    ),
                    "gitlab_project_id" => optional(
                        AttributeType::Number,
                        "GitLab project, required with `deploy_token`",
                    ),
                    "repository_credentials_id" => optional(
                        AttributeType::Number,
                        "Credentials used to clone the repository",
                    ),
                    "is_active" => optional_computed(
                        AttributeType::Bool,
                        "Whether the repository is active",
                    ),
                    "pull_request_url_template" => optional(
                        AttributeType::String,
                        "URL template used to open pull requests",
                    ),
                    "deploy_key" => computed(
                        AttributeType::String,
                        "Public key to add as a deploy key when using `deploy_key`",
                    ),
                },
                description: Description::plain("dbt Cloud git repository"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_one_of(
            diags,
            AttributePath::new("git_clone_strategy"),
            &config.git_clone_strategy,
            GIT_CLONE_STRATEGIES,
        );
        let Some(strategy) = known_str(&config.git_clone_strategy) else {
            return;
        };
        if strategy == "github_app" && config.github_installation_id.is_null() {
            diags.error_short(
                "`github_installation_id` is required with the `github_app` strategy",
                AttributePath::new("github_installation_id"),
            );
        }
        if strategy == "deploy_token" && config.gitlab_project_id.is_null() {
            diags.error_short(
                "`gitlab_project_id` is required with the `deploy_token` strategy",
                AttributePath::new("gitlab_project_id"),
            );
        }
        check_requires(
            diags,
            AttributePath::new("github_installation_id"),
            &config.github_installation_id,
            strategy == "github_app",
            "`github_installation_id` is only used with the `github_app` strategy",
        );
        check_requires(
            diags,
            AttributePath::new("gitlab_project_id"),
            &config.gitlab_project_id,
            strategy == "deploy_token",
            "`gitlab_project_id` is only used with the `deploy_token` strategy",
        );
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track("remote_url", &prior.remote_url, &planned.remote_url)
            .track(
                "git_clone_strategy",
                &prior.git_clone_strategy,
                &planned.git_clone_strategy,
            )
            .track(
                "github_installation_id",
                &prior.github_installation_id,
                &planned.github_installation_id,
            )
            .track(
                "gitlab_project_id",
                &prior.gitlab_project_id,
                &planned.gitlab_project_id,
            )
            .track(
                "repository_credentials_id",
                &prior.repository_credentials_id,
                &planned.repository_credentials_id,
            )
            .track("is_active", &prior.is_active, &planned.is_active)
            .track(
                "pull_request_url_template",
                &prior.pull_request_url_template,
                &planned.pull_request_url_template,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.repository_id,
            prior.map(|prior| &prior.repository_id),
        );
        plan_computed(
            &mut planned.git_clone_strategy,
            prior.map(|prior| &prior.git_clone_strategy),
        );
        plan_computed(&mut planned.is_active, prior.map(|prior| &prior.is_active));
        plan_computed(
            &mut planned.deploy_key,
            prior.map(|prior| &prior.deploy_key),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [project_id, repository_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(RepositoryState {
            project_id: Value::Value(project_id),
            repository_id: Value::Value(repository_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(encode_id([model.project_id, model.id]).into());
        state.repository_id = Value::Value(model.id);
        state.project_id = Value::Value(model.project_id);
        state.remote_url = Value::Value(model.remote_url.into());
        state.git_clone_strategy = non_empty(&state.git_clone_strategy, model.git_clone_strategy);
        state.github_installation_id = value_of(model.github_installation_id);
        state.gitlab_project_id = value_of(model.gitlab_project_id);
        state.repository_credentials_id = value_of(model.repository_credentials_id);
        state.is_active = Value::Value(model.state.map_or(true, |state| state == STATE_ACTIVE));
        state.pull_request_url_template = non_empty(
            &state.pull_request_url_template,
            model.pull_request_url_template,
        );
        state.deploy_key = non_empty(
            &state.deploy_key,
            model.deploy_key.and_then(|key| key.public_key),
        );
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let project_id = known(&planned.project_id)
            .copied()
            .context("The project ID is not known")?;
        let payload = RepositoryPayload {
            account_id: Some(client.account_id()),
            project_id: Some(project_id),
            remote_url: known_str(&planned.remote_url),
            git_clone_strategy: known_str(&planned.git_clone_strategy),
            github_installation_id: known(&planned.github_installation_id).copied(),
            gitlab_project_id: known(&planned.gitlab_project_id).copied(),
            repository_credentials_id: known(&planned.repository_credentials_id).copied(),
            pull_request_url_template: Some(known_str(&planned.pull_request_url_template)),
            state: Some(active_state(&planned.is_active)),
        };
        Ok(client
            .post(
                &client.v3(&format!("projects/{project_id}/repositories")),
                &payload,
            )
            .await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let path = repository_path(state)?;
        let repository: RepositoryModel = client.get(&client.v3(&path)).await?;
        ensure_active(repository.state, path)?;
        Ok(repository)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let payload = RepositoryPayload {
            pull_request_url_template: changes.pick(
                "pull_request_url_template",
                known_str(&planned.pull_request_url_template),
            ),
            state: changes.pick("is_active", active_state(&planned.is_active)),
            ..Default::default()
        };
        Ok(client
            .patch(&client.v3(&repository_path(prior)?), &payload)
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        client.delete(&client.v3(&repository_path(state)?)).await?;
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
    use crate::testing::{data, mock_dbt_cloud, s, v3};

    use super::*;

    #[test]
    fn github_app_requires_installation() {
        let mut diags = Diagnostics::default();
        Repository.validate(
            &mut diags,
            &RepositoryState {
                project_id: Value::Value(3),
                remote_url: s("git@github.com:org/repo.git"),
                git_clone_strategy: s("github_app"),
                ..Default::default()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        Repository.validate(
            &mut diags,
            &RepositoryState {
                git_clone_strategy: s("deploy_key"),
                github_installation_id: Value::Value(5),
                ..Default::default()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn gitlab_project_only_with_deploy_token() {
        let mut diags = Diagnostics::default();
        Repository.validate(
            &mut diags,
            &RepositoryState {
                git_clone_strategy: s("deploy_key"),
                gitlab_project_id: Value::Value(8),
                ..Default::default()
            },
        );
        assert_eq!(diags.errors.len(), 1);

        let mut diags = Diagnostics::default();
        Repository.validate(
            &mut diags,
            &RepositoryState {
                git_clone_strategy: s("deploy_token"),
                gitlab_project_id: Value::Value(8),
                ..Default::default()
            },
        );
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn create_exposes_the_deploy_key() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("POST"))
            .and(path(v3("projects/3/repositories/")))
            .and(body_json(json!({
                "account_id": 1,
                "project_id": 3,
                "remote_url": "git@github.com:org/repo.git",
                "git_clone_strategy": "deploy_key",
                "pull_request_url_template": null,
                "state": 1,
            })))
            .respond_with(data(json!({
                "id": 8,
                "project_id": 3,
                "remote_url": "git@github.com:org/repo.git",
                "git_clone_strategy": "deploy_key",
                "deploy_key": {"public_key": "ssh-rsa AAAA"},
                "state": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resource = GenericApiResource::new(Repository, client);
        let mut diags = Diagnostics::default();
        let config = RepositoryState {
            project_id: Value::Value(3),
            remote_url: s("git@github.com:org/repo.git"),
            git_clone_strategy: s("deploy_key"),
            ..Default::default()
        };
        let (plan, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(config.clone()),
                Value::Value(config),
                Default::default(),
            )
            .await
            .unwrap();
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
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(state.id, s("3:8"));
        assert_eq!(state.deploy_key, s("ssh-rsa AAAA"));
        assert_eq!(state.is_active, Value::Value(true));
    }

    #[tokio::test]
    async fn deactivation_is_a_partial_update() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PATCH"))
            .and(path(v3("projects/3/repositories/8/")))
            .and(body_json(json!({"state": 0})))
            .respond_with(data(json!({
                "id": 8,
                "project_id": 3,
                "remote_url": "git@github.com:org/repo.git",
                "git_clone_strategy": "deploy_key",
                "state": 0,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prior = RepositoryState {
            id: s("3:8"),
            repository_id: Value::Value(8),
            project_id: Value::Value(3),
            remote_url: s("git@github.com:org/repo.git"),
            git_clone_strategy: s("deploy_key"),
            is_active: Value::Value(true),
            ..Default::default()
        };
        let planned = RepositoryState {
            is_active: Value::Value(false),
            ..prior.clone()
        };

        let resource = GenericApiResource::new(Repository, client);
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
        assert_eq!(state.is_active, Value::Value(false));
    }
}
