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

//! Jobs are only exposed by the v2 API, which has no partial update: every
//! update posts the whole job, deletion included.

use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::decode_id;
use crate::lifecycle::schema::{computed, id, optional, optional_computed, required, string_list};
use crate::lifecycle::{
    active_state, ensure_active, ApiObject, ChangeSet, STATE_ACTIVE, STATE_DELETED,
};
use crate::utils::{
    check_non_negative, known, known_str, non_empty, optional as optional_value, plan_computed,
    string, string_list as string_list_value, DisplayJoinable,
};

pub const JOB_TRIGGERS: &[&str] = &[
    "github_webhook",
    "git_provider_webhook",
    "schedule",
    "on_merge",
];

const DEFAULT_CRON: &str = "0 * * * *";
const DEFAULT_THREADS: i64 = 4;
const DEFAULT_TARGET_NAME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub job_id: ValueNumber,
    pub project_id: ValueNumber,
    pub environment_id: ValueNumber,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub execute_steps: ValueList<ValueString<'a>>,
    pub dbt_version: ValueString<'a>,
    pub is_active: ValueBool,
    pub num_threads: ValueNumber,
    pub target_name: ValueString<'a>,
    pub generate_docs: ValueBool,
    pub run_generate_sources: ValueBool,
    pub triggers: ValueMap<'a, ValueBool>,
    pub schedule_cron: ValueString<'a>,
    pub timeout_seconds: ValueNumber,
    pub deferring_environment_id: ValueNumber,
    pub triggers_on_draft_pr: ValueBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTriggers {
    #[serde(default)]
    pub github_webhook: bool,
    #[serde(default)]
    pub git_provider_webhook: bool,
    #[serde(default)]
    pub schedule: bool,
    #[serde(default)]
    pub on_merge: bool,
}

impl JobTriggers {
    fn from_state(triggers: &ValueMap<'_, ValueBool>) -> Self {
        let enabled = |name: &str| {
            known(triggers)
                .and_then(|triggers| triggers.get(name))
                .and_then(known)
                .copied()
                .unwrap_or(false)
        };
        Self {
            github_webhook: enabled("github_webhook"),
            git_provider_webhook: enabled("git_provider_webhook"),
            schedule: enabled("schedule"),
            on_merge: enabled("on_merge"),
        }
    }

    fn get(&self, name: &str) -> Option<bool> {
        match name {
            "github_webhook" => Some(self.github_webhook),
            "git_provider_webhook" => Some(self.git_provider_webhook),
            "schedule" => Some(self.schedule),
            "on_merge" => Some(self.on_merge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub threads: Option<i64>,
    #[serde(default)]
    pub target_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobExecution {
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSchedule {
    #[serde(default)]
    pub cron: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobModel {
    pub id: i64,
    pub project_id: i64,
    pub environment_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub execute_steps: Vec<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub state: Option<i64>,
    #[serde(default)]
    pub triggers: JobTriggers,
    #[serde(default)]
    pub settings: JobSettings,
    #[serde(default)]
    pub execution: JobExecution,
    #[serde(default)]
    pub generate_docs: Option<bool>,
    #[serde(default)]
    pub run_generate_sources: Option<bool>,
    #[serde(default)]
    pub schedule: JobSchedule,
    #[serde(default)]
    pub deferring_environment_id: Option<i64>,
    #[serde(default)]
    pub triggers_on_draft_pr: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SettingsPayload<'b> {
    threads: i64,
    target_name: &'b str,
}

#[derive(Debug, Serialize)]
struct ExecutionPayload {
    timeout_seconds: i64,
}

#[derive(Debug, Serialize)]
struct ScheduleDatePayload<'b> {
    #[serde(rename = "type")]
    date_type: &'static str,
    cron: &'b str,
}

#[derive(Debug, Serialize)]
struct ScheduleTimePayload {
    #[serde(rename = "type")]
    time_type: &'static str,
    interval: i64,
}

#[derive(Debug, Serialize)]
struct SchedulePayload<'b> {
    cron: &'b str,
    date: ScheduleDatePayload<'b>,
    time: ScheduleTimePayload,
}

/// The whole job, as the v2 API expects it on creation and update
#[derive(Debug, Serialize)]
struct JobPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    account_id: i64,
    project_id: i64,
    environment_id: i64,
    name: &'b str,
    description: &'b str,
    execute_steps: Vec<&'b str>,
    dbt_version: Option<&'b str>,
    state: i64,
    triggers: JobTriggers,
    settings: SettingsPayload<'b>,
    execution: ExecutionPayload,
    generate_docs: bool,
    run_generate_sources: bool,
    schedule: SchedulePayload<'b>,
    deferring_environment_id: Option<i64>,
    triggers_on_draft_pr: bool,
}

impl<'b> JobPayload<'b> {
    fn new(
        account_id: i64,
        id: Option<i64>,
        job_state: i64,
        state: &'b JobState<'_>,
    ) -> Result<Self> {
        let cron = known_str(&state.schedule_cron).unwrap_or(DEFAULT_CRON);
        Ok(Self {
            id,
            account_id,
            project_id: known(&state.project_id)
                .copied()
                .context("The project ID is not known")?,
            environment_id: known(&state.environment_id)
                .copied()
                .context("The environment ID is not known")?,
            name: known_str(&state.name).context("The job name is not known")?,
            description: known_str(&state.description).unwrap_or_default(),
            execute_steps: known(&state.execute_steps)
                .into_iter()
                .flatten()
                .filter_map(known_str)
                .collect(),
            dbt_version: known_str(&state.dbt_version),
            state: job_state,
            triggers: JobTriggers::from_state(&state.triggers),
            settings: SettingsPayload {
                threads: known(&state.num_threads)
                    .copied()
                    .unwrap_or(DEFAULT_THREADS),
                target_name: known_str(&state.target_name).unwrap_or(DEFAULT_TARGET_NAME),
            },
            execution: ExecutionPayload {
                timeout_seconds: known(&state.timeout_seconds).copied().unwrap_or(0),
            },
            generate_docs: known(&state.generate_docs).copied().unwrap_or(false),
            run_generate_sources: known(&state.run_generate_sources).copied().unwrap_or(false),
            schedule: SchedulePayload {
                cron,
                date: ScheduleDatePayload {
                    date_type: "custom_cron",
                    cron,
                },
                time: ScheduleTimePayload {
                    time_type: "every_hour",
                    interval: 1,
                },
            },
            deferring_environment_id: known(&state.deferring_environment_id).copied(),
            triggers_on_draft_pr: known(&state.triggers_on_draft_pr).copied().unwrap_or(false),
        })
    }
}

/// `dbtcloud_job`
#[derive(Debug, Default, Clone)]
pub struct Job;

fn job_id(state: &JobState) -> Result<i64> {
    known(&state.job_id)
        .copied()
        .context("The job ID is not known")
}

async fn post_job(
    client: &DbtCloudClient,
    path: &str,
    payload: &JobPayload<'_>,
) -> Result<JobModel> {
    Ok(client.post(&client.v2(path), payload).await?)
}

#[async_trait]
impl ApiObject for Job {
    const ID_FORMAT: &'static str = "`job_id`";
    const KEYS: &'static [&'static str] = &["job_id"];

    type State<'a> = JobState<'a>;
    type Model = JobModel;

    fn kind(&self) -> &'static str {
        "job"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the job"),
                    "job_id" => computed(AttributeType::Number, "The numeric ID of the job"),
                    "project_id" => required(AttributeType::Number, "Project of the job"),
                    "environment_id" => required(AttributeType::Number, "Environment the job runs in"),
                    "name" => required(AttributeType::String, "Name of the job"),
                    "description" => optional(AttributeType::String, "Description of the job"),
                    "execute_steps" => required(string_list(), "dbt commands run by the job"),
                    "dbt_version" => optional(
                        AttributeType::String,
                        "dbt version, defaults to the one of the environment",
                    ),
                    "is_active" => optional_computed(AttributeType::Bool, "Whether the job is active"),
                    "num_threads" => optional_computed(AttributeType::Number, "Number of threads dbt uses"),
                    "target_name" => optional_computed(AttributeType::String, "dbt target name"),
                    "generate_docs" => optional_computed(AttributeType::Bool, "Generate the documentation"),
                    "run_generate_sources" => optional_computed(
                        AttributeType::Bool,
                        "Compute the source freshness before running the steps",
                    ),
                    "triggers" => required(
                        AttributeType::Map(Box::new(AttributeType::Bool)),
                        "Enabled triggers, among `github_webhook`, `git_provider_webhook`, `schedule` and `on_merge`",
                    ),
                    "schedule_cron" => optional_computed(AttributeType::String, "Cron expression of the schedule"),
                    "timeout_seconds" => optional_computed(
                        AttributeType::Number,
                        "Run timeout, 0 for no timeout",
                    ),
                    "deferring_environment_id" => optional(
                        AttributeType::Number,
                        "Environment the job defers to",
                    ),
                    "triggers_on_draft_pr" => optional_computed(
                        AttributeType::Bool,
                        "Whether draft pull requests trigger the job",
                    ),
                },
                description: Description::plain("dbt Cloud job"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        if let Value::Value(triggers) = &config.triggers {
            for name in triggers.keys() {
                if !JOB_TRIGGERS.contains(&&**name) {
                    diags.error(
                        format!("Unknown trigger `{name}`"),
                        format!(
                            "Expected one of: {}",
                            JOB_TRIGGERS
                                .iter()
                                .map(|v| format!("`{v}`"))
                                .join_with(", ")
                        ),
                        AttributePath::new("triggers").key(name.to_string()),
                    );
                }
            }
        }
        if let Value::Value(steps) = &config.execute_steps {
            if steps.is_empty() {
                diags.error_short(
                    "A job needs at least one step",
                    AttributePath::new("execute_steps"),
                );
            }
        }
        check_non_negative(
            diags,
            AttributePath::new("num_threads"),
            &config.num_threads,
        );
        check_non_negative(
            diags,
            AttributePath::new("timeout_seconds"),
            &config.timeout_seconds,
        );
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("project_id", &prior.project_id, &planned.project_id)
            .track(
                "environment_id",
                &prior.environment_id,
                &planned.environment_id,
            )
            .track("name", &prior.name, &planned.name)
            .track("description", &prior.description, &planned.description)
            .track(
                "execute_steps",
                &prior.execute_steps,
                &planned.execute_steps,
            )
            .track("dbt_version", &prior.dbt_version, &planned.dbt_version)
            .track("is_active", &prior.is_active, &planned.is_active)
            .track("num_threads", &prior.num_threads, &planned.num_threads)
            .track("target_name", &prior.target_name, &planned.target_name)
            .track(
                "generate_docs",
                &prior.generate_docs,
                &planned.generate_docs,
            )
            .track(
                "run_generate_sources",
                &prior.run_generate_sources,
                &planned.run_generate_sources,
            )
            .track("triggers", &prior.triggers, &planned.triggers)
            .track(
                "schedule_cron",
                &prior.schedule_cron,
                &planned.schedule_cron,
            )
            .track(
                "timeout_seconds",
                &prior.timeout_seconds,
                &planned.timeout_seconds,
            )
            .track(
                "deferring_environment_id",
                &prior.deferring_environment_id,
                &planned.deferring_environment_id,
            )
            .track(
                "triggers_on_draft_pr",
                &prior.triggers_on_draft_pr,
                &planned.triggers_on_draft_pr,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(&mut planned.job_id, prior.map(|prior| &prior.job_id));
        plan_computed(&mut planned.is_active, prior.map(|prior| &prior.is_active));
        plan_computed(
            &mut planned.num_threads,
            prior.map(|prior| &prior.num_threads),
        );
        plan_computed(
            &mut planned.target_name,
            prior.map(|prior| &prior.target_name),
        );
        plan_computed(
            &mut planned.generate_docs,
            prior.map(|prior| &prior.generate_docs),
        );
        plan_computed(
            &mut planned.run_generate_sources,
            prior.map(|prior| &prior.run_generate_sources),
        );
        plan_computed(
            &mut planned.schedule_cron,
            prior.map(|prior| &prior.schedule_cron),
        );
        plan_computed(
            &mut planned.timeout_seconds,
            prior.map(|prior| &prior.timeout_seconds),
        );
        plan_computed(
            &mut planned.triggers_on_draft_pr,
            prior.map(|prior| &prior.triggers_on_draft_pr),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [job_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(JobState {
            job_id: Value::Value(job_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(model.id.to_string().into());
        state.job_id = Value::Value(model.id);
        state.project_id = Value::Value(model.project_id);
        state.environment_id = Value::Value(model.environment_id);
        state.name = Value::Value(model.name.into());
        state.description = non_empty(&state.description, model.description);
        state.execute_steps = string_list_value(model.execute_steps);
        state.dbt_version = non_empty(&state.dbt_version, model.dbt_version);
        state.is_active = Value::Value(model.state.map_or(true, |state| state == STATE_ACTIVE));
        state.num_threads = optional_value(model.settings.threads);
        state.target_name = string(model.settings.target_name);
        state.generate_docs = optional_value(model.generate_docs);
        state.run_generate_sources = optional_value(model.run_generate_sources);
        state.schedule_cron = non_empty(&state.schedule_cron, model.schedule.cron);
        state.timeout_seconds = optional_value(model.execution.timeout_seconds);
        state.deferring_environment_id = optional_value(model.deferring_environment_id);
        state.triggers_on_draft_pr = optional_value(model.triggers_on_draft_pr);

        // Only report the configured triggers, all of them after an import
        let remote = model.triggers;
        state.triggers = Value::Value(match &state.triggers {
            Value::Value(configured) => configured
                .keys()
                .filter_map(|name| Some((name.clone(), Value::Value(remote.get(name)?))))
                .collect(),
            Value::Null | Value::Unknown => JOB_TRIGGERS
                .iter()
                .filter_map(|name| Some((Cow::Borrowed(*name), Value::Value(remote.get(name)?))))
                .collect::<BTreeMap<_, _>>(),
        });
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = JobPayload::new(
            client.account_id(),
            None,
            active_state(&planned.is_active),
            planned,
        )?;
        post_job(client, "jobs", &payload).await
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let job_id = job_id(state)?;
        let job: JobModel = client.get(&client.v2(&format!("jobs/{job_id}"))).await?;
        ensure_active(job.state, format!("job {job_id}"))?;
        Ok(job)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        _changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let job_id = job_id(prior)?;
        let payload = JobPayload::new(
            client.account_id(),
            Some(job_id),
            active_state(&planned.is_active),
            planned,
        )?;
        post_job(client, &format!("jobs/{job_id}"), &payload).await
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let job_id = job_id(state)?;
        let payload = JobPayload::new(client.account_id(), Some(job_id), STATE_DELETED, state)?;
        post_job(client, &format!("jobs/{job_id}"), &payload).await?;
        Ok(())
    }
}
