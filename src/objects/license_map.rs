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

use tf_provider::value::{Value, ValueNumber, ValueSet, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::decode_id;
use crate::lifecycle::schema::{computed, id, required, string_set};
use crate::lifecycle::{ApiObject, ChangeSet};
use crate::utils::{
    check_one_of, known, known_str, known_strings, plan_computed, string_set as set_of,
};

pub const LICENSE_TYPES: &[&str] = &["developer", "read_only", "analyst", "it"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LicenseMapState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub license_map_id: ValueNumber,
    pub license_type: ValueString<'a>,
    pub sso_license_mapping_groups: ValueSet<ValueString<'a>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LicenseMapModel {
    pub id: i64,
    pub license_type: String,
    #[serde(default)]
    pub sso_license_mapping_groups: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct LicenseMapPayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    license_type: Option<&'b str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sso_license_mapping_groups: Option<Vec<String>>,
}

/// `dbtcloud_license_map`: grants a license type to SSO groups
#[derive(Debug, Default, Clone)]
pub struct LicenseMap;

fn license_map_id(state: &LicenseMapState) -> Result<i64> {
    known(&state.license_map_id)
        .copied()
        .context("The license map ID is not known")
}

fn groups(state: &LicenseMapState) -> Vec<String> {
    known(&state.sso_license_mapping_groups)
        .map(|groups| known_strings(groups))
        .unwrap_or_default()
}

#[async_trait]
impl ApiObject for LicenseMap {
    const ID_FORMAT: &'static str = "`license_map_id`";
    const KEYS: &'static [&'static str] = &["license_map_id"];

    type State<'a> = LicenseMapState<'a>;
    type Model = LicenseMapModel;

    fn kind(&self) -> &'static str {
        "license map"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the license map"),
                    "license_map_id" => computed(AttributeType::Number, "The numeric ID of the license map"),
                    "license_type" => required(
                        AttributeType::String,
                        "License granted: `developer`, `read_only`, `analyst` or `it`",
                    ),
                    "sso_license_mapping_groups" => required(string_set(), "SSO groups receiving the license"),
                },
                description: Description::plain(
                    "Mapping from SSO groups to a dbt Cloud license type",
                ),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_one_of(
            diags,
            AttributePath::new("license_type"),
            &config.license_type,
            LICENSE_TYPES,
        );
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("license_type", &prior.license_type, &planned.license_type)
            .track(
                "sso_license_mapping_groups",
                &prior.sso_license_mapping_groups,
                &planned.sso_license_mapping_groups,
            )
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.license_map_id,
            prior.map(|prior| &prior.license_map_id),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [license_map_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(LicenseMapState {
            license_map_id: Value::Value(license_map_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(model.id.to_string().into());
        state.license_map_id = Value::Value(model.id);
        state.license_type = Value::Value(model.license_type.into());
        state.sso_license_mapping_groups = set_of(model.sso_license_mapping_groups);
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = LicenseMapPayload {
            account_id: Some(client.account_id()),
            license_type: known_str(&planned.license_type),
            sso_license_mapping_groups: Some(groups(planned)),
        };
        Ok(client.post(&client.v3("license-maps"), &payload).await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let license_map_id = license_map_id(state)?;
        Ok(client
            .get(&client.v3(&format!("license-maps/{license_map_id}")))
            .await?)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let license_map_id = license_map_id(prior)?;
        let payload = LicenseMapPayload {
            license_type: changes
                .pick("license_type", known_str(&planned.license_type))
                .flatten(),
            sso_license_mapping_groups: changes.pick("sso_license_mapping_groups", groups(planned)),
            ..Default::default()
        };
        Ok(client
            .patch(
                &client.v3(&format!("license-maps/{license_map_id}")),
                &payload,
            )
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let license_map_id = license_map_id(state)?;
        client
            .delete(&client.v3(&format!("license-maps/{license_map_id}")))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tf_provider::{DataSource, Resource};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::Mock;

    use crate::lifecycle::{GenericApiDataSource, GenericApiResource};
    use crate::testing::{data, mock_dbt_cloud, s, v3};

    use super::*;

    fn analysts() -> LicenseMapState<'static> {
        LicenseMapState {
            id: s("9"),
            license_map_id: Value::Value(9),
            license_type: s("analyst"),
            sso_license_mapping_groups: Value::Value([s("analysts")].into_iter().collect()),
        }
    }

    #[test]
    fn license_types_are_checked() {
        let mut diags = Diagnostics::default();
        LicenseMap.validate(
            &mut diags,
            &LicenseMapState {
                license_type: s("admin"),
                ..analysts()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn group_changes_only_send_the_groups() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PATCH"))
            .and(path(v3("license-maps/9/")))
            .and(body_json(json!({
                "sso_license_mapping_groups": ["analysts", "finance"],
            })))
            .respond_with(data(json!({
                "id": 9,
                "license_type": "analyst",
                "sso_license_mapping_groups": ["finance", "analysts"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let planned = LicenseMapState {
            sso_license_mapping_groups: Value::Value(
                [s("analysts"), s("finance")].into_iter().collect(),
            ),
            ..analysts()
        };
        let resource = GenericApiResource::new(LicenseMap, client);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .update(
                &mut diags,
                Value::Value(analysts()),
                Value::Value(planned.clone()),
                Value::Value(planned.clone()),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(state) = state else {
            panic!("state should not be null");
        };
        assert_eq!(
            state.sso_license_mapping_groups,
            planned.sso_license_mapping_groups
        );
    }

    #[tokio::test]
    async fn data_source_reports_missing_maps() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("license-maps/10/")))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let data_source = GenericApiDataSource::new(LicenseMap, client);
        let mut diags = Diagnostics::default();
        let state = data_source
            .read(
                &mut diags,
                LicenseMapState {
                    license_map_id: Value::Value(10),
                    ..Default::default()
                },
                Default::default(),
            )
            .await;
        assert!(state.is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
