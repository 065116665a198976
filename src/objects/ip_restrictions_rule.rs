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

use std::net::IpAddr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::value::{Value, ValueBool, ValueNumber, ValueSet, ValueString};
use tf_provider::{
    map, schema::AttributeType, schema::Block, schema::Description, schema::Schema, AttributePath,
    Diagnostics,
};

use crate::client::DbtCloudClient;
use crate::ids::decode_id;
use crate::lifecycle::schema::{computed, id, optional, optional_computed, required, string_set};
use crate::lifecycle::{ApiObject, ChangeSet};
use crate::utils::{
    check_one_of, known, known_str, known_strings, non_empty, plan_computed,
    string_set as string_set_value,
};

pub const RULE_TYPES: &[&str] = &["allow", "deny"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IpRestrictionsRuleState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub ip_restrictions_rule_id: ValueNumber,
    pub name: ValueString<'a>,
    pub r#type: ValueString<'a>,
    pub description: ValueString<'a>,
    pub rule_set_enabled: ValueBool,
    pub cidrs: ValueSet<ValueString<'a>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cidr {
    pub cidr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpRestrictionsRuleModel {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_set_enabled: bool,
    #[serde(default)]
    pub cidrs: Vec<Cidr>,
}

/// The whole rule, PUT replaces the previous one
#[derive(Debug, Serialize)]
struct RulePayload<'b> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    account_id: i64,
    name: &'b str,
    #[serde(rename = "type")]
    rule_type: &'b str,
    description: &'b str,
    rule_set_enabled: bool,
    cidrs: Vec<Cidr>,
}

impl<'b> RulePayload<'b> {
    fn new(
        account_id: i64,
        id: Option<i64>,
        state: &'b IpRestrictionsRuleState<'_>,
    ) -> Result<Self> {
        Ok(Self {
            id,
            account_id,
            name: known_str(&state.name).context("The rule name is not known")?,
            rule_type: known_str(&state.r#type).context("The rule type is not known")?,
            description: known_str(&state.description).unwrap_or_default(),
            rule_set_enabled: known(&state.rule_set_enabled).copied().unwrap_or(false),
            cidrs: known(&state.cidrs)
                .map(|cidrs| known_strings(cidrs))
                .unwrap_or_default()
                .into_iter()
                .map(|cidr| Cidr { cidr })
                .collect(),
        })
    }
}

/// Check an `address/prefix` CIDR block
pub(crate) fn parse_cidr(cidr: &str) -> Result<(IpAddr, u8), String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("`{cidr}` is not in `address/prefix` notation"))?;
    let address: IpAddr = address
        .parse()
        .map_err(|_| format!("`{address}` is not an IP address"))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("`{prefix}` is not a prefix length"))?;
    let max = if address.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix `/{prefix}` is longer than {max} bits"));
    }
    Ok((address, prefix))
}

/// `dbtcloud_ip_restrictions_rule`
#[derive(Debug, Default, Clone)]
pub struct IpRestrictionsRule;

fn rule_id(state: &IpRestrictionsRuleState) -> Result<i64> {
    known(&state.ip_restrictions_rule_id)
        .copied()
        .context("The rule ID is not known")
}

#[async_trait]
impl ApiObject for IpRestrictionsRule {
    const ID_FORMAT: &'static str = "`ip_restrictions_rule_id`";
    const KEYS: &'static [&'static str] = &["ip_restrictions_rule_id"];

    type State<'a> = IpRestrictionsRuleState<'a>;
    type Model = IpRestrictionsRuleModel;

    fn kind(&self) -> &'static str {
        "IP restrictions rule"
    }

    fn schema(&self) -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => id("The ID of the rule"),
                    "ip_restrictions_rule_id" => computed(AttributeType::Number, "The numeric ID of the rule"),
                    "name" => required(AttributeType::String, "Name of the rule"),
                    "type" => required(AttributeType::String, "`allow` or `deny`"),
                    "description" => optional(AttributeType::String, "Description of the rule"),
                    "rule_set_enabled" => optional_computed(
                        AttributeType::Bool,
                        "Whether IP restrictions are enforced for the account",
                    ),
                    "cidrs" => required(string_set(), "CIDR blocks the rule applies to"),
                },
                description: Description::plain("IP restrictions rule of the dbt Cloud account"),
                ..Default::default()
            },
        }
    }

    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        check_one_of(
            diags,
            AttributePath::new("type"),
            &config.r#type,
            RULE_TYPES,
        );
        if let Value::Value(cidrs) = &config.cidrs {
            for cidr in cidrs.iter().filter_map(known_str) {
                if let Err(reason) = parse_cidr(cidr) {
                    diags.error("Invalid CIDR block", reason, AttributePath::new("cidrs"));
                }
            }
        }
    }

    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet {
        ChangeSet::default()
            .track("name", &prior.name, &planned.name)
            .track("type", &prior.r#type, &planned.r#type)
            .track("description", &prior.description, &planned.description)
            .track(
                "rule_set_enabled",
                &prior.rule_set_enabled,
                &planned.rule_set_enabled,
            )
            .track("cidrs", &prior.cidrs, &planned.cidrs)
    }

    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>) {
        plan_computed(&mut planned.id, prior.map(|prior| &prior.id));
        plan_computed(
            &mut planned.ip_restrictions_rule_id,
            prior.map(|prior| &prior.ip_restrictions_rule_id),
        );
        plan_computed(
            &mut planned.rule_set_enabled,
            prior.map(|prior| &prior.rule_set_enabled),
        );
    }

    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>> {
        let [rule_id] = decode_id(id, Self::ID_FORMAT)?;
        Ok(IpRestrictionsRuleState {
            ip_restrictions_rule_id: Value::Value(rule_id),
            ..Default::default()
        })
    }

    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model) {
        state.id = Value::Value(model.id.to_string().into());
        state.ip_restrictions_rule_id = Value::Value(model.id);
        state.name = Value::Value(model.name.into());
        state.r#type = Value::Value(model.rule_type.into());
        state.description = non_empty(&state.description, model.description);
        state.rule_set_enabled = Value::Value(model.rule_set_enabled);
        state.cidrs = string_set_value(model.cidrs.into_iter().map(|cidr| cidr.cidr).collect());
    }

    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let payload = RulePayload::new(client.account_id(), None, planned)?;
        Ok(client.post(&client.v3("ip-restrictions"), &payload).await?)
    }

    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model> {
        let rule_id = rule_id(state)?;
        Ok(client
            .get(&client.v3(&format!("ip-restrictions/{rule_id}")))
            .await?)
    }

    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        _changes: &ChangeSet,
    ) -> Result<Self::Model> {
        let rule_id = rule_id(prior)?;
        let payload = RulePayload::new(client.account_id(), Some(rule_id), planned)?;
        Ok(client
            .put(&client.v3(&format!("ip-restrictions/{rule_id}")), &payload)
            .await?)
    }

    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()> {
        let rule_id = rule_id(state)?;
        client
            .delete(&client.v3(&format!("ip-restrictions/{rule_id}")))
            .await?;
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
    use crate::testing::{data, mock_dbt_cloud, s, v3, ACCOUNT_ID};

    use super::*;

    fn office() -> IpRestrictionsRuleState<'static> {
        IpRestrictionsRuleState {
            id: s("6"),
            ip_restrictions_rule_id: Value::Value(6),
            name: s("office"),
            r#type: s("allow"),
            description: Value::Null,
            rule_set_enabled: Value::Value(false),
            cidrs: Value::Value([s("10.0.0.0/8")].into_iter().collect()),
        }
    }

    #[test]
    fn cidrs_need_an_address_and_a_prefix() {
        assert!(parse_cidr("10.0.0.0/8").is_ok());
        assert!(parse_cidr("2001:db8::/32").is_ok());
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("office/8").is_err());

        let mut diags = Diagnostics::default();
        IpRestrictionsRule.validate(
            &mut diags,
            &IpRestrictionsRuleState {
                r#type: s("block"),
                cidrs: Value::Value([s("10.0.0.0/8"), s("192.168.1.1")].into_iter().collect()),
                ..office()
            },
        );
        assert_eq!(diags.errors.len(), 2);
    }

    #[tokio::test]
    async fn update_puts_the_whole_rule() {
        let (server, client) = mock_dbt_cloud().await;
        Mock::given(method("PUT"))
            .and(path(v3("ip-restrictions/6/")))
            .and(body_json(json!({
                "id": 6,
                "account_id": ACCOUNT_ID,
                "name": "office",
                "type": "allow",
                "description": "",
                "rule_set_enabled": false,
                "cidrs": [{"cidr": "10.0.0.0/8"}, {"cidr": "172.16.0.0/12"}],
            })))
            .respond_with(data(json!({
                "id": 6,
                "name": "office",
                "type": "allow",
                "description": "",
                "rule_set_enabled": false,
                "cidrs": [{"cidr": "172.16.0.0/12", "id": 2}, {"cidr": "10.0.0.0/8", "id": 1}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let planned = IpRestrictionsRuleState {
            cidrs: Value::Value([s("10.0.0.0/8"), s("172.16.0.0/12")].into_iter().collect()),
            ..office()
        };
        let resource = GenericApiResource::new(IpRestrictionsRule, client);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .update(
                &mut diags,
                Value::Value(office()),
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
        assert_eq!(state.cidrs, planned.cidrs);
    }
}
