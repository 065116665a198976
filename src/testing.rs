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

//! Helpers shared by the unit tests

use std::borrow::Cow;
use std::time::Duration;

use serde_json::json;
use tf_provider::value::{Value, ValueString};
use wiremock::{MockServer, ResponseTemplate};

use crate::client::{ClientConfig, ClientHandle, DbtCloudClient};

pub const ACCOUNT_ID: i64 = 1;

/// Start a mock dbt Cloud and a configured client handle pointing to it
pub async fn mock_dbt_cloud() -> (MockServer, ClientHandle) {
    let server = MockServer::start().await;
    let config = ClientConfig {
        host_url: format!("{}/api", server.uri()),
        max_retries: 0,
        retry_interval: Duration::from_millis(1),
        ..ClientConfig::new(ACCOUNT_ID, "test-token")
    };
    let handle = ClientHandle::default();
    handle
        .set(DbtCloudClient::new(&config).expect("client"))
        .await;
    (server, handle)
}

/// Path of a v3 endpoint of the test account
pub fn v3(path: &str) -> String {
    format!("/api/v3/accounts/{ACCOUNT_ID}/{path}")
}

/// Path of a v2 endpoint of the test account
pub fn v2(path: &str) -> String {
    format!("/api/v2/accounts/{ACCOUNT_ID}/{path}")
}

/// Successful response wrapping `data` in the API envelope
pub fn data(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": data,
        "status": {"code": 200, "is_success": true},
    }))
}

pub fn s(value: &'static str) -> ValueString<'static> {
    Value::Value(Cow::Borrowed(value))
}
