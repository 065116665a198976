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

//! Warehouse credentials, stored below `projects/{project_id}/credentials/`

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use tf_provider::value::ValueNumber;

use crate::client::DbtCloudClient;
use crate::lifecycle::ensure_active;
use crate::utils::known;

mod bigquery;
mod databricks;
mod postgres;
mod snowflake;

pub use bigquery::BigQueryCredential;
pub use databricks::DatabricksCredential;
pub use postgres::{PostgresCredential, PostgresFlavour};
pub use snowflake::SnowflakeCredential;

pub const CREDENTIAL_ID_FORMAT: &str = "`project_id:credential_id`";

#[derive(Debug, Deserialize)]
struct CredentialHeader {
    #[serde(rename = "type")]
    credential_type: String,
    #[serde(default)]
    state: Option<i64>,
}

pub(crate) fn credential_ids(
    project_id: &ValueNumber,
    credential_id: &ValueNumber,
) -> Result<(i64, i64)> {
    let project_id = known(project_id)
        .copied()
        .context("The project ID is not known")?;
    let credential_id = known(credential_id)
        .copied()
        .context("The credential ID is not known")?;
    Ok((project_id, credential_id))
}

pub(crate) fn project_id(project_id: &ValueNumber) -> Result<i64> {
    known(project_id)
        .copied()
        .context("The project ID is not known")
}

pub(crate) async fn create_credential<P, M>(
    client: &DbtCloudClient,
    project_id: i64,
    payload: &P,
) -> Result<M>
where
    P: Serialize + Sync,
    M: DeserializeOwned,
{
    Ok(client
        .post(
            &client.v3(&format!("projects/{project_id}/credentials")),
            payload,
        )
        .await?)
}

/// Fetch a credential, checking it is active and of the expected type
pub(crate) async fn read_credential<M: DeserializeOwned>(
    client: &DbtCloudClient,
    (project_id, credential_id): (i64, i64),
    expected_type: &str,
) -> Result<M> {
    let path = format!("projects/{project_id}/credentials/{credential_id}");
    let credential: serde_json::Value = client.get(&client.v3(&path)).await?;

    let header = CredentialHeader::deserialize(&credential)
        .with_context(|| format!("Unexpected credential payload for {path}"))?;
    ensure_active(header.state, format!("credential {credential_id}"))?;
    if header.credential_type != expected_type {
        bail!(
            "Credential {credential_id} is a `{}` credential, not a `{expected_type}` one",
            header.credential_type
        );
    }

    M::deserialize(credential).with_context(|| format!("Unexpected credential payload for {path}"))
}

pub(crate) async fn update_credential<P, M>(
    client: &DbtCloudClient,
    (project_id, credential_id): (i64, i64),
    payload: &P,
) -> Result<M>
where
    P: Serialize + Sync,
    M: DeserializeOwned,
{
    Ok(client
        .patch(
            &client.v3(&format!(
                "projects/{project_id}/credentials/{credential_id}"
            )),
            payload,
        )
        .await?)
}

pub(crate) async fn delete_credential(
    client: &DbtCloudClient,
    (project_id, credential_id): (i64, i64),
) -> Result<()> {
    client
        .delete(&client.v3(&format!(
            "projects/{project_id}/credentials/{credential_id}"
        )))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::Mock;

    use crate::client::is_not_found;
    use crate::testing::{data, mock_dbt_cloud, v3};

    use super::*;

    #[tokio::test]
    async fn read_checks_type_and_state() {
        let (server, handle) = mock_dbt_cloud().await;
        Mock::given(method("GET"))
            .and(path(v3("projects/3/credentials/5/")))
            .respond_with(data(json!({"id": 5, "type": "bigquery", "state": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(v3("projects/3/credentials/6/")))
            .respond_with(data(json!({"id": 6, "type": "snowflake", "state": 2})))
            .mount(&server)
            .await;

        let mut diags = tf_provider::Diagnostics::default();
        let client = handle.get(&mut diags).await.unwrap();

        let credential: serde_json::Value =
            read_credential(&client, (3, 5), "bigquery").await.unwrap();
        assert_eq!(credential["id"], 5);

        let err = read_credential::<serde_json::Value>(&client, (3, 5), "snowflake")
            .await
            .unwrap_err();
        assert!(!is_not_found(&err));

        let err = read_credential::<serde_json::Value>(&client, (3, 6), "snowflake")
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
    }
}
