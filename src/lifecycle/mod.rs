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

use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tf_provider::value::{Value, ValueBool};
use tf_provider::{schema::Schema, Diagnostics};

use crate::client::DbtCloudClient;

mod changes;
mod data_source;
mod resource;
pub(crate) mod schema;

pub use changes::ChangeSet;
pub use data_source::GenericApiDataSource;
pub use resource::GenericApiResource;

/// `state` of a deactivated dbt Cloud object
pub const STATE_INACTIVE: i64 = 0;
/// `state` of an active dbt Cloud object
pub const STATE_ACTIVE: i64 = 1;
/// `state` of a soft-deleted dbt Cloud object
pub const STATE_DELETED: i64 = 2;

/// A dbt Cloud object managed through the REST API
///
/// [`GenericApiResource`] and [`GenericApiDataSource`] turn an implementation
/// of this trait into a Terraform resource and data source.
#[async_trait]
pub trait ApiObject: Send + Sync + Debug + 'static {
    /// Format of the Terraform ID, used in error messages
    const ID_FORMAT: &'static str;
    /// Attributes identifying the object when used as a data source
    const KEYS: &'static [&'static str];
    /// Attributes whose modification forces a replacement
    const REPLACE_ON: &'static [&'static str] = &[];

    /// Terraform state of the object
    type State<'a>: Serialize + Deserialize<'a> + Send + Sync + Clone + Debug + Default;
    /// Object as returned by the API
    type Model: DeserializeOwned + Send;

    /// Human readable name of the object
    fn kind(&self) -> &'static str;

    /// Schema of the resource
    fn schema(&self) -> Schema;

    /// Validate the configuration
    fn validate<'a>(&self, diags: &mut Diagnostics, config: &Self::State<'a>) {
        _ = diags;
        _ = config;
    }

    /// Attributes whose planned value differs from the prior state
    fn diff<'a>(&self, prior: &Self::State<'a>, planned: &Self::State<'a>) -> ChangeSet;

    /// Fill computed attributes of a planned state
    ///
    /// `prior` is [`None`] when the object is about to be created.
    fn plan<'a>(&self, prior: Option<&Self::State<'a>>, planned: &mut Self::State<'a>);

    /// Build a state from an imported Terraform ID
    fn import<'a>(&self, id: &str) -> Result<Self::State<'a>>;

    /// Copy an API object onto the state
    fn apply<'a>(&self, state: &mut Self::State<'a>, model: Self::Model);

    /// Create the object
    async fn create<'a>(
        &self,
        client: &DbtCloudClient,
        planned: &Self::State<'a>,
    ) -> Result<Self::Model>;

    /// Fetch the object identified by the state
    ///
    /// A missing or soft-deleted object is reported with
    /// [`ApiError::NotFound`](crate::client::ApiError::NotFound).
    async fn read<'a>(
        &self,
        client: &DbtCloudClient,
        state: &Self::State<'a>,
    ) -> Result<Self::Model>;

    /// Update the object with the attributes listed in `changes`
    async fn update<'a>(
        &self,
        client: &DbtCloudClient,
        prior: &Self::State<'a>,
        planned: &Self::State<'a>,
        changes: &ChangeSet,
    ) -> Result<Self::Model>;

    /// Delete the object
    async fn delete<'a>(&self, client: &DbtCloudClient, state: &Self::State<'a>) -> Result<()>;
}

/// Fail with `NotFound` if a fetched object has been soft-deleted
pub(crate) fn ensure_active(state: Option<i64>, what: impl Into<String>) -> Result<()> {
    if state == Some(STATE_DELETED) {
        Err(crate::client::ApiError::NotFound(what.into()).into())
    } else {
        Ok(())
    }
}

/// `state` to send for an `is_active` attribute, active unless explicitly false
pub(crate) fn active_state(is_active: &ValueBool) -> i64 {
    if *is_active == Value::Value(false) {
        STATE_INACTIVE
    } else {
        STATE_ACTIVE
    }
}
