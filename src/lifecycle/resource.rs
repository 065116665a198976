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

use async_trait::async_trait;

use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{schema::Schema, AttributePath, Diagnostics, Resource};

use crate::client::{is_not_found, ClientHandle};

use super::ApiObject;

#[derive(Debug)]
pub struct GenericApiResource<T: ApiObject> {
    pub(super) object: T,
    pub(super) client: ClientHandle,
}

impl<T: ApiObject> GenericApiResource<T> {
    pub fn new(object: T, client: ClientHandle) -> Self {
        Self { object, client }
    }
}

#[async_trait]
impl<T> Resource for GenericApiResource<T>
where
    T: ApiObject,
{
    type State<'a> = Value<T::State<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(self.object.schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            self.object.validate(diags, config);
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(mut state) = state else {
            return Some((state, private_state));
        };
        let client = self.client.get(diags).await?;
        let kind = self.object.kind();

        match self.object.read(&client, &state).await {
            Ok(model) => {
                self.object.apply(&mut state, model);
                Some((Value::Value(state), private_state))
            }
            // Gone remotely: drop it from the state so that Terraform plans a creation
            Err(err) if is_not_found(&err) => {
                tracing::warn!(kind, "{kind} no longer exists, removing it from the state");
                Some((Value::Null, private_state))
            }
            Err(err) => {
                diags.root_error(format!("Failed to read {kind}"), format!("{err:#}"));
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        if let Value::Value(planned) = &mut state {
            self.object.plan(None, planned);
        }

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<tf_provider::AttributePath>,
    )> {
        let mut state = proposed_state;
        let mut trigger_replace = Vec::new();

        if let (Value::Value(prior), Value::Value(planned)) = (&prior_state, &mut state) {
            let changes = self.object.diff(prior, planned);
            if !changes.is_empty() {
                tracing::debug!(kind = self.object.kind(), %changes, "planning update");
            }
            trigger_replace = T::REPLACE_ON
                .iter()
                .filter(|name| changes.contains(name))
                .map(|name| AttributePath::new(*name))
                .collect();
            self.object.plan(Some(prior), planned);
        }

        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let kind = self.object.kind();
        let Value::Value(mut state) = planned_state else {
            diags.root_error_short(format!("Cannot create a {kind} from an empty plan"));
            return None;
        };
        let client = self.client.get(diags).await?;

        match self.object.create(&client, &state).await {
            Ok(model) => {
                self.object.apply(&mut state, model);
                tracing::info!(kind, "{kind} created");
                Some((Value::Value(state), private_state))
            }
            Err(err) => {
                diags.root_error(format!("Failed to create {kind}"), format!("{err:#}"));
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let kind = self.object.kind();
        let (Value::Value(prior), Value::Value(mut state)) = (prior_state, planned_state) else {
            diags.root_error_short(format!("Cannot update a {kind} without prior state"));
            return None;
        };

        let changes = self.object.diff(&prior, &state);
        if changes.is_empty() {
            return Some((Value::Value(state), private_state));
        }

        let client = self.client.get(diags).await?;
        match self.object.update(&client, &prior, &state, &changes).await {
            Ok(model) => {
                self.object.apply(&mut state, model);
                tracing::info!(kind, %changes, "{kind} updated");
                Some((Value::Value(state), private_state))
            }
            Err(err) => {
                diags.root_error(format!("Failed to update {kind}"), format!("{err:#}"));
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let Value::Value(state) = state else {
            return Some(());
        };
        let client = self.client.get(diags).await?;
        let kind = self.object.kind();

        match self.object.delete(&client, &state).await {
            Ok(()) => {
                tracing::info!(kind, "{kind} deleted");
                Some(())
            }
            Err(err) if is_not_found(&err) => {
                tracing::warn!(kind, "{kind} was already deleted");
                Some(())
            }
            Err(err) => {
                diags.root_error(format!("Failed to delete {kind}"), format!("{err:#}"));
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        match self.object.import(&id) {
            Ok(state) => Some((Value::Value(state), Default::default())),
            Err(err) => {
                diags.root_error(
                    format!("Cannot import {}", self.object.kind()),
                    format!("{err:#}\nThe import ID must be {}", T::ID_FORMAT),
                );
                None
            }
        }
    }
}
