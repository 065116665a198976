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

use tf_provider::{schema::Schema, value::ValueEmpty, DataSource, Diagnostics};

use crate::client::{is_not_found, ClientHandle};

use super::schema::data_source_schema;
use super::ApiObject;

#[derive(Debug)]
pub struct GenericApiDataSource<T: ApiObject> {
    pub(super) object: T,
    pub(super) client: ClientHandle,
}

impl<T: ApiObject> GenericApiDataSource<T> {
    pub fn new(object: T, client: ClientHandle) -> Self {
        Self { object, client }
    }
}

#[async_trait]
impl<T> DataSource for GenericApiDataSource<T>
where
    T: ApiObject,
{
    type State<'a> = T::State<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(data_source_schema(self.object.schema(), T::KEYS))
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags).await?;
        let kind = self.object.kind();
        let mut state = config;

        match self.object.read(&client, &state).await {
            Ok(model) => {
                self.object.apply(&mut state, model);
                Some(state)
            }
            Err(err) if is_not_found(&err) => {
                diags.root_error(format!("The {kind} does not exist"), format!("{err:#}"));
                None
            }
            Err(err) => {
                diags.root_error(format!("Failed to read {kind}"), format!("{err:#}"));
                None
            }
        }
    }
}
