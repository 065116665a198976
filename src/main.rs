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

use dbtcloud_provider::DbtCloudProvider;

mod client;
mod dbtcloud_provider;
mod ids;
mod lifecycle;
mod logging;
mod objects;
#[cfg(test)]
mod testing;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        "starting dbt Cloud provider"
    );
    tf_provider::serve("dbtcloud", DbtCloudProvider::default()).await
}
