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

//! dbt Cloud objects exposed as Terraform resources and data sources

mod credential;
mod environment;
mod environment_variable;
mod ip_restrictions_rule;
mod job;
mod license_map;
mod oauth_configuration;
mod project;
mod project_repository;
mod repository;
mod semantic_layer_configuration;

pub use credential::{
    BigQueryCredential, DatabricksCredential, PostgresCredential, PostgresFlavour,
    SnowflakeCredential,
};
pub use environment::Environment;
pub use environment_variable::EnvironmentVariable;
pub use ip_restrictions_rule::IpRestrictionsRule;
pub use job::Job;
pub use license_map::LicenseMap;
pub use oauth_configuration::OAuthConfiguration;
pub use project::Project;
pub use project_repository::ProjectRepository;
pub use repository::Repository;
pub use semantic_layer_configuration::SemanticLayerConfiguration;
