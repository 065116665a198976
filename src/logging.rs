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

//! Logs go to stderr: stdout carries the plugin handshake.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Provider specific filter, checked before `RUST_LOG`
pub const LOG_ENV: &str = "DBTCLOUD_LOG";
const DEFAULT_FILTER: &str = "warn";

fn filter(lookup: impl Fn(&str) -> Option<String>) -> EnvFilter {
    [LOG_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .filter_map(lookup)
        .find_map(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init() {
    let subscriber = tracing_subscriber::registry()
        .with(filter(|name| std::env::var(name).ok()))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(false),
        );
    // Already installed when the provider is embedded, keep the existing one
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_variable_wins() {
        let filter = filter(|name| match name {
            LOG_ENV => Some("debug".to_owned()),
            _ => Some("error".to_owned()),
        });
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn defaults_to_warnings() {
        assert_eq!(filter(|_| None).to_string(), DEFAULT_FILTER);
        let filter = filter(|name| (name == "RUST_LOG").then(|| "info".to_owned()));
        assert_eq!(filter.to_string(), "info");
    }
}
