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

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    default_on_request_failure, policies::ExponentialBackoff, RetryTransientMiddleware, Retryable,
    RetryableStrategy,
};

/// Retry a response only when its status is one of the configured codes
#[derive(Debug, Clone)]
pub(crate) struct RetriableStatusCodes(pub Vec<u16>);

impl RetryableStrategy for RetriableStatusCodes {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) => {
                let status = response.status().as_u16();
                if self.0.contains(&status) {
                    tracing::debug!(status, url = %response.url(), "retrying dbt Cloud request");
                    Some(Retryable::Transient)
                } else {
                    None
                }
            }
            Err(err) => default_on_request_failure(err),
        }
    }
}

/// Wrap a client so that transient failures are retried `max_retries` times,
/// waiting `interval` between attempts
pub(crate) fn with_retries(
    client: reqwest::Client,
    max_retries: u32,
    interval: Duration,
    codes: Vec<u16>,
) -> ClientWithMiddleware {
    let policy = ExponentialBackoff::builder()
        .retry_bounds(interval, interval)
        .build_with_max_retries(max_retries);
    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy_and_strategy(
            policy,
            RetriableStatusCodes(codes),
        ))
        .build()
}
