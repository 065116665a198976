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

use reqwest::StatusCode;
use thiserror::Error;

/// Longest response body kept in an error message
const MAX_BODY_LEN: usize = 512;

/// Errors raised while talking to the dbt Cloud API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The object does not exist (or has been soft-deleted)
    #[error("{0} not found")]
    NotFound(String),

    /// The API answered with a non-success status
    #[error("dbt Cloud API returned {status} for {url}: {body}")]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    #[error("request to dbt Cloud failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("could not decode the response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid dbt Cloud URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("the API token is not a valid header value")]
    InvalidToken,
}

impl ApiError {
    pub(crate) fn status(status: StatusCode, url: &str, mut body: String) -> Self {
        if body.len() > MAX_BODY_LEN {
            let mut end = MAX_BODY_LEN;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
            body.push_str("...");
        }
        Self::Status {
            status,
            url: url.to_owned(),
            body,
        }
    }
}

/// Check if an error means the remote object is gone
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_bodies_are_truncated() {
        let body = "é".repeat(MAX_BODY_LEN);
        let ApiError::Status { body, .. } =
            ApiError::status(StatusCode::BAD_REQUEST, "https://example.com", body)
        else {
            panic!("expected a status error");
        };
        assert!(body.len() <= MAX_BODY_LEN + 3);
        assert!(body.ends_with("..."));
    }

    #[test]
    fn not_found_survives_anyhow() {
        let err = anyhow::Error::from(ApiError::NotFound("project 12".into()));
        assert!(is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("boom")));
    }
}
