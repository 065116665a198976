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

//! Composite Terraform IDs, e.g. `"{project_id}:{credential_id}"`

use std::fmt::Display;

use anyhow::{anyhow, Result};

use crate::utils::DisplayJoinable;

pub const ID_SEPARATOR: &str = ":";

pub fn encode_id<I, T>(parts: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    parts.into_iter().join_with(ID_SEPARATOR).to_string()
}

/// Split an ID into exactly `N` non-empty parts
pub fn split_id<'i, const N: usize>(id: &'i str, format: &str) -> Result<[&'i str; N]> {
    let mut parts = [""; N];
    let mut count = 0;
    for part in id.split(ID_SEPARATOR) {
        if count == N || part.is_empty() {
            return Err(malformed(id, format));
        }
        parts[count] = part;
        count += 1;
    }
    if count != N {
        return Err(malformed(id, format));
    }
    Ok(parts)
}

/// Split an ID into exactly `N` numeric parts
pub fn decode_id<const N: usize>(id: &str, format: &str) -> Result<[i64; N]> {
    let parts = split_id::<N>(id, format)?;
    let mut ids = [0; N];
    for (id_part, part) in ids.iter_mut().zip(parts) {
        *id_part = part
            .parse()
            .map_err(|_| anyhow!("`{part}` is not a numeric ID in `{id}`, expected {format}"))?;
    }
    Ok(ids)
}

fn malformed(id: &str, format: &str) -> anyhow::Error {
    anyhow!("Malformed ID `{id}`, expected {format}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_colons() {
        assert_eq!(encode_id([12, 34]), "12:34");
        assert_eq!(encode_id(["12", "DBT_ENV"]), "12:DBT_ENV");
        assert_eq!(encode_id([5]), "5");
    }

    #[test]
    fn decodes_numeric_parts() {
        assert_eq!(decode_id::<2>("12:34", "a:b").unwrap(), [12, 34]);
        assert_eq!(decode_id::<1>("7", "a").unwrap(), [7]);
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(decode_id::<2>("12", "a:b").is_err());
        assert!(decode_id::<2>("1:2:3", "a:b").is_err());
        assert!(split_id::<2>("1:", "a:b").is_err());
        assert!(split_id::<1>("", "a").is_err());
    }

    #[test]
    fn rejects_non_numeric_parts() {
        let err = decode_id::<2>("12:abc", "project_id:credential_id").unwrap_err();
        assert!(err.to_string().contains("project_id:credential_id"));
    }

    #[test]
    fn keeps_string_parts() {
        assert_eq!(
            split_id::<2>("12:DBT_TARGET", "a:b").unwrap(),
            ["12", "DBT_TARGET"]
        );
    }
}
