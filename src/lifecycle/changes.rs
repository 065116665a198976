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

use std::collections::BTreeSet;

use tf_provider::value::Value;

use crate::utils::DisplayJoinable;

/// Names of the attributes modified between two states
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(BTreeSet<&'static str>);

impl ChangeSet {
    /// Record `name` if its planned value is unknown or differs from the prior one
    pub fn track<T: PartialEq>(
        mut self,
        name: &'static str,
        prior: &Value<T>,
        planned: &Value<T>,
    ) -> Self {
        if planned.is_unknown() || prior != planned {
            self.0.insert(name);
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep `value` in a partial payload only if `name` changed
    pub fn pick<T>(&self, name: &str, value: T) -> Option<T> {
        self.contains(name).then_some(value)
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().join_with(", "))
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use tf_provider::value::{ValueNumber, ValueString};

    use super::*;

    #[test]
    fn tracks_modified_attributes() {
        let name: ValueString = Value::Value(Cow::Borrowed("a"));
        let renamed: ValueString = Value::Value(Cow::Borrowed("b"));
        let threads: ValueNumber = Value::Value(4);

        let changes = ChangeSet::default()
            .track("name", &name, &renamed)
            .track("num_threads", &threads, &threads)
            .track("description", &Value::<Cow<str>>::Null, &Value::Null);

        assert!(changes.contains("name"));
        assert!(!changes.contains("num_threads"));
        assert!(!changes.contains("description"));
        assert_eq!(changes.to_string(), "name");
    }

    #[test]
    fn unknown_values_are_changes() {
        let threads: ValueNumber = Value::Value(4);
        let changes = ChangeSet::default().track("num_threads", &threads, &Value::Unknown);
        assert!(changes.contains("num_threads"));
    }

    #[test]
    fn null_to_value_is_a_change() {
        let changes = ChangeSet::default().track("num_threads", &Value::Null, &Value::Value(4_i64));
        assert_eq!(changes.pick("num_threads", 4), Some(4));
        assert_eq!(changes.pick("name", "x"), None);
    }
}
