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

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeSet;

use tf_provider::value::{Value, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{AttributePath, Diagnostics};

/// Borrow the content of a known value
pub(crate) fn known<T>(value: &Value<T>) -> Option<&T> {
    match value {
        Value::Value(value) => Some(value),
        Value::Null | Value::Unknown => None,
    }
}

pub(crate) fn known_str<'b>(value: &'b ValueString<'_>) -> Option<&'b str> {
    known(value).map(|value| &**value)
}

pub(crate) fn known_string(value: &ValueString<'_>) -> Option<String> {
    known_str(value).map(str::to_owned)
}

/// Null when absent
pub(crate) fn optional<T>(value: Option<T>) -> Value<T> {
    value.map_or(Value::Null, Value::Value)
}

pub(crate) fn string<'a>(value: Option<String>) -> ValueString<'a> {
    optional(value.map(Cow::Owned))
}

/// Null for absent or empty strings, as the API returns `""` for unset text
///
/// An empty string already held by `current` is kept.
pub(crate) fn non_empty<'a>(current: &ValueString<'a>, value: Option<String>) -> ValueString<'a> {
    match value.filter(|value| !value.is_empty()) {
        None if known_str(current) == Some("") => current.clone(),
        value => string(value),
    }
}

pub(crate) fn string_list<'a>(values: Vec<String>) -> ValueList<ValueString<'a>> {
    Value::Value(
        values
            .into_iter()
            .map(|value| Value::Value(Cow::Owned(value)))
            .collect(),
    )
}

pub(crate) fn string_set<'a>(values: Vec<String>) -> ValueSet<ValueString<'a>> {
    Value::Value(
        values
            .into_iter()
            .map(|value| Value::Value(Cow::Owned(value)))
            .collect::<BTreeSet<_>>(),
    )
}

/// Known strings of a list or set, in iteration order
pub(crate) fn known_strings<'b, 'a: 'b, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'b ValueString<'a>>,
{
    values.into_iter().filter_map(known_string).collect()
}

/// Plan a computed attribute
///
/// On creation (no prior state), a null value becomes unknown. On update, a
/// value not given by the configuration keeps its prior value.
pub(crate) fn plan_computed<T: Clone>(planned: &mut Value<T>, prior: Option<&Value<T>>) {
    match prior {
        None => {
            if planned.is_null() {
                *planned = Value::Unknown;
            }
        }
        Some(prior) => {
            if planned.is_null() || planned.is_unknown() {
                *planned = prior.clone();
            }
        }
    }
}

/// Report an error if a known string is not one of `allowed`
pub(crate) fn check_one_of(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueString<'_>,
    allowed: &[&str],
) {
    if let Some(value) = known_str(value) {
        if !allowed.contains(&value) {
            diags.error(
                format!("Invalid value `{value}`"),
                format!(
                    "Expected one of: {}",
                    allowed.iter().map(|v| format!("`{v}`")).join_with(", ")
                ),
                attr_path,
            );
        }
    }
}

pub(crate) fn check_non_negative(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &ValueNumber,
) {
    if let Value::Value(value) = value {
        if *value < 0 {
            diags.error_short(format!("`{value}` must not be negative"), attr_path);
        }
    }
}

/// Report an error if `value` is known but `condition` does not hold
pub(crate) fn check_requires<T>(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &Value<T>,
    condition: bool,
    reason: &'static str,
) {
    if matches!(value, Value::Value(_)) && !condition {
        diags.error("Invalid attribute combination", reason, attr_path);
    }
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}
