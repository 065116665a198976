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

use tf_provider::{
    schema::Attribute, schema::AttributeConstraint, schema::AttributeType, schema::Description,
    schema::Schema,
};

pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &'static str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub(crate) fn required(attr_type: AttributeType, description: &'static str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Required, description)
}

pub(crate) fn optional(attr_type: AttributeType, description: &'static str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Optional, description)
}

pub(crate) fn optional_computed(attr_type: AttributeType, description: &'static str) -> Attribute {
    attribute(
        attr_type,
        AttributeConstraint::OptionalComputed,
        description,
    )
}

pub(crate) fn computed(attr_type: AttributeType, description: &'static str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Computed, description)
}

pub(crate) fn sensitive(attribute: Attribute) -> Attribute {
    Attribute {
        sensitive: true,
        ..attribute
    }
}

/// `id` attribute shared by every resource
pub(crate) fn id(description: &'static str) -> Attribute {
    computed(AttributeType::String, description)
}

pub(crate) fn string_list() -> AttributeType {
    AttributeType::List(AttributeType::String.into())
}

pub(crate) fn string_set() -> AttributeType {
    AttributeType::Set(AttributeType::String.into())
}

/// Derive the schema of a data source from the schema of its resource
///
/// `keys` become required, every other attribute is computed.
pub(crate) fn data_source_schema(mut schema: Schema, keys: &[&str]) -> Schema {
    for (name, attribute) in schema.block.attributes.iter_mut() {
        attribute.constraint = if keys.contains(&name.as_str()) {
            AttributeConstraint::Required
        } else {
            AttributeConstraint::Computed
        };
    }
    schema
}

#[cfg(test)]
mod tests {
    use tf_provider::{map, schema::Block};

    use super::*;

    #[test]
    fn data_sources_only_require_keys() {
        let schema = Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => id("ID"),
                    "project_id" => required(AttributeType::Number, "Project"),
                    "name" => required(AttributeType::String, "Name"),
                    "password" => sensitive(optional(AttributeType::String, "Password")),
                },
                ..Default::default()
            },
        };

        let schema = data_source_schema(schema, &["project_id"]);
        let attributes = &schema.block.attributes;
        assert!(matches!(
            attributes["project_id"].constraint,
            AttributeConstraint::Required
        ));
        assert!(matches!(
            attributes["name"].constraint,
            AttributeConstraint::Computed
        ));
        assert!(matches!(
            attributes["id"].constraint,
            AttributeConstraint::Computed
        ));
        assert!(attributes["password"].sensitive);
    }
}
