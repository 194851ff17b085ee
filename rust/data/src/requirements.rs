// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Requirement descriptors consumed by the processor.

use serde::{Deserialize, Serialize};

use crate::types::Property;

/// Type and property constraints an element must meet.
///
/// An empty requirement is satisfied by every element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub required_type: Option<String>,
    #[serde(default, rename = "properties", skip_serializing_if = "Option::is_none")]
    pub required_properties: Option<Vec<Property>>,
}

impl Requirements {
    pub fn of_type(ifc_type: impl Into<String>) -> Self {
        Self {
            required_type: Some(ifc_type.into()),
            required_properties: None,
        }
    }

    pub fn with_properties(properties: Vec<Property>) -> Self {
        Self {
            required_type: None,
            required_properties: Some(properties),
        }
    }

    pub fn and_property(mut self, property: Property) -> Self {
        self.required_properties
            .get_or_insert_with(Vec::new)
            .push(property);
        self
    }
}

/// Requirements that mark an element as selectable.
///
/// When `link_requirements` is set, the element additionally needs at least
/// one linked element satisfying them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableRequirements {
    #[serde(flatten)]
    pub requirements: Requirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_requirements: Option<Requirements>,
}

impl From<Requirements> for SelectableRequirements {
    fn from(requirements: Requirements) -> Self {
        Self {
            requirements,
            link_requirements: None,
        }
    }
}

/// Links elements sharing the value of `link_property_name`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkRequirement {
    #[serde(rename = "name")]
    pub link_property_name: String,
    #[serde(flatten)]
    pub requirements: Requirements,
}

impl LinkRequirement {
    pub fn new(link_property_name: impl Into<String>) -> Self {
        Self {
            link_property_name: link_property_name.into(),
            requirements: Requirements::default(),
        }
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_requirement_wire_format() {
        let json = r#"{"name": "Room", "type": "IFCSPACE", "properties": [{"name": "Zone"}]}"#;
        let link: LinkRequirement = serde_json::from_str(json).unwrap();
        assert_eq!(link.link_property_name, "Room");
        assert_eq!(link.requirements.required_type.as_deref(), Some("IFCSPACE"));
        assert_eq!(
            link.requirements.required_properties,
            Some(vec![Property::named("Zone")])
        );
    }

    #[test]
    fn selectable_requirements_flatten_base() {
        let json = r#"{"type": "IFCDOOR", "linkRequirements": {"type": "IFCSPACE"}}"#;
        let selectable: SelectableRequirements = serde_json::from_str(json).unwrap();
        assert_eq!(
            selectable.requirements.required_type.as_deref(),
            Some("IFCDOOR")
        );
        assert_eq!(
            selectable.link_requirements,
            Some(Requirements::of_type("IFCSPACE"))
        );
    }
}
