// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element property data types.
//!
//! These mirror the keyed record format exchanged with the host application:
//! field names are camelCase on the wire and property values are untagged
//! JSON scalars or number arrays.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable external identifier of a BIM element.
pub type ExpressId = u32;

/// Linked element ids grouped by the property that links them.
pub type Links = BTreeMap<String, Vec<ExpressId>>;

/// A property value as found in an IFC property set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    NumberList(Vec<f64>),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(value) => write!(f, "{value}"),
            PropertyValue::Number(value) => write!(f, "{value}"),
            PropertyValue::NumberList(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
            PropertyValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(values: Vec<f64>) -> Self {
        PropertyValue::NumberList(values)
    }
}

/// A single named property, optionally carrying a value.
///
/// Used both for element data and as a search pattern, where an empty name or
/// a missing value acts as a wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// A pattern matching on the property name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// A pattern matching on the property value only.
    pub fn valued(value: impl Into<PropertyValue>) -> Self {
        Self {
            name: String::new(),
            value: Some(value.into()),
        }
    }
}

/// A named group of properties (IfcPropertySet).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl PropertySet {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: Some(name.into()),
            properties,
        }
    }
}

/// IFC tag attribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Property data of one element, keyed by its express id.
///
/// `properties` and `values` distinguish "absent" from "empty": an element
/// whose property sets were never loaded does not match any property search,
/// while one with an empty list still matches a type-only search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    pub express_id: ExpressId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Tag>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ifc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PropertySet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, PropertyValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_visible: Option<bool>,
}

impl ElementData {
    pub fn new(express_id: ExpressId) -> Self {
        Self {
            express_id,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, ifc_type: impl Into<String>) -> Self {
        self.ifc_type = Some(ifc_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Appends a property set, creating the property list if needed.
    pub fn with_property_set(mut self, set: PropertySet) -> Self {
        self.properties.get_or_insert_with(Vec::new).push(set);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.values
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn is_selectable(&self) -> bool {
        self.selectable.unwrap_or(false)
    }

    #[inline]
    pub fn is_always_visible(&self) -> bool {
        self.always_visible.unwrap_or(false)
    }

    /// Whether the element carries property sets or flat values.
    #[inline]
    pub fn has_data(&self) -> bool {
        self.properties.is_some() || self.values.is_some()
    }

    /// All express ids this element links to, across every link property.
    pub fn linked_ids(&self) -> impl Iterator<Item = ExpressId> + '_ {
        self.links
            .iter()
            .flat_map(|links| links.values())
            .flat_map(|ids| ids.iter().copied())
    }

    /// Overwrites every field that `other` sets. The express id is kept.
    pub fn merge_from(&mut self, other: ElementData) {
        let ElementData {
            express_id: _,
            tag,
            ifc_type,
            name,
            properties,
            links,
            values,
            selectable,
            always_visible,
        } = other;

        if tag.is_some() {
            self.tag = tag;
        }
        if ifc_type.is_some() {
            self.ifc_type = ifc_type;
        }
        if name.is_some() {
            self.name = name;
        }
        if properties.is_some() {
            self.properties = properties;
        }
        if links.is_some() {
            self.links = links;
        }
        if values.is_some() {
            self.values = values;
        }
        if selectable.is_some() {
            self.selectable = selectable;
        }
        if always_visible.is_some() {
            self.always_visible = always_visible;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_display_matches_host_formatting() {
        assert_eq!(PropertyValue::Number(3.0).to_string(), "3");
        assert_eq!(PropertyValue::Number(2.5).to_string(), "2.5");
        assert_eq!(PropertyValue::Bool(true).to_string(), "true");
        assert_eq!(
            PropertyValue::NumberList(vec![1.0, 2.5, 3.0]).to_string(),
            "1,2.5,3"
        );
        assert_eq!(PropertyValue::from("Wall").to_string(), "Wall");
    }

    #[test]
    fn untagged_values_deserialize() {
        let json = r#"{"a": true, "b": 4.5, "c": [1, 2], "d": "text"}"#;
        let values: BTreeMap<String, PropertyValue> = serde_json::from_str(json).unwrap();
        assert_eq!(values["a"], PropertyValue::Bool(true));
        assert_eq!(values["b"], PropertyValue::Number(4.5));
        assert_eq!(values["c"], PropertyValue::NumberList(vec![1.0, 2.0]));
        assert_eq!(values["d"], PropertyValue::Text("text".to_string()));
    }

    #[test]
    fn element_data_uses_camel_case_fields() {
        let json = r#"{
            "expressId": 42,
            "type": "IFCWALL",
            "alwaysVisible": true,
            "properties": [{"name": "Pset_WallCommon", "properties": [{"name": "IsExternal", "value": true}]}]
        }"#;
        let data: ElementData = serde_json::from_str(json).unwrap();
        assert_eq!(data.express_id, 42);
        assert_eq!(data.ifc_type.as_deref(), Some("IFCWALL"));
        assert!(data.is_always_visible());
        assert!(!data.is_selectable());
        assert!(data.has_data());

        let back = serde_json::to_value(&data).unwrap();
        assert_eq!(back["expressId"], 42);
        assert!(back.get("selectable").is_none());
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut data = ElementData::new(7).with_name("Door").with_type("IFCDOOR");
        data.merge_from(ElementData {
            selectable: Some(true),
            ..ElementData::new(99)
        });

        assert_eq!(data.express_id, 7);
        assert_eq!(data.name.as_deref(), Some("Door"));
        assert!(data.is_selectable());
    }

    #[test]
    fn linked_ids_flatten_all_link_properties() {
        let mut links = Links::new();
        links.insert("Room".to_string(), vec![1, 2]);
        links.insert("System".to_string(), vec![3]);
        let data = ElementData {
            links: Some(links),
            ..ElementData::new(10)
        };

        let ids: Vec<_> = data.linked_ids().collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
