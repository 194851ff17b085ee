// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Case-insensitive property matching.
//!
//! A pattern [`Property`] with only a name matches any property whose name
//! *contains* it. A pattern with only a value matches any property whose
//! value *equals* it. With both, both must hold on the same property.
//! Values compare through their display form, so `3` matches `"3"`.

use crate::requirements::Requirements;
use crate::types::{ElementData, Property, PropertyValue};

fn normalize(text: &str) -> String {
    text.to_lowercase()
}

/// Empty names and empty text values count as absent.
fn pattern_name(pattern: &Property) -> Option<String> {
    (!pattern.name.is_empty()).then(|| normalize(&pattern.name))
}

fn pattern_value(pattern: &Property) -> Option<String> {
    match &pattern.value {
        None => None,
        Some(PropertyValue::Text(text)) if text.is_empty() => None,
        Some(value) => Some(normalize(&value.to_string())),
    }
}

/// Returns the first property named `name` (case-insensitive, exact).
pub fn find_property_value<'a>(data: &'a ElementData, name: &str) -> Option<&'a PropertyValue> {
    let wanted = normalize(name);
    data.properties
        .iter()
        .flatten()
        .flat_map(|set| set.properties.iter())
        .find(|property| normalize(&property.name) == wanted)
        .and_then(|property| property.value.as_ref())
}

/// Whether any property of `data` matches `pattern`.
///
/// Elements without property sets and patterns with neither a name nor a
/// value never match.
pub fn match_property(data: &ElementData, pattern: &Property) -> bool {
    let Some(sets) = data.properties.as_ref() else {
        return false;
    };
    let name = pattern_name(pattern);
    let value = pattern_value(pattern);
    if name.is_none() && value.is_none() {
        return false;
    }

    sets.iter()
        .flat_map(|set| set.properties.iter())
        .any(|property| {
            let name_ok = name
                .as_deref()
                .map_or(true, |name| normalize(&property.name).contains(name));
            let value_ok = value
                .as_deref()
                .map_or(true, |value| {
                    property
                        .value
                        .as_ref()
                        .is_some_and(|actual| normalize(&actual.to_string()) == value)
                });
            name_ok && value_ok
        })
}

/// Whether `data` has property sets, the given type (if any) and matches
/// every pattern.
pub fn match_properties_and_type(
    data: &ElementData,
    patterns: &[Property],
    ifc_type: Option<&str>,
) -> bool {
    if data.properties.is_none() {
        return false;
    }
    if let Some(ifc_type) = ifc_type.filter(|t| !t.is_empty()) {
        if data.ifc_type.as_deref() != Some(ifc_type) {
            return false;
        }
    }
    patterns.iter().all(|pattern| match_property(data, pattern))
}

/// All elements matching the patterns and type, in input order.
pub fn filter_by_properties_and_type<'a>(
    elements: &'a [ElementData],
    patterns: &[Property],
    ifc_type: Option<&str>,
) -> Vec<&'a ElementData> {
    elements
        .iter()
        .filter(|data| match_properties_and_type(data, patterns, ifc_type))
        .collect()
}

/// Whether `data` satisfies `requirements`. `None` is always satisfied.
pub fn satisfies_requirements(data: &ElementData, requirements: Option<&Requirements>) -> bool {
    let Some(requirements) = requirements else {
        return true;
    };

    if let Some(required) = requirements.required_type.as_deref().filter(|t| !t.is_empty()) {
        if data.ifc_type.as_deref() != Some(required) {
            return false;
        }
    }

    match requirements.required_properties.as_deref() {
        None | Some([]) => true,
        Some(patterns) => match_properties_and_type(data, patterns, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertySet;

    fn wall() -> ElementData {
        ElementData::new(1).with_type("IFCWALL").with_property_set(PropertySet::new(
            "Pset_WallCommon",
            vec![
                Property::new("IsExternal", true),
                Property::new("FireRating", "REI60"),
                Property::new("Width", 0.3),
            ],
        ))
    }

    #[test]
    fn name_only_matches_by_substring() {
        let data = wall();
        assert!(match_property(&data, &Property::named("fire")));
        assert!(match_property(&data, &Property::named("ISEXTERNAL")));
        assert!(!match_property(&data, &Property::named("Height")));
    }

    #[test]
    fn value_only_matches_exactly() {
        let data = wall();
        assert!(match_property(&data, &Property::valued("rei60")));
        assert!(!match_property(&data, &Property::valued("REI")));
        assert!(match_property(&data, &Property::valued(true)));
        assert!(match_property(&data, &Property::valued("0.3")));
    }

    #[test]
    fn name_and_value_must_match_same_property() {
        let data = wall();
        assert!(match_property(&data, &Property::new("Rating", "REI60")));
        assert!(!match_property(&data, &Property::new("IsExternal", "REI60")));
    }

    #[test]
    fn empty_pattern_never_matches() {
        assert!(!match_property(&wall(), &Property::named("")));
    }

    #[test]
    fn element_without_properties_never_matches() {
        let data = ElementData::new(2).with_type("IFCWALL");
        assert!(!match_properties_and_type(&data, &[], Some("IFCWALL")));
        assert!(find_property_value(&data, "IsExternal").is_none());
    }

    #[test]
    fn type_filter_is_exact() {
        let data = wall();
        assert!(match_properties_and_type(&data, &[], Some("IFCWALL")));
        assert!(!match_properties_and_type(&data, &[], Some("IFCWALLSTANDARDCASE")));
    }

    #[test]
    fn requirements_without_properties_check_type_only() {
        let bare = ElementData::new(3).with_type("IFCDOOR");
        assert!(satisfies_requirements(&bare, None));
        assert!(satisfies_requirements(&bare, Some(&Requirements::of_type("IFCDOOR"))));
        assert!(!satisfies_requirements(&bare, Some(&Requirements::of_type("IFCWALL"))));

        let with_props = Requirements::with_properties(vec![Property::named("FireRating")]);
        assert!(!satisfies_requirements(&bare, Some(&with_props)));
        assert!(satisfies_requirements(&wall(), Some(&with_props)));
    }

    #[test]
    fn find_property_value_is_case_insensitive() {
        let data = wall();
        assert_eq!(
            find_property_value(&data, "firerating"),
            Some(&PropertyValue::from("REI60"))
        );
    }

    #[test]
    fn filter_keeps_input_order() {
        let elements = vec![wall(), ElementData::new(5), {
            let mut other = wall();
            other.express_id = 9;
            other
        }];
        let found = filter_by_properties_and_type(&elements, &[Property::named("Width")], None);
        let ids: Vec<_> = found.iter().map(|d| d.express_id).collect();
        assert_eq!(ids, vec![1, 9]);
    }
}
