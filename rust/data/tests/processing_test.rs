// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end requirement processing over a small door/space model.

use ifc_lite_data::{
    process_elements, ElementData, LinkRequirement, ProcessRequest, Property, PropertyRecords,
    PropertySet, Requirements, SelectableRequirements,
};

/// Two rooms, two doors and a wall. Door 10 opens into room 1, door 11 into
/// room 2 which is not a bedroom.
fn model() -> Vec<ElementData> {
    let space = |id, room: &str, usage: &str| {
        ElementData::new(id).with_type("IFCSPACE").with_property_set(PropertySet::new(
            "Pset_SpaceCommon",
            vec![Property::new("RoomNumber", room), Property::new("Usage", usage)],
        ))
    };
    let door = |id, room: &str| {
        ElementData::new(id).with_type("IFCDOOR").with_property_set(PropertySet::new(
            "Pset_DoorCommon",
            vec![Property::new("RoomNumber", room), Property::new("FireExit", false)],
        ))
    };

    vec![
        space(1, "A-101", "Bedroom"),
        space(2, "A-102", "Kitchen"),
        door(10, "A-101"),
        door(11, "A-102"),
        ElementData::new(20).with_type("IFCWALL").with_property_set(PropertySet::new(
            "Pset_WallCommon",
            vec![Property::new("LoadBearing", true)],
        )),
    ]
}

fn request() -> ProcessRequest {
    ProcessRequest {
        link_requirements: Some(vec![LinkRequirement::new("RoomNumber")]),
        selectable_requirements: Some(vec![SelectableRequirements {
            requirements: Requirements::of_type("IFCDOOR"),
            link_requirements: Some(
                Requirements::of_type("IFCSPACE").and_property(Property::new("Usage", "bedroom")),
            ),
        }]),
        always_visible_requirements: Some(vec![Requirements::with_properties(vec![
            Property::named("LoadBearing"),
        ])]),
        batch_size: Some(2),
    }
}

#[test]
fn links_selectable_and_always_visible_are_computed() {
    let mut elements = model();
    let mut reports = Vec::new();
    process_elements(&mut elements, &request(), |p| reports.push((p.processed, p.total))).unwrap();

    assert_eq!(reports, vec![(2, 5), (4, 5), (5, 5)]);

    let by_id = PropertyRecords::from_elements(elements).unwrap();

    let door_10 = by_id.get(10).unwrap();
    assert_eq!(door_10.links.as_ref().unwrap()["RoomNumber"], vec![1]);
    assert!(door_10.is_selectable());

    let door_11 = by_id.get(11).unwrap();
    assert_eq!(door_11.links.as_ref().unwrap()["RoomNumber"], vec![2]);
    assert!(!door_11.is_selectable());

    // the room links back to its door
    assert_eq!(by_id.get(1).unwrap().links.as_ref().unwrap()["RoomNumber"], vec![10]);

    let wall = by_id.get(20).unwrap();
    assert!(wall.links.as_ref().unwrap().is_empty());
    assert!(wall.is_always_visible());
    assert!(!wall.is_selectable());
    assert!(!by_id.get(1).unwrap().is_always_visible());
}

#[test]
fn processing_is_deterministic() {
    let mut first = model();
    let mut second = model();
    process_elements(&mut first, &request(), |_| {}).unwrap();
    process_elements(&mut second, &request(), |_| {}).unwrap();
    assert_eq!(first, second);
}

#[test]
fn request_deserializes_from_host_json() {
    let json = r#"{
        "linkRequirements": [{"name": "RoomNumber"}],
        "selectableRequirements": [{"type": "IFCDOOR"}],
        "batchSize": 50
    }"#;
    let request: ProcessRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.batch_size, Some(50));
    assert!(request.always_visible_requirements.is_none());

    let mut elements = model();
    process_elements(&mut elements, &request, |_| {}).unwrap();
    let selectable: Vec<_> = elements
        .iter()
        .filter(|d| d.is_selectable())
        .map(|d| d.express_id)
        .collect();
    assert_eq!(selectable, vec![10, 11]);
}
