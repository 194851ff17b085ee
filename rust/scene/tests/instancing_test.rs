// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pooling behaviour of the registry across state changes.

use std::sync::Arc;

use ifc_lite_data::ElementData;
use ifc_lite_scene::{
    ElementRegistry, GeometryResource, InstanceHandle, InstanceState, InstancedBuffer,
    MaterialResource, Matrix4, SpatialQuery, Vector3,
};

fn cube() -> GeometryResource {
    let positions = vec![
        -0.5, -0.5, -0.5, 0.5, -0.5, -0.5, 0.5, 0.5, -0.5, -0.5, 0.5, -0.5, //
        -0.5, -0.5, 0.5, 0.5, -0.5, 0.5, 0.5, 0.5, 0.5, -0.5, 0.5, 0.5,
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, 4, 6, 5, 4, 7, 6, 0, 4, 5, 0, 5, 1, //
        2, 6, 7, 2, 7, 3, 0, 3, 7, 0, 7, 4, 1, 5, 6, 1, 6, 2,
    ];
    GeometryResource::new(positions, vec![], indices)
}

fn translation(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::new_translation(&Vector3::new(x, y, z))
}

fn registry() -> ElementRegistry {
    let mut registry = ElementRegistry::new();
    registry.set_geometry("7O", cube());
    registry.set_material("0.5-0.5-0.5-O", MaterialResource::from_rgba(0.5, 0.5, 0.5, 1.0));
    registry
}

fn bits(matrix: &Matrix4<f32>) -> Vec<u32> {
    matrix.iter().map(|v| v.to_bits()).collect()
}

#[test]
fn full_buffer_doubles_and_keeps_matrices() {
    let mut buffer = InstancedBuffer::new(
        InstanceState::Default,
        "7O".into(),
        "m".into(),
        Arc::new(cube()),
        Arc::new(MaterialResource::default()),
        1,
    );
    let a = translation(1.0, 0.0, 0.0);
    let b = translation(0.0, 2.0, 0.0);

    assert_eq!(buffer.allocate(&a), 0);
    assert_eq!(buffer.allocate(&b), 1);

    assert_eq!(buffer.capacity(), 2);
    assert_eq!(buffer.count(), 2);
    assert_eq!(buffer.transform(0).unwrap(), a);
    assert_eq!(buffer.transform(1).unwrap(), b);
}

#[test]
fn releasing_first_slot_moves_last_record_into_it() {
    let mut registry = registry();
    let element = registry.add_element(ElementData::new(1)).unwrap();
    let records: Vec<_> = (0..3)
        .map(|i| {
            registry
                .add_instance_record(element, "7O", "0.5-0.5-0.5-O", translation(i as f32, 0.0, 0.0))
                .unwrap()
        })
        .collect();
    let (a, b, c) = (records[0], records[1], records[2]);
    let buffer = registry.record(a).unwrap().handle().unwrap().buffer;

    registry.release_record(a).unwrap();

    assert_eq!(registry.record(c).unwrap().handle(), Some(InstanceHandle::new(buffer, 0)));
    assert_eq!(registry.record(b).unwrap().handle(), Some(InstanceHandle::new(buffer, 1)));
    assert_eq!(registry.buffer(buffer).unwrap().count(), 2);
    assert_eq!(registry.buffer(buffer).unwrap().transform(0).unwrap(), translation(2.0, 0.0, 0.0));
    assert_eq!(registry.instance_record_at(InstanceHandle::new(buffer, 0)), Some(c));
    assert_eq!(registry.instance_record_at(InstanceHandle::new(buffer, 2)), None);
    assert!(registry.record(a).unwrap().handle().is_none());
    registry.check_consistency().unwrap();
}

#[test]
fn select_and_deselect_restores_slot_bit_for_bit() {
    let mut registry = registry();
    let element = registry.add_element(ElementData::new(1)).unwrap();
    let matrix = Matrix4::new_rotation(Vector3::new(0.1, 0.7, -0.3)) * translation(3.3, -1.7, 0.25);
    let record = registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", matrix)
        .unwrap();
    let original = registry.record(record).unwrap().handle().unwrap();
    let base = registry.buffer(original.buffer).unwrap().material().clone();

    registry.set_record_state(record, InstanceState::Selected).unwrap();
    let selected = registry.record(record).unwrap().handle().unwrap();
    assert_ne!(selected.buffer, original.buffer);
    assert_eq!(registry.buffer(selected.buffer).unwrap().state(), InstanceState::Selected);

    registry.set_record_state(record, InstanceState::Default).unwrap();
    let restored = registry.record(record).unwrap().handle().unwrap();
    let buffer = registry.buffer(restored.buffer).unwrap();

    assert_eq!(registry.record(record).unwrap().state(), InstanceState::Default);
    assert!(Arc::ptr_eq(buffer.material(), &base));
    assert_eq!(bits(&buffer.transform(restored.slot).unwrap()), bits(&matrix));
}

#[test]
fn repeated_state_change_is_a_no_op() {
    let mut registry = registry();
    let element = registry.add_element(ElementData::new(1)).unwrap();
    let record = registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", Matrix4::identity())
        .unwrap();

    registry.set_record_state(record, InstanceState::Hovered).unwrap();
    let handle = registry.record(record).unwrap().handle();
    let generation = registry.generation();

    registry.set_record_state(record, InstanceState::Hovered).unwrap();
    assert_eq!(registry.record(record).unwrap().handle(), handle);
    assert_eq!(registry.generation(), generation);
    assert_eq!(registry.live_instance_count(), 1);
    registry.check_consistency().unwrap();
}

#[test]
fn hidden_records_have_no_footprint() {
    let mut registry = registry();
    let element = registry.add_element(ElementData::new(1)).unwrap();
    let matrix = translation(4.0, 5.0, 6.0);
    let record = registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", matrix)
        .unwrap();
    registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", Matrix4::identity())
        .unwrap();

    registry.hide_record(record).unwrap();
    assert_eq!(registry.live_instance_count(), 1);
    let instances: u32 = registry.all_meshes().map(|(_, b)| b.count()).sum();
    assert_eq!(instances, 1);
    assert!(registry.record(record).unwrap().handle().is_none());

    registry.set_record_to_default(record).unwrap();
    let handle = registry.record(record).unwrap().handle().unwrap();
    let restored = registry.buffer(handle.buffer).unwrap().transform(handle.slot).unwrap();
    assert_eq!(bits(&restored), bits(&matrix));
    registry.check_consistency().unwrap();
}

#[test]
fn element_sphere_grows_with_instances() {
    let mut registry = registry();
    let element = registry.add_element(ElementData::new(1)).unwrap();
    registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", Matrix4::identity())
        .unwrap();
    let before = SpatialQuery::new(&registry).bounding_sphere_of_element(element);

    let far = translation(10.0, 0.0, 0.0);
    registry
        .add_instance_record(element, "7O", "0.5-0.5-0.5-O", far)
        .unwrap();
    let after = SpatialQuery::new(&registry).bounding_sphere_of_element(element);

    assert!(after.radius >= before.radius);
    let added = cube().local_bounds().transformed(&far);
    for corner in added.corners() {
        assert!(after.contains_point(&corner, 1e-4));
    }
}

/// Small deterministic generator for operation sequences.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn assert_slots_match_records(registry: &ElementRegistry) {
    registry.check_consistency().unwrap();
    for (key, record) in registry.records() {
        let element = registry.element(record.element()).unwrap();
        assert!(element.records().contains(&key), "{key:?} is orphaned");
        match record.handle() {
            Some(handle) => {
                let buffer = registry.buffer(handle.buffer).unwrap();
                assert!(handle.slot < buffer.count());
                assert_eq!(buffer.state(), record.state());
                assert_eq!(bits(&buffer.transform(handle.slot).unwrap()), bits(record.matrix()));
                assert_eq!(registry.instance_record_at(handle), Some(key));
            }
            None => assert_eq!(record.state(), InstanceState::Hidden),
        }
    }
}

#[test]
fn random_operation_sequences_keep_slots_consistent() {
    const STATES: [InstanceState; 5] = [
        InstanceState::Default,
        InstanceState::Hovered,
        InstanceState::Selected,
        InstanceState::Transparent,
        InstanceState::Hidden,
    ];
    const GEOMETRIES: [&str; 2] = ["7O", "8O"];

    for seed in 0..50u64 {
        let mut rng = Lcg(seed);
        let mut registry = registry();
        registry.set_geometry("8O", cube());
        let mut records = Vec::new();
        let mut next_id = 1;

        for _ in 0..400 {
            match rng.below(4) {
                0 => {
                    let element = registry.add_element(ElementData::new(next_id)).unwrap();
                    next_id += 1;
                    let geometry = GEOMETRIES[rng.below(2)];
                    let matrix = translation(rng.below(100) as f32, rng.below(7) as f32, 0.0);
                    records.push(
                        registry
                            .add_instance_record(element, geometry, "0.5-0.5-0.5-O", matrix)
                            .unwrap(),
                    );
                }
                _ if records.is_empty() => continue,
                1 => {
                    let record = records[rng.below(records.len())];
                    let state = STATES[rng.below(STATES.len())];
                    registry.set_record_state(record, state).unwrap();
                    let handle = registry.record(record).unwrap().handle();
                    registry.set_record_state(record, state).unwrap();
                    assert_eq!(registry.record(record).unwrap().handle(), handle);
                }
                2 => {
                    let record = records[rng.below(records.len())];
                    let held_slot = registry.record(record).unwrap().handle().is_some();
                    let released = registry.release_record(record);
                    if held_slot {
                        released.unwrap();
                    } else {
                        assert!(released.is_err());
                    }
                }
                _ => {
                    let record = records[rng.below(records.len())];
                    let matrix = translation(0.0, rng.below(50) as f32, rng.below(50) as f32);
                    registry.update_record_matrix(record, matrix).unwrap();
                }
            }
            assert_slots_match_records(&registry);
        }
    }
}
