// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Browser tests for the JavaScript API. Run with `wasm-pack test --headless`.

#![cfg(target_arch = "wasm32")]

use ifc_lite_wasm::{version, IfcViewer};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

fn loaded() -> IfcViewer {
    let mut viewer = IfcViewer::new(JsValue::UNDEFINED).unwrap();
    let load = viewer.begin_load();
    let geometry = viewer
        .add_geometry(
            load,
            5,
            false,
            vec![-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, 1.0, 0.0],
            vec![],
            vec![0, 1, 2],
        )
        .unwrap();
    let material = viewer.add_material(load, 0.2, 0.4, 0.6, 1.0).unwrap();
    viewer
        .add_instance(load, 300, &geometry, &material, &IDENTITY)
        .unwrap();
    viewer.finish_load(load).unwrap();
    viewer
}

#[wasm_bindgen_test]
fn version_is_set() {
    assert!(!version().is_empty());
}

#[wasm_bindgen_test]
fn load_exposes_one_mesh() {
    let mut viewer = loaded();
    assert_eq!(viewer.instance_count(), 1);
    let meshes = viewer.get_all_meshes().unwrap();
    assert_eq!(meshes.length(), 1);
    assert!(viewer.get_geometry("5O").is_some());
}

#[wasm_bindgen_test]
fn stale_load_is_rejected() {
    let mut viewer = IfcViewer::new(JsValue::UNDEFINED).unwrap();
    let first = viewer.begin_load();
    let second = viewer.begin_load();
    assert!(viewer.add_material(first, 1.0, 1.0, 1.0, 1.0).is_err());
    assert!(viewer.finish_load(first).is_err());
    assert!(viewer.finish_load(second).is_ok());
}

#[wasm_bindgen_test]
fn selection_round_trips_through_express_ids() {
    let mut viewer = loaded();
    assert_eq!(viewer.select_by_express_id(Some(300)).unwrap(), Some(300));
    assert_eq!(viewer.selected_express_id(), Some(300));
    assert_eq!(viewer.select_by_express_id(None).unwrap(), None);
    assert_eq!(viewer.selected_express_id(), None);
}
