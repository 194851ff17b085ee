// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-Lite WebAssembly Bindings
//!
//! JavaScript/TypeScript API over the instanced scene core: a loader stages
//! geometries, materials, elements and instances, and the renderer reads
//! back one instanced mesh per pool.

use wasm_bindgen::prelude::*;

#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

mod meshes;
mod staging;
mod utils;
mod viewer;

pub use meshes::{GeometryJs, InstancedMeshJs, PointerHitJs};
pub use staging::{PendingModel, StagingError};
pub use utils::set_panic_hook as init_panic_hook;
pub use viewer::IfcViewer;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the version of IFC-Lite
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Linear memory, for building views over `transformsPtr`.
#[wasm_bindgen(js_name = getMemory)]
pub fn get_memory() -> JsValue {
    wasm_bindgen::memory()
}
