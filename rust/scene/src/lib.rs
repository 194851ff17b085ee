// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Lite Scene
//!
//! Instanced scene core for IFC viewers.
//!
//! Every placed occurrence of a mesh lives in exactly one
//! [`InstancedBuffer`], pooled by `(state, geometry, material)`. Changing how
//! an occurrence is drawn (hover, selection, ghosting, hiding) moves it
//! between pools with a swap-remove, so each buffer stays dense and can be
//! uploaded as one instanced draw call.
//!
//! - [`ElementRegistry`] owns elements, their instance records and the pools.
//! - [`SpatialQuery`] derives bounding spheres for the camera.
//! - [`PointerResolver`] turns pointer positions into element hits.
//! - [`ViewerState`] ties them to selection, hover and view modes.

pub mod bounds;
pub mod buffer;
pub mod camera;
pub mod config;
pub mod element;
pub mod error;
pub mod index;
pub mod keys;
pub mod picking;
pub mod registry;
pub mod resources;
pub mod spatial;
pub mod viewer;

pub use nalgebra::{Matrix4, Point2, Point3, Vector3};

pub use bounds::{Aabb, Sphere};
pub use buffer::{InstancedBuffer, FLOATS_PER_INSTANCE};
pub use camera::{Camera, Ray};
pub use config::ViewerConfig;
pub use element::{Element, InstanceRecord};
pub use error::{Error, Result};
pub use index::InstanceIndex;
pub use keys::{BufferKey, ElementKey, InstanceHandle, InstanceState, RecordKey};
pub use picking::{pointer_to_ndc, PointerHit, PointerResolver, PointerTracker, SelectionFilter};
pub use registry::{Alignment, ElementRegistry, PoolKey};
pub use resources::{
    geometry_id, material_id, Color, GeometryId, GeometryResource, MaterialId, MaterialResource,
    StatePalette, LOADER_TRANSLUCENT_OPACITY,
};
pub use spatial::{
    fit_camera_to_sphere, focus_camera_on, minimum_camera_distance, move_camera_to, SpatialQuery,
};
pub use viewer::{
    LoadTicket, LoadingProgress, LoadingStatus, Selection, SubscriptionId, ViewMode, ViewerEvent,
    ViewerState,
};
