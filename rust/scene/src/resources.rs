// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared geometry and material resources.
//!
//! Resources are deduplicated by content-derived ids and shared as `Arc`s by
//! every buffer that draws them. They are immutable once registered; the
//! only derived state is the geometry's local bounding box, computed on first
//! use.

use std::sync::OnceLock;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::keys::InstanceState;

/// Content id of a geometry: `"<express id>T"` or `"<express id>O"`.
pub type GeometryId = String;

/// Content id of a material: `"r-g-b-T"` or `"r-g-b-O"`.
pub type MaterialId = String;

/// Opacity given to translucent materials coming from the loader.
pub const LOADER_TRANSLUCENT_OPACITY: f32 = 0.5;

/// Builds the geometry id, separating transparent and opaque variants of the
/// same shape.
pub fn geometry_id(geometry_express_id: u32, transparent: bool) -> GeometryId {
    format!("{}{}", geometry_express_id, if transparent { 'T' } else { 'O' })
}

/// Builds the material id from linear RGB components.
pub fn material_id(r: f64, g: f64, b: f64, transparent: bool) -> MaterialId {
    format!("{}-{}-{}-{}", r, g, b, if transparent { 'T' } else { 'O' })
}

/// Triangle mesh with positions, normals and indices.
#[derive(Debug, Default)]
pub struct GeometryResource {
    positions: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
    bounds: OnceLock<Aabb>,
}

impl GeometryResource {
    pub fn new(positions: Vec<f32>, normals: Vec<f32>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals,
            indices,
            bounds: OnceLock::new(),
        }
    }

    /// Splits interleaved `[px, py, pz, nx, ny, nz]` vertex data.
    pub fn from_interleaved(vertex_data: &[f32], indices: Vec<u32>) -> Self {
        let vertex_count = vertex_data.len() / 6;
        let mut positions = Vec::with_capacity(vertex_count * 3);
        let mut normals = Vec::with_capacity(vertex_count * 3);
        for vertex in vertex_data.chunks_exact(6) {
            positions.extend_from_slice(&vertex[0..3]);
            normals.extend_from_slice(&vertex[3..6]);
        }
        Self::new(positions, normals, indices)
    }

    #[inline]
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    #[inline]
    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Local bounding box, cached on first call.
    pub fn local_bounds(&self) -> Aabb {
        *self
            .bounds
            .get_or_init(|| Aabb::from_positions(&self.positions))
    }

    fn vertex(&self, index: u32) -> Option<Point3<f32>> {
        let i = index as usize * 3;
        let p = self.positions.get(i..i + 3)?;
        Some(Point3::new(p[0], p[1], p[2]))
    }

    /// Triangles in local space. Triangles with out-of-range indices are
    /// skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            Some([self.vertex(tri[0])?, self.vertex(tri[1])?, self.vertex(tri[2])?])
        })
    }
}

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `0xRRGGBB`.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(&self) -> u32 {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

/// Surface appearance of a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialResource {
    pub color: Color,
    pub emissive: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub polygon_offset: bool,
    pub render_order: i32,
}

impl Default for MaterialResource {
    fn default() -> Self {
        Self {
            color: Color::new(1.0, 1.0, 1.0),
            emissive: Color::BLACK,
            opacity: 1.0,
            transparent: false,
            depth_test: true,
            depth_write: true,
            polygon_offset: false,
            render_order: 0,
        }
    }
}

impl MaterialResource {
    /// Material as produced by the loader. Any alpha other than 1 makes it
    /// translucent, drawn with a polygon offset and no depth writes.
    pub fn from_rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        let transparent = a != 1.0;
        Self {
            color: Color::new(r, g, b),
            opacity: if transparent { LOADER_TRANSLUCENT_OPACITY } else { 1.0 },
            transparent,
            depth_write: !transparent,
            polygon_offset: transparent,
            ..Self::default()
        }
    }

    /// Opaque highlight drawn over everything else.
    pub fn highlighted(&self, color: Color) -> Self {
        Self {
            color,
            emissive: color,
            opacity: 1.0,
            transparent: false,
            depth_test: false,
            depth_write: true,
            polygon_offset: false,
            render_order: 1,
        }
    }

    /// Ghosted copy of this material.
    pub fn ghosted(&self, opacity: f32) -> Self {
        Self {
            opacity,
            transparent: true,
            depth_test: false,
            depth_write: false,
            render_order: 0,
            ..self.clone()
        }
    }
}

/// Colors and opacity used to derive per-state materials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatePalette {
    pub hover_color: Color,
    pub selected_color: Color,
    pub transparent_opacity: f32,
}

impl Default for StatePalette {
    fn default() -> Self {
        Self {
            hover_color: Color::from_hex(0xff9800),
            selected_color: Color::from_hex(0x00b4d8),
            transparent_opacity: 0.3,
        }
    }
}

impl StatePalette {
    /// Material for `state` derived from the base material. `Default` and
    /// `Hidden` return the base unchanged.
    pub fn resolve(&self, state: InstanceState, base: &MaterialResource) -> MaterialResource {
        match state {
            InstanceState::Hovered => base.highlighted(self.hover_color),
            InstanceState::Selected => base.highlighted(self.selected_color),
            InstanceState::Transparent => base.ghosted(self.transparent_opacity),
            InstanceState::Default | InstanceState::Hidden => base.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn content_ids() {
        assert_eq!(geometry_id(118, true), "118T");
        assert_eq!(geometry_id(7, false), "7O");
        assert_eq!(material_id(0.5, 0.25, 1.0, false), "0.5-0.25-1-O");
    }

    #[test]
    fn interleaved_split() {
        let data = [
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            0.0, 2.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let geometry = GeometryResource::from_interleaved(&data, vec![0, 1, 2]);
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.normals()[2], 1.0);
        assert_eq!(geometry.local_bounds().max, Point3::new(1.0, 2.0, 0.0));
        assert_eq!(geometry.triangles().count(), 1);
    }

    #[test]
    fn out_of_range_triangles_are_skipped() {
        let geometry = GeometryResource::new(vec![0.0; 9], vec![], vec![0, 1, 2, 0, 1, 9]);
        assert_eq!(geometry.triangles().count(), 1);
    }

    #[test]
    fn hex_round_trip() {
        let color = Color::from_hex(0xff9800);
        assert_relative_eq!(color.r, 1.0);
        assert_eq!(color.to_hex(), 0xff9800);
    }

    #[test]
    fn state_materials() {
        let base = MaterialResource::from_rgba(0.2, 0.4, 0.6, 1.0);
        let palette = StatePalette::default();

        let selected = palette.resolve(InstanceState::Selected, &base);
        assert_eq!(selected.color, palette.selected_color);
        assert_eq!(selected.emissive, palette.selected_color);
        assert!(!selected.depth_test);
        assert_eq!(selected.render_order, 1);

        let ghost = palette.resolve(InstanceState::Transparent, &base);
        assert!(ghost.transparent);
        assert!(!ghost.depth_write);
        assert_relative_eq!(ghost.opacity, 0.3);
        assert_eq!(ghost.color, base.color);

        assert_eq!(palette.resolve(InstanceState::Default, &base), base);
    }

    #[test]
    fn translucent_loader_material() {
        let material = MaterialResource::from_rgba(1.0, 1.0, 1.0, 0.4);
        assert!(material.transparent);
        assert!(material.polygon_offset);
        assert!(!material.depth_write);
        assert_relative_eq!(material.opacity, LOADER_TRANSLUCENT_OPACITY);
    }
}
