// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pointer hit testing against live instance buffers.
//!
//! The resolver caches the list of buffers worth testing and refreshes it
//! only when the registry generation changes, i.e. when a buffer is created
//! or becomes empty or non-empty. Each instance is tested in its own local
//! space: a slab test against the geometry box first, then the triangles.

use nalgebra::{Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::buffer::FLOATS_PER_INSTANCE;
use crate::camera::{Camera, Ray};
use crate::error::{Error, Result};
use crate::keys::{BufferKey, ElementKey, InstanceHandle, RecordKey};
use crate::registry::ElementRegistry;

/// Which elements a pointer may hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionFilter {
    #[default]
    Everything,
    SelectableOnly,
}

/// A resolved hit. `distance` is in world units along the pointer ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerHit {
    pub element: ElementKey,
    pub record: RecordKey,
    pub distance: f32,
    pub point: Point3<f32>,
}

/// Converts a pixel position (`+y` down) to normalized device coordinates.
pub fn pointer_to_ndc(x: f32, y: f32, width: f32, height: f32) -> Point2<f32> {
    if width <= 0.0 || height <= 0.0 {
        return Point2::origin();
    }
    Point2::new(x / width * 2.0 - 1.0, -(y / height) * 2.0 + 1.0)
}

/// Entry distance of `ray` into `bounds`, 0 when the origin is inside.
pub fn ray_aabb(ray: &Ray, bounds: &Aabb) -> Option<f32> {
    if bounds.is_empty() {
        return None;
    }
    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let origin = ray.origin[axis];
        let direction = ray.direction[axis];
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);

        if direction.abs() < f32::EPSILON {
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / direction;
        let (t0, t1) = {
            let a = (lo - origin) * inv;
            let b = (hi - origin) * inv;
            if a <= b { (a, b) } else { (b, a) }
        };
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Möller–Trumbore, double sided. Returns the ray parameter of the hit.
pub fn ray_triangle(ray: &Ray, triangle: &[Point3<f32>; 3]) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let [a, b, c] = triangle;
    let edge1 = b - a;
    let edge2 = c - a;
    let p = ray.direction.cross(&edge2);
    let det = edge1.dot(&p);
    if det.abs() < EPSILON * edge1.norm() * edge2.norm() * ray.direction.norm() {
        return None;
    }

    let inv = 1.0 / det;
    let s = ray.origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = ray.direction.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&q) * inv;
    (t > 0.0).then_some(t)
}

/// Ranked hit testing with a cached target list.
#[derive(Debug, Default)]
pub struct PointerResolver {
    targets: Vec<BufferKey>,
    generation: Option<u64>,
    filter: SelectionFilter,
    instances_tested: usize,
}

impl PointerResolver {
    pub fn new(filter: SelectionFilter) -> Self {
        Self {
            targets: Vec::new(),
            generation: None,
            filter,
            instances_tested: 0,
        }
    }

    /// Instances the last resolve tested individually. Buffers whose
    /// combined bounds the ray misses contribute nothing.
    #[inline]
    pub fn instances_tested(&self) -> usize {
        self.instances_tested
    }

    #[inline]
    pub fn filter(&self) -> SelectionFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: SelectionFilter) {
        self.filter = filter;
    }

    /// Forces a target refresh on the next resolve.
    pub fn invalidate(&mut self) {
        self.generation = None;
    }

    /// Buffers tested by the last resolve.
    pub fn targets(&self) -> &[BufferKey] {
        &self.targets
    }

    fn refresh(&mut self, registry: &ElementRegistry) {
        let generation = registry.generation();
        if self.generation == Some(generation) {
            return;
        }
        self.targets.clear();
        self.targets
            .extend(registry.live_meshes().map(|(key, _)| key));
        self.generation = Some(generation);
        tracing::trace!(targets = self.targets.len(), generation, "refreshed raycast targets");
    }

    /// Hits under a pointer, nearest first.
    pub fn resolve(
        &mut self,
        pointer_ndc: Point2<f32>,
        camera: &Camera,
        registry: &ElementRegistry,
    ) -> Result<Vec<PointerHit>> {
        let ray = camera.ray_from_ndc(pointer_ndc);
        self.resolve_ray(&ray, registry)
    }

    /// The selection or hover candidate under a pointer.
    pub fn first_hit(
        &mut self,
        pointer_ndc: Point2<f32>,
        camera: &Camera,
        registry: &ElementRegistry,
    ) -> Result<Option<PointerHit>> {
        Ok(self.resolve(pointer_ndc, camera, registry)?.into_iter().next())
    }

    /// Hits along a world-space ray, nearest first, filtered.
    pub fn resolve_ray(&mut self, ray: &Ray, registry: &ElementRegistry) -> Result<Vec<PointerHit>> {
        self.refresh(registry);
        self.instances_tested = 0;

        let Some(to_model) = registry.model_transform().try_inverse() else {
            return Ok(Vec::new());
        };
        let model_ray = ray.transformed(&to_model);

        let mut raw: Vec<(InstanceHandle, f32)> = Vec::new();
        let mut tested = 0;
        for &key in &self.targets {
            let Some(buffer) = registry.buffer(key) else {
                continue;
            };
            if ray_aabb(&model_ray, &buffer.cached_bounds()).is_none() {
                continue;
            }
            tested += buffer.count() as usize;
            let geometry = buffer.geometry();
            let bounds = geometry.local_bounds();

            for (slot, transform) in buffer
                .transforms()
                .chunks_exact(FLOATS_PER_INSTANCE)
                .enumerate()
            {
                let Some(to_local) = Matrix4::from_column_slice(transform).try_inverse() else {
                    continue;
                };
                let local_ray = model_ray.transformed(&to_local);
                if ray_aabb(&local_ray, &bounds).is_none() {
                    continue;
                }
                let nearest = geometry
                    .triangles()
                    .filter_map(|triangle| ray_triangle(&local_ray, &triangle))
                    .min_by(f32::total_cmp);
                if let Some(t) = nearest {
                    raw.push((InstanceHandle::new(key, slot as u32), t));
                }
            }
        }

        self.instances_tested = tested;
        tracing::trace!(tested, candidates = raw.len(), "resolved pointer ray");
        raw.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut hits = Vec::with_capacity(raw.len());
        for (handle, distance) in raw {
            let record = registry.instance_record_at(handle).ok_or_else(|| {
                Error::InconsistentIndex(format!(
                    "hit slot {} of {:?} has no record",
                    handle.slot, handle.buffer
                ))
            })?;
            let element = registry
                .record(record)
                .ok_or(Error::InvalidRecord(record))?
                .element();
            let selectable = registry
                .element(element)
                .ok_or(Error::InvalidElement(element))?
                .is_selectable();
            if self.filter == SelectionFilter::SelectableOnly && !selectable {
                continue;
            }
            hits.push(PointerHit {
                element,
                record,
                distance,
                point: ray.at(distance),
            });
        }
        Ok(hits)
    }
}

/// Pointer gesture thresholds in pixels.
///
/// Hover is re-resolved only once the pointer has moved far enough since the
/// last resolve; a press and release within the click threshold on both axes
/// is a click.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    move_threshold: f32,
    click_threshold: f32,
    last_resolved: Option<Point2<f32>>,
    pressed: Option<Point2<f32>>,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(2.0, 8.0)
    }
}

impl PointerTracker {
    pub fn new(move_threshold: f32, click_threshold: f32) -> Self {
        Self {
            move_threshold,
            click_threshold,
            last_resolved: None,
            pressed: None,
        }
    }

    /// Returns `true` when hover should be resolved at `position`.
    pub fn pointer_move(&mut self, position: Point2<f32>) -> bool {
        let moved = match self.last_resolved {
            None => true,
            Some(last) => {
                let delta = position - last;
                delta.x.abs().max(delta.y.abs()) >= self.move_threshold
            }
        };
        if moved {
            self.last_resolved = Some(position);
        }
        moved
    }

    pub fn pointer_down(&mut self, position: Point2<f32>) {
        self.pressed = Some(position);
    }

    /// Returns `true` when the release completes a click.
    pub fn pointer_up(&mut self, position: Point2<f32>) -> bool {
        match self.pressed.take() {
            Some(origin) => {
                let delta = position - origin;
                delta.x.abs() <= self.click_threshold && delta.y.abs() <= self.click_threshold
            }
            None => false,
        }
    }

    pub fn pointer_leave(&mut self) {
        self.last_resolved = None;
        self.pressed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn unit_box() -> Aabb {
        Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn slab_entry_distance() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
        assert_relative_eq!(ray_aabb(&ray, &unit_box()).unwrap(), 9.0);

        let inside = Ray::new(Point3::origin(), Vector3::x());
        assert_eq!(ray_aabb(&inside, &unit_box()), Some(0.0));

        let miss = Ray::new(Point3::new(5.0, 0.0, 10.0), -Vector3::z());
        assert!(ray_aabb(&miss, &unit_box()).is_none());

        let behind = Ray::new(Point3::new(0.0, 0.0, 10.0), Vector3::z());
        assert!(ray_aabb(&behind, &unit_box()).is_none());
    }

    #[test]
    fn triangle_hits_both_sides() {
        let triangle = [
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let front = Ray::new(Point3::new(0.0, 0.0, 5.0), -Vector3::z());
        let back = Ray::new(Point3::new(0.0, 0.0, -3.0), Vector3::z());
        assert_relative_eq!(ray_triangle(&front, &triangle).unwrap(), 5.0);
        assert_relative_eq!(ray_triangle(&back, &triangle).unwrap(), 3.0);

        let outside = Ray::new(Point3::new(3.0, 0.0, 5.0), -Vector3::z());
        assert!(ray_triangle(&outside, &triangle).is_none());
    }

    #[test]
    fn ndc_conversion() {
        assert_eq!(pointer_to_ndc(0.0, 0.0, 200.0, 100.0), Point2::new(-1.0, 1.0));
        assert_eq!(pointer_to_ndc(100.0, 50.0, 200.0, 100.0), Point2::new(0.0, 0.0));
        assert_eq!(pointer_to_ndc(200.0, 100.0, 200.0, 100.0), Point2::new(1.0, -1.0));
    }

    #[test]
    fn tracker_thresholds() {
        let mut tracker = PointerTracker::default();
        assert!(tracker.pointer_move(Point2::new(10.0, 10.0)));
        assert!(!tracker.pointer_move(Point2::new(11.0, 10.5)));
        assert!(tracker.pointer_move(Point2::new(12.0, 10.0)));

        tracker.pointer_down(Point2::new(0.0, 0.0));
        assert!(tracker.pointer_up(Point2::new(8.0, -8.0)));
        assert!(!tracker.pointer_up(Point2::new(0.0, 0.0)));

        tracker.pointer_down(Point2::new(0.0, 0.0));
        assert!(!tracker.pointer_up(Point2::new(9.0, 0.0)));
    }

    fn panel() -> crate::resources::GeometryResource {
        crate::resources::GeometryResource::new(
            vec![-1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0, 1.0, 0.0, -1.0, 1.0, 0.0],
            vec![],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Ten panels clustered at the origin in one buffer, one panel at
    /// x = 50 in another.
    fn clustered() -> ElementRegistry {
        let mut registry = ElementRegistry::new();
        registry.set_geometry("1O", panel());
        registry.set_geometry("2O", panel());
        registry.set_material("m", crate::resources::MaterialResource::default());
        for i in 0..10u32 {
            let element = registry
                .add_element(ifc_lite_data::ElementData::new(i + 1))
                .unwrap();
            let offset = Matrix4::new_translation(&Vector3::new(i as f32 * 0.1, 0.0, 0.0));
            registry.add_instance_record(element, "1O", "m", offset).unwrap();
        }
        let far = registry
            .add_element(ifc_lite_data::ElementData::new(100))
            .unwrap();
        registry
            .add_instance_record(far, "2O", "m", Matrix4::new_translation(&Vector3::new(50.0, 0.0, 0.0)))
            .unwrap();
        registry
    }

    #[test]
    fn buffers_missed_by_the_ray_are_skipped() {
        let registry = clustered();
        let mut resolver = PointerResolver::new(SelectionFilter::Everything);

        let down = Ray::new(Point3::new(50.25, -0.5, 10.0), -Vector3::z());
        let hits = resolver.resolve_ray(&down, &registry).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(registry.element(hits[0].element).unwrap().express_id(), 100);
        assert_eq!(resolver.instances_tested(), 1);

        let above = Ray::new(Point3::new(-10.0, 100.0, 0.0), Vector3::x());
        assert!(resolver.resolve_ray(&above, &registry).unwrap().is_empty());
        assert_eq!(resolver.instances_tested(), 0);

        let cluster = Ray::new(Point3::new(0.25, -0.5, 10.0), -Vector3::z());
        assert!(!resolver.resolve_ray(&cluster, &registry).unwrap().is_empty());
        assert_eq!(resolver.instances_tested(), 10);
    }
}
