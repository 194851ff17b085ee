// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounding volumes and camera framing.
//!
//! Boxes are accumulated first and converted to a sphere once, which keeps
//! the result tighter than a union of spheres. Empty inputs produce
//! [`Sphere::zero`]; framing skips it.

use nalgebra::{Point3, Vector3};

use crate::bounds::{Aabb, Sphere};
use crate::camera::Camera;
use crate::keys::{ElementKey, RecordKey};
use crate::registry::ElementRegistry;

/// Default multiplier applied to the framing distance.
pub const DEFAULT_FIT_MARGIN: f32 = 1.1;

/// Default lower bound on the framing distance.
pub const DEFAULT_FIT_MIN_DISTANCE: f32 = 1.0;

/// Read-only spatial queries over a registry.
#[derive(Debug, Clone, Copy)]
pub struct SpatialQuery<'a> {
    registry: &'a ElementRegistry,
}

impl<'a> SpatialQuery<'a> {
    pub fn new(registry: &'a ElementRegistry) -> Self {
        Self { registry }
    }

    /// Model-space box of one record, whether or not it is visible.
    fn record_box(&self, record: RecordKey) -> Aabb {
        let Some(record) = self.registry.record(record) else {
            return Aabb::empty();
        };
        match self.registry.geometry(record.geometry_id()) {
            Some(geometry) => geometry.local_bounds().transformed(record.matrix()),
            None => Aabb::empty(),
        }
    }

    fn to_world(&self, bounds: &Aabb) -> Sphere {
        let sphere = bounds.bounding_sphere();
        if sphere.is_degenerate() {
            return Sphere::zero();
        }
        sphere.transformed(self.registry.model_transform())
    }

    /// World sphere of a single instance.
    pub fn bounding_sphere_of_instance(&self, record: RecordKey) -> Sphere {
        self.to_world(&self.record_box(record))
    }

    /// Model-space box of an element's live instances.
    pub fn element_box(&self, element: ElementKey) -> Aabb {
        let mut bounds = Aabb::empty();
        let Some(element) = self.registry.element(element) else {
            return bounds;
        };
        for &record in element.records() {
            let live = self
                .registry
                .record(record)
                .is_some_and(|r| r.handle().is_some());
            if live {
                bounds.union(&self.record_box(record));
            }
        }
        bounds
    }

    /// World sphere of an element's live instances.
    pub fn bounding_sphere_of_element(&self, element: ElementKey) -> Sphere {
        self.to_world(&self.element_box(element))
    }

    /// World sphere of every live instance.
    pub fn bounding_sphere_of_model(&self) -> Sphere {
        self.to_world(&self.registry.model_bounds())
    }
}

/// Distance from the sphere center at which the whole sphere fits the
/// narrower of the two view angles.
pub fn minimum_camera_distance(sphere: &Sphere, fov_y: f32, aspect: f32) -> f32 {
    let fov_x = 2.0 * ((fov_y * 0.5).tan() * aspect).atan();
    let fov = fov_y.min(fov_x);
    sphere.radius / (fov * 0.5).sin()
}

/// Moves the camera to `destination - direction * distance`, keeping its
/// approach direction, and targets `destination`.
pub fn move_camera_to(camera: &mut Camera, destination: Point3<f32>, distance: f32) {
    let direction = approach_direction(camera, &destination);
    camera.position = destination - direction * distance;
    camera.target = destination;
}

/// Places the camera so the sphere fills the view.
///
/// Returns `false` and leaves the camera untouched for a degenerate sphere.
pub fn fit_camera_to_sphere(
    sphere: &Sphere,
    camera: &mut Camera,
    margin: f32,
    min_distance: f32,
) -> bool {
    if sphere.is_degenerate() {
        return false;
    }
    let distance = minimum_camera_distance(sphere, camera.fov_y, camera.aspect).max(min_distance) * margin;
    move_camera_to(camera, sphere.center, distance);
    true
}

/// Re-targets the camera on the sphere center without moving it.
pub fn focus_camera_on(sphere: &Sphere, camera: &mut Camera) -> bool {
    if sphere.is_degenerate() {
        return false;
    }
    camera.target = sphere.center;
    true
}

fn approach_direction(camera: &Camera, destination: &Point3<f32>) -> Vector3<f32> {
    (destination - camera.position)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| camera.view_direction())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn minimum_distance_uses_narrower_fov() {
        let sphere = Sphere::new(Point3::origin(), 2.0);
        let fov = 60f32.to_radians();

        let wide = minimum_camera_distance(&sphere, fov, 2.0);
        assert_relative_eq!(wide, 2.0 / (30f32.to_radians()).sin(), epsilon = 1e-5);

        let tall = minimum_camera_distance(&sphere, fov, 0.5);
        let fov_x = 2.0 * ((fov * 0.5).tan() * 0.5).atan();
        assert_relative_eq!(tall, 2.0 / (fov_x * 0.5).sin(), epsilon = 1e-5);
        assert!(tall > wide);
    }

    #[test]
    fn fit_keeps_approach_direction() {
        let mut camera = Camera {
            position: Point3::new(0.0, 0.0, 100.0),
            target: Point3::origin(),
            aspect: 1.0,
            fov_y: 90f32.to_radians(),
            ..Camera::default()
        };
        let sphere = Sphere::new(Point3::new(0.0, 0.0, 0.0), 1.0);

        assert!(fit_camera_to_sphere(&sphere, &mut camera, 1.1, 1.0));
        let expected = 1.0 / (45f32.to_radians()).sin() * 1.1;
        assert_relative_eq!(camera.position, Point3::new(0.0, 0.0, expected), epsilon = 1e-4);
        assert_eq!(camera.target, sphere.center);
    }

    #[test]
    fn fit_respects_min_distance() {
        let mut camera = Camera::default();
        let sphere = Sphere::new(Point3::new(1.0, 1.0, 1.0), 0.01);
        assert!(fit_camera_to_sphere(&sphere, &mut camera, 1.1, 1.0));
        assert_relative_eq!((camera.position - sphere.center).norm(), 1.1, epsilon = 1e-5);
    }

    #[test]
    fn degenerate_spheres_are_skipped() {
        let mut camera = Camera::default();
        let before = camera.clone();
        assert!(!fit_camera_to_sphere(&Sphere::zero(), &mut camera, 1.1, 1.0));
        assert!(!focus_camera_on(&Sphere::zero(), &mut camera));
        assert_eq!(camera, before);
    }

    #[test]
    fn move_to_keeps_distance() {
        let mut camera = Camera::default();
        let destination = Point3::new(5.0, 0.0, 0.0);
        move_camera_to(&mut camera, destination, 3.0);
        assert_relative_eq!((camera.position - destination).norm(), 3.0, epsilon = 1e-5);
        assert_eq!(camera.target, destination);
    }
}
