// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned boxes and bounding spheres.

use nalgebra::{Matrix4, Point3, Vector3};

/// Axis-aligned bounding box in f32 precision.
///
/// An empty box has `min > max` on every axis and absorbs nothing on union.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create new bounds initialized to the empty state
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Point3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Bounds of a flat `[x, y, z, x, y, z, ...]` position array.
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut bounds = Self::empty();
        for p in positions.chunks_exact(3) {
            bounds.expand(&Point3::new(p[0], p[1], p[2]));
        }
        bounds
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand bounds to include a point
    #[inline]
    pub fn expand(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Expand bounds to include another box
    #[inline]
    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing the 8 transformed corners.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::empty();
        for corner in self.corners() {
            out.expand(&matrix.transform_point(&corner));
        }
        out
    }

    pub fn contains_point(&self, point: &Point3<f32>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Sphere around the box center reaching every corner.
    /// An empty box yields [`Sphere::zero`].
    pub fn bounding_sphere(&self) -> Sphere {
        if self.is_empty() {
            return Sphere::zero();
        }
        Sphere {
            center: self.center(),
            radius: self.size().norm() * 0.5,
        }
    }
}

/// Bounding sphere. Radius 0 means "nothing to frame".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    /// The degenerate sphere: radius 0 at the origin.
    pub fn zero() -> Self {
        Self {
            center: Point3::origin(),
            radius: 0.0,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.radius > 0.0)
    }

    /// Maps the sphere through `matrix`, scaling the radius by the largest
    /// axis scale so the result still encloses the mapped volume.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Sphere {
        let scale = (0..3)
            .map(|i| matrix.fixed_view::<3, 1>(0, i).norm())
            .fold(0.0f32, f32::max);
        Sphere {
            center: matrix.transform_point(&self.center),
            radius: self.radius * scale,
        }
    }

    pub fn contains_point(&self, point: &Point3<f32>, tolerance: f32) -> bool {
        (point - self.center).norm() <= self.radius + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_box_has_degenerate_sphere() {
        let sphere = Aabb::empty().bounding_sphere();
        assert!(sphere.is_degenerate());
        assert_eq!(sphere.center, Point3::origin());
    }

    #[test]
    fn unit_cube_sphere() {
        let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        let sphere = bounds.bounding_sphere();
        assert_relative_eq!(sphere.center, Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(sphere.radius, 3.0f32.sqrt());
    }

    #[test]
    fn union_ignores_empty() {
        let mut bounds = Aabb::from_positions(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        bounds.union(&Aabb::empty());
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));

        let mut empty = Aabb::empty();
        empty.union(&bounds);
        assert_eq!(empty, bounds);
    }

    #[test]
    fn transformed_box_covers_rotation() {
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        let rotation = Matrix4::from_euler_angles(0.0, 0.0, std::f32::consts::FRAC_PI_4);
        let rotated = bounds.transformed(&rotation);
        assert_relative_eq!(rotated.max.x, 2.0f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(rotated.max.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn sphere_transform_scales_radius() {
        let sphere = Sphere::new(Point3::new(1.0, 0.0, 0.0), 2.0);
        let matrix = Matrix4::new_translation(&Vector3::new(0.0, 5.0, 0.0))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 3.0, 2.0));
        let mapped = sphere.transformed(&matrix);
        assert_relative_eq!(mapped.center, Point3::new(1.0, 5.0, 0.0));
        assert_relative_eq!(mapped.radius, 6.0);
    }
}
