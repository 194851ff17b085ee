// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Perspective camera pose and pointer rays.

use nalgebra::{Matrix4, Point2, Point3, Vector3, Vector4};

/// Right-handed perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Point3::new(10.0, 20.0, 20.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_y: 45f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 5000.0,
        }
    }
}

impl Camera {
    /// Unit vector from the camera towards its target, `-Z` when the two
    /// coincide.
    pub fn view_direction(&self) -> Vector3<f32> {
        (self.target - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| -Vector3::z())
    }

    /// Sets the aspect ratio from a viewport size. Zero heights are ignored.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if height > 0.0 && width > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &(self.position + self.view_direction()), &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov_y, self.near, self.far)
    }

    /// Orthonormal `(right, up, forward)` basis of the view.
    fn basis(&self) -> (Vector3<f32>, Vector3<f32>, Vector3<f32>) {
        let forward = self.view_direction();
        let right = forward
            .cross(&self.up)
            .try_normalize(f32::EPSILON)
            .or_else(|| forward.cross(&Vector3::z()).try_normalize(f32::EPSILON))
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&forward);
        (right, up, forward)
    }

    /// World-space ray through a normalized device coordinate in `[-1, 1]²`
    /// (`+y` up).
    pub fn ray_from_ndc(&self, ndc: Point2<f32>) -> Ray {
        let (right, up, forward) = self.basis();
        let half_height = (self.fov_y * 0.5).tan();
        let half_width = half_height * self.aspect;
        let direction = forward + right * (ndc.x * half_width) + up * (ndc.y * half_height);
        Ray::new(self.position, direction)
    }

    /// Projects a world point to pixel coordinates with `+y` down. Points
    /// behind the camera yield `None`.
    pub fn world_to_screen(&self, point: &Point3<f32>, width: f32, height: f32) -> Option<Point2<f32>> {
        let clip = self.projection_matrix() * self.view_matrix() * Vector4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let half_width = width * 0.5;
        let half_height = height * 0.5;
        Some(Point2::new(
            ndc_x * half_width + half_width,
            -(ndc_y * half_height) + half_height,
        ))
    }
}

/// Half-line `origin + t * direction`, `t >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Creates a ray with a normalized direction.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(f32::EPSILON).unwrap_or_else(|| -Vector3::z()),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Maps the ray through `matrix` without renormalizing, so a parameter
    /// `t` names the same point in both spaces.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Ray {
        Ray {
            origin: matrix.transform_point(&self.origin),
            direction: matrix.transform_vector(&self.direction),
        }
    }
}
