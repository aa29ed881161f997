//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the handful of matrix helpers the render
//! passes need. Matrices are column-major and follow the right-handed,
//! `[-1, 1]` clip-depth convention the shading programs expect.

use nalgebra::{Matrix3, Matrix4, Unit, UnitQuaternion, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Transform representing position, rotation, and scale
///
/// Scene nodes store plain matrices; this type is a convenience for building
/// them from components.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: UnitQuaternion<f32>,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set the rotation from an axis and an angle in radians
    #[must_use]
    pub fn with_rotation(mut self, axis: Vec3, angle: f32) -> Self {
        self.rotation = UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis), angle);
        self
    }

    /// Set a uniform scale factor
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix (translate * rotate * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Mat3, Mat4, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Translation column of an affine matrix
    pub fn translation_of(matrix: &Mat4) -> Vec3 {
        Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
    }

    /// Inverse of a matrix, falling back to identity when it is singular
    ///
    /// Scene matrices are affine and invertible in practice; a degenerate
    /// scale collapses to identity instead of propagating NaNs into uniforms.
    pub fn inverse_or_identity(matrix: &Mat4) -> Mat4 {
        matrix.try_inverse().unwrap_or_else(|| {
            log::warn!("Singular matrix inverted, using identity");
            Mat4::identity()
        })
    }

    /// Normal matrix: inverse-transpose of the upper 3x3 block
    pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
        let upper: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or_else(Mat3::identity, |inverse| inverse.transpose())
    }
}

/// Extension trait for Mat4 with projection and view constructors
pub trait Mat4Ext {
    /// Create a perspective projection matrix (right-handed, depth in `[-1, 1]`)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = -(far + near) / (far - near);
        result[(2, 3)] = -(2.0 * far * near) / (far - near);
        result[(3, 2)] = -1.0;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_matches_nalgebra() {
        let ours = Mat4::perspective(utils::deg_to_rad(60.0), 1.5, 0.1, 100.0);
        let reference = nalgebra::Perspective3::new(1.5, utils::deg_to_rad(60.0), 0.1, 100.0);
        assert_relative_eq!(ours, reference.to_homogeneous(), epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_matches_nalgebra() {
        let eye = Vec3::new(3.0, 2.0, 5.0);
        let ours = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());
        let reference = Mat4::look_at_rh(&nalgebra::Point3::from(eye), &nalgebra::Point3::origin(), &Vec3::y());
        assert_relative_eq!(ours, reference, epsilon = 1e-5);
    }

    #[test]
    fn test_translation_of() {
        let matrix = Transform::from_position(Vec3::new(1.0, -2.0, 3.0))
            .with_rotation(Vec3::y(), 0.7)
            .to_matrix();
        assert_relative_eq!(utils::translation_of(&matrix), Vec3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_transform_applies_scale_then_rotation_then_translation() {
        let matrix = Transform::from_position(Vec3::new(0.0, 1.0, 0.0))
            .with_rotation(Vec3::y(), constants::HALF_PI)
            .with_uniform_scale(2.0)
            .to_matrix();
        let moved = matrix.transform_point(&nalgebra::Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(moved.coords, Vec3::new(0.0, 1.0, -2.0), epsilon = 1e-5);
        assert_relative_eq!(Transform::identity().to_matrix(), Mat4::identity());
    }

    #[test]
    fn test_normal_matrix_of_uniform_scale_keeps_direction() {
        let matrix = Mat4::new_scaling(2.0);
        let normal = utils::normal_matrix(&matrix) * Vec3::x();
        assert_relative_eq!(normal.normalize(), Vec3::x());
    }

    #[test]
    fn test_inverse_of_singular_matrix_is_identity() {
        assert_relative_eq!(utils::inverse_or_identity(&Mat4::zeros()), Mat4::identity());
    }
}
