//! Math utilities and types
//!
//! Provides the fundamental math types used by the renderer. Matrices are
//! `nalgebra` column-major, which is also the order std140 `mat4` members
//! expect, so they can be copied into uniform memory without transposing.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 4
    pub const QUARTER_PI: f32 = PI * 0.25;
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a translation matrix
    fn translation(x: f32, y: f32, z: f32) -> Mat4;

    /// Create a non-uniform scaling matrix
    fn scaling(x: f32, y: f32, z: f32) -> Mat4;

    /// Create a perspective projection matrix with depth mapped to `[0, 1]`
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Flip Y and Z so a right-handed view space lines up with Vulkan clip space
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn translation(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::new_translation(&Vec3::new(x, y, z))
    }

    fn scaling(x: f32, y: f32, z: f32) -> Mat4 {
        Mat4::new_nonuniform_scaling(&Vec3::new(x, y, z))
    }

    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [1/(a*tan(φ/2))  0           0          0        ]
        //     [0               1/tan(φ/2)  0          0        ]
        //     [0               0           f/(f-n)    -nf/(f-n)]
        //     [0               0           1          0        ]
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
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

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perspective_depth_range() {
        let near = 1.0;
        let far = 1000.0;
        let proj = Mat4::perspective(constants::QUARTER_PI, 4.0 / 3.0, near, far)
            * Mat4::vulkan_coordinate_transform();

        let near_point = proj * Vec4::new(0.0, 0.0, -near, 1.0);
        let far_point = proj * Vec4::new(0.0, 0.0, -far, 1.0);

        assert_relative_eq!(near_point.z / near_point.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far_point.z / far_point.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_moves_eye_to_origin() {
        let eye = Vec3::new(3.0, 4.0, -5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());

        let eye_in_view = view * Vec4::new(eye.x, eye.y, eye.z, 1.0);
        assert_relative_eq!(eye_in_view.xyz(), Vec3::zeros(), epsilon = 1e-5);

        // The target sits straight down -Z in view space
        let target_in_view = view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(target_in_view.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(target_in_view.y, 0.0, epsilon = 1e-5);
        assert!(target_in_view.z < 0.0);
    }

    #[test]
    fn test_translation_and_scaling_compose() {
        let world = Mat4::translation(0.0, 0.5, 0.0) * Mat4::scaling(2.0, 2.0, 2.0);
        let corner = world * Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert_relative_eq!(corner, Vec4::new(1.0, 1.5, 1.0, 1.0), epsilon = 1e-6);
    }
}
