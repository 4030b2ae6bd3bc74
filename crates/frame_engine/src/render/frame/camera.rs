//! Orbit camera feeding the pass constants
//!
//! Spherical coordinates around the origin. Mapping input to `rotate`/`zoom`
//! is left to the application.

use crate::foundation::math::{constants, Mat4, Mat4Ext, Vec3};
use crate::render::frame::pass::PassParameters;

/// Camera orbiting the world origin
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    theta: f32,
    phi: f32,
    radius: f32,
    fov_y: f32,
    near_z: f32,
    far_z: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            theta: 1.5 * constants::PI,
            phi: 0.2 * constants::PI,
            radius: 15.0,
            fov_y: constants::QUARTER_PI,
            near_z: 1.0,
            far_z: 1000.0,
        }
    }
}

impl OrbitCamera {
    /// Closest orbit radius
    pub const MIN_RADIUS: f32 = 3.0;
    /// Farthest orbit radius
    pub const MAX_RADIUS: f32 = 15.0;

    /// Camera at the given spherical position
    pub fn new(theta: f32, phi: f32, radius: f32) -> Self {
        let mut camera = Self { theta, ..Self::default() };
        camera.phi = Self::clamp_phi(phi);
        camera.radius = radius.clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);
        camera
    }

    /// Orbit by the given angles (radians)
    pub fn rotate(&mut self, d_theta: f32, d_phi: f32) {
        self.theta += d_theta;
        self.phi = Self::clamp_phi(self.phi + d_phi);
    }

    /// Move towards (negative) or away from (positive) the origin
    pub fn zoom(&mut self, delta: f32) {
        self.radius = (self.radius + delta).clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);
    }

    /// Current orbit radius
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Eye position in world space
    pub fn eye_position(&self) -> Vec3 {
        Vec3::new(
            self.radius * self.phi.sin() * self.theta.cos(),
            self.radius * self.phi.cos(),
            self.radius * self.phi.sin() * self.theta.sin(),
        )
    }

    /// World to view
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.eye_position(), Vec3::zeros(), Vec3::y())
    }

    /// View to Vulkan clip space
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective(self.fov_y, aspect, self.near_z, self.far_z) * Mat4::vulkan_coordinate_transform()
    }

    /// Pass parameters for a render target of `width` x `height` pixels
    pub fn pass_parameters(&self, width: u32, height: u32, total_time: f32, delta_time: f32) -> PassParameters {
        let aspect = if height > 0 { width as f32 / height as f32 } else { 1.0 };
        PassParameters {
            view: self.view_matrix(),
            proj: self.projection_matrix(aspect),
            eye_position: self.eye_position(),
            render_target_size: [width as f32, height as f32],
            near_z: self.near_z,
            far_z: self.far_z,
            total_time,
            delta_time,
        }
    }

    fn clamp_phi(phi: f32) -> f32 {
        phi.clamp(0.1, constants::PI - 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_eye_position_on_sphere() {
        let camera = OrbitCamera::new(0.0, constants::PI * 0.5, 10.0);
        assert_relative_eq!(camera.eye_position(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);

        let default = OrbitCamera::default();
        assert_relative_eq!(default.eye_position().norm(), 15.0, epsilon = 1e-4);
    }

    #[test]
    fn test_radius_and_phi_are_clamped() {
        let mut camera = OrbitCamera::default();
        camera.zoom(100.0);
        assert_relative_eq!(camera.radius(), OrbitCamera::MAX_RADIUS);
        camera.zoom(-100.0);
        assert_relative_eq!(camera.radius(), OrbitCamera::MIN_RADIUS);

        camera.rotate(0.0, 10.0);
        // Eye never crosses the pole, so look_at keeps a valid up vector
        assert!(camera.eye_position().y > -camera.radius());
        assert!(camera.eye_position().x.abs() > 0.0 || camera.eye_position().z.abs() > 0.0);
    }

    #[test]
    fn test_origin_projects_to_screen_centre() {
        let camera = OrbitCamera::default();
        let params = camera.pass_parameters(800, 600, 0.0, 0.0);
        let clip = params.proj * params.view * crate::foundation::math::Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-4);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }
}
