//! Per-pass uniform data
//!
//! Written once per frame into the pass arena slot of that frame.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3};

/// Pass constants - matches the shader's `PassUBO` block (std140)
///
/// Matrices are column-major. Every vector sits on a 16-byte boundary; the
/// `vec3` eye position is followed by one float of padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to world
    pub inv_view: [[f32; 4]; 4],
    /// View to clip
    pub proj: [[f32; 4]; 4],
    /// Clip to view
    pub inv_proj: [[f32; 4]; 4],
    /// World to clip
    pub view_proj: [[f32; 4]; 4],
    /// Clip to world
    pub inv_view_proj: [[f32; 4]; 4],
    /// Camera position in world space
    pub eye_position: [f32; 3],
    /// Pads `eye_position` to 16 bytes
    pub _padding: f32,
    /// Render target size in pixels
    pub render_target_size: [f32; 2],
    /// Reciprocal render target size
    pub inv_render_target_size: [f32; 2],
    /// Near clip distance
    pub near_z: f32,
    /// Far clip distance
    pub far_z: f32,
    /// Seconds since start
    pub total_time: f32,
    /// Seconds since previous frame
    pub delta_time: f32,
}

const _: () = assert!(std::mem::size_of::<PassConstants>() == 432);

/// Inputs for building [`PassConstants`]
#[derive(Debug, Clone, PartialEq)]
pub struct PassParameters {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub proj: Mat4,
    /// Camera position in world space
    pub eye_position: Vec3,
    /// Render target width and height in pixels
    pub render_target_size: [f32; 2],
    /// Near clip distance
    pub near_z: f32,
    /// Far clip distance
    pub far_z: f32,
    /// Seconds since start
    pub total_time: f32,
    /// Seconds since previous frame
    pub delta_time: f32,
}

impl PassConstants {
    /// Derive inverses and combined matrices from the frame's parameters
    ///
    /// A singular matrix yields an identity inverse.
    pub fn from_parameters(params: &PassParameters) -> Self {
        let view_proj = params.proj * params.view;
        let invert = |m: &Mat4| m.try_inverse().unwrap_or_else(Mat4::identity);
        let [width, height] = params.render_target_size;
        let reciprocal = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };

        Self {
            view: params.view.into(),
            inv_view: invert(&params.view).into(),
            proj: params.proj.into(),
            inv_proj: invert(&params.proj).into(),
            view_proj: view_proj.into(),
            inv_view_proj: invert(&view_proj).into(),
            eye_position: params.eye_position.into(),
            _padding: 0.0,
            render_target_size: [width, height],
            inv_render_target_size: [reciprocal(width), reciprocal(height)],
            near_z: params.near_z,
            far_z: params.far_z,
            total_time: params.total_time,
            delta_time: params.delta_time,
        }
    }

    /// Combined world-to-clip matrix
    pub fn view_proj_matrix(&self) -> Mat4 {
        Mat4::from(self.view_proj)
    }
}

impl Default for PassConstants {
    fn default() -> Self {
        let identity: [[f32; 4]; 4] = Mat4::identity().into();
        Self {
            view: identity,
            inv_view: identity,
            proj: identity,
            inv_proj: identity,
            view_proj: identity,
            inv_view_proj: identity,
            eye_position: [0.0; 3],
            _padding: 0.0,
            render_target_size: [0.0; 2],
            inv_render_target_size: [0.0; 2],
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    #[test]
    fn test_std140_member_offsets() {
        assert_eq!(std::mem::offset_of!(PassConstants, view), 0);
        assert_eq!(std::mem::offset_of!(PassConstants, inv_view_proj), 320);
        assert_eq!(std::mem::offset_of!(PassConstants, eye_position), 384);
        assert_eq!(std::mem::offset_of!(PassConstants, render_target_size), 400);
        assert_eq!(std::mem::offset_of!(PassConstants, near_z), 416);
        assert_eq!(std::mem::offset_of!(PassConstants, delta_time), 428);
    }

    #[test]
    fn test_inverses_and_reciprocals() {
        let view = Mat4::look_at(Vec3::new(0.0, 5.0, -10.0), Vec3::zeros(), Vec3::y());
        let proj = Mat4::perspective(0.785, 800.0 / 600.0, 1.0, 1000.0);
        let constants = PassConstants::from_parameters(&PassParameters {
            view,
            proj,
            eye_position: Vec3::new(0.0, 5.0, -10.0),
            render_target_size: [800.0, 600.0],
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 2.0,
            delta_time: 0.016,
        });

        let round_trip = Mat4::from(constants.view) * Mat4::from(constants.inv_view);
        assert_relative_eq!(round_trip, Mat4::identity(), epsilon = 1e-4);
        assert_relative_eq!(constants.view_proj_matrix(), proj * view, epsilon = 1e-5);
        assert_relative_eq!(constants.inv_render_target_size[0], 1.0 / 800.0);
        assert_eq!(constants.eye_position, [0.0, 5.0, -10.0]);
    }

    #[test]
    fn test_singular_matrix_gets_identity_inverse() {
        let constants = PassConstants::from_parameters(&PassParameters {
            view: Mat4::zeros(),
            proj: Mat4::identity(),
            eye_position: Vec3::zeros(),
            render_target_size: [0.0, 0.0],
            near_z: 1.0,
            far_z: 10.0,
            total_time: 0.0,
            delta_time: 0.0,
        });

        assert_eq!(Mat4::from(constants.inv_view), Mat4::identity());
        assert_eq!(constants.inv_render_target_size, [0.0, 0.0]);
    }
}
