//! Per-object uniform buffer data structures
//!
//! GPU-side data for a single render item. One element of the object arena.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Per-object constants - matches the shader's `ObjectUBO` block (std140)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    /// Model transformation matrix (4×4 column-major)
    pub world: [[f32; 4]; 4],
}

const _: () = assert!(std::mem::size_of::<ObjectConstants>() == 64);

impl ObjectConstants {
    /// Create from a world matrix
    pub fn from_world(world: &Mat4) -> Self {
        Self { world: (*world).into() }
    }

    /// World matrix as stored
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from(self.world)
    }
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self::from_world(&Mat4::identity())
    }
}
