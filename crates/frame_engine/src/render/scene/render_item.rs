//! Render items: one drawable object with a permanent object slot

use crate::foundation::math::Mat4;
use crate::render::scene::mesh::{MeshHandle, SubmeshGeometry};

/// Propagation state of an item's transform across the frame slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// Every slot holds the latest transform
    Clean,
    /// No slot holds the latest transform yet
    Dirty,
    /// Some slots hold it, `remaining` still need a write
    PartiallyPropagated {
        /// Slots still to be written
        remaining: usize,
    },
}

/// A drawable object and the per-object uniform element it owns
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    world_transform: Mat4,
    object_index: usize,
    stale_slots: Vec<bool>,
    dirty_frames_remaining: usize,
    mesh: MeshHandle,
    draw: SubmeshGeometry,
}

impl RenderItem {
    pub(crate) fn new(
        object_index: usize,
        world_transform: Mat4,
        mesh: MeshHandle,
        draw: SubmeshGeometry,
        frame_slot_count: usize,
    ) -> Self {
        Self {
            world_transform,
            object_index,
            stale_slots: vec![true; frame_slot_count],
            dirty_frames_remaining: frame_slot_count,
            mesh,
            draw,
        }
    }

    /// Latest world transform
    pub fn world_transform(&self) -> &Mat4 {
        &self.world_transform
    }

    /// Element index in the object arena
    pub fn object_index(&self) -> usize {
        self.object_index
    }

    /// Frame slots that still hold an older transform
    pub fn dirty_frames_remaining(&self) -> usize {
        self.dirty_frames_remaining
    }

    /// Whether `frame_index` still holds an older transform
    pub fn is_stale_in(&self, frame_index: usize) -> bool {
        self.stale_slots.get(frame_index).copied().unwrap_or(false)
    }

    /// Geometry the item draws from
    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    /// Indexed draw arguments
    pub fn draw_args(&self) -> SubmeshGeometry {
        self.draw
    }

    /// Indices drawn
    pub fn index_count(&self) -> u32 {
        self.draw.index_count
    }

    /// First index in the shared index buffer
    pub fn start_index(&self) -> u32 {
        self.draw.start_index
    }

    /// Vertex offset of the submesh
    pub fn base_vertex(&self) -> i32 {
        self.draw.base_vertex
    }

    /// Where the transform stands given `frame_slot_count` slots
    pub fn dirty_state(&self, frame_slot_count: usize) -> DirtyState {
        match self.dirty_frames_remaining {
            0 => DirtyState::Clean,
            n if n >= frame_slot_count => DirtyState::Dirty,
            remaining => DirtyState::PartiallyPropagated { remaining },
        }
    }

    pub(crate) fn set_world_transform(&mut self, world: Mat4, frame_slot_count: usize) {
        self.world_transform = world;
        self.mark_dirty(frame_slot_count);
    }

    pub(crate) fn mark_dirty(&mut self, frame_slot_count: usize) {
        self.stale_slots.clear();
        self.stale_slots.resize(frame_slot_count, true);
        self.dirty_frames_remaining = frame_slot_count;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty_frames_remaining > 0
    }

    /// Record that `frame_index` now holds the latest transform
    pub(crate) fn slot_written(&mut self, frame_index: usize) {
        if let Some(stale) = self.stale_slots.get_mut(frame_index) {
            if *stale {
                *stale = false;
                self.dirty_frames_remaining -= 1;
            }
        }
    }
}
