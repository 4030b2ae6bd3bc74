//! Draw-time binder
//!
//! Turns (frame slot, object index) pairs into dynamic byte offsets into the
//! pass and object arenas and records the draws for one frame. The offsets
//! are the same ones the object table writes to, so a draw always reads the
//! constants flushed for its own slot.

use crate::render::backend::{DrawRecorder, GraphicsDevice, UniformSlot};
use crate::render::error::{FrameResourceError, FrameResult};
use crate::render::frame::PassConstants;
use crate::render::resources::UniformArena;
use crate::render::scene::{MeshGeometry, ObjectTable};

/// Byte range bound to a uniform slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformRange {
    /// Dynamic offset into the arena buffer
    pub offset: u64,
    /// Bound size
    pub range: u64,
}

/// Work recorded by one [`DrawBinder::record`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Indexed draws issued
    pub draws: u32,
    /// Indices submitted across all draws
    pub indices: u64,
}

/// Offset arithmetic and draw recording for the shapes pipeline
#[derive(Debug, Clone)]
pub struct DrawBinder<B> {
    pass_buffer: B,
    object_buffer: B,
    pass_slot_stride: u64,
    pass_range: u64,
    object_slot_stride: u64,
    object_stride: u64,
    object_capacity: usize,
    frame_slot_count: usize,
}

impl<B: Copy> DrawBinder<B> {
    /// Bind to a pass arena and an object arena
    ///
    /// `reflected_object_range` is the per-object uniform block size the
    /// pipeline reports. When given it must equal the object arena stride,
    /// otherwise dynamic offsets and the bound range would disagree.
    pub fn new<D>(
        pass_arena: &UniformArena<D>,
        object_arena: &UniformArena<D>,
        reflected_object_range: Option<u64>,
    ) -> FrameResult<Self>
    where
        D: GraphicsDevice<Buffer = B>,
    {
        if pass_arena.frame_slot_count() != object_arena.frame_slot_count() {
            return Err(FrameResourceError::SlotCountMismatch {
                pass: pass_arena.frame_slot_count(),
                object: object_arena.frame_slot_count(),
            });
        }

        let pass_range = std::mem::size_of::<PassConstants>() as u64;
        if pass_range > pass_arena.stride() {
            return Err(FrameResourceError::ElementTooLarge {
                size: pass_range,
                stride: pass_arena.stride(),
            });
        }

        if let Some(reflected) = reflected_object_range {
            if reflected != object_arena.stride() {
                return Err(FrameResourceError::StrideMismatch {
                    reflected,
                    stride: object_arena.stride(),
                });
            }
        }

        Ok(Self {
            pass_buffer: pass_arena.buffer(),
            object_buffer: object_arena.buffer(),
            pass_slot_stride: pass_arena.frame_slot_stride(),
            pass_range,
            object_slot_stride: object_arena.frame_slot_stride(),
            object_stride: object_arena.stride(),
            object_capacity: object_arena.element_count(),
            frame_slot_count: object_arena.frame_slot_count(),
        })
    }

    /// Pass constants range of a frame slot
    pub fn pass_range(&self, frame_index: usize) -> FrameResult<UniformRange> {
        self.check_frame(frame_index)?;
        Ok(UniformRange {
            offset: frame_index as u64 * self.pass_slot_stride,
            range: self.pass_range,
        })
    }

    /// Object constants range of one object in a frame slot
    pub fn object_range(&self, frame_index: usize, object_index: usize) -> FrameResult<UniformRange> {
        self.check_frame(frame_index)?;
        if object_index >= self.object_capacity {
            return Err(FrameResourceError::ObjectIndexOutOfRange {
                index: object_index,
                capacity: self.object_capacity,
            });
        }
        Ok(UniformRange {
            offset: frame_index as u64 * self.object_slot_stride + object_index as u64 * self.object_stride,
            range: self.object_stride,
        })
    }

    /// Record the pass binding once, then one indexed draw per item
    ///
    /// Items are drawn in object index order. Must run after the object
    /// table was flushed into the same slot.
    pub fn record<R>(
        &self,
        recorder: &mut R,
        frame_index: usize,
        objects: &ObjectTable,
        geometries: &[MeshGeometry<B>],
    ) -> FrameResult<DrawStats>
    where
        R: DrawRecorder<Buffer = B>,
    {
        let pass = self.pass_range(frame_index)?;
        recorder.bind_uniform_range(UniformSlot::Pass, self.pass_buffer, pass.offset, pass.range)?;

        let mut stats = DrawStats::default();
        for item in objects.iter() {
            let geometry = geometries
                .get(item.mesh().index())
                .ok_or(FrameResourceError::UnknownMesh(item.mesh().index()))?;
            let object = self.object_range(frame_index, item.object_index())?;

            recorder.bind_uniform_range(UniformSlot::Object, self.object_buffer, object.offset, object.range)?;
            recorder.bind_vertex_buffer(geometry.vertex_buffer(), 0);
            recorder.bind_index_buffer(geometry.index_buffer(), 0, geometry.index_format());
            recorder.draw_indexed(item.index_count(), item.start_index(), item.base_vertex());

            stats.draws += 1;
            stats.indices += u64::from(item.index_count());
        }

        log::trace!(
            "Recorded {} draws ({} indices) from frame slot {frame_index}",
            stats.draws,
            stats.indices
        );
        Ok(stats)
    }

    fn check_frame(&self, frame_index: usize) -> FrameResult<()> {
        if frame_index >= self.frame_slot_count {
            return Err(FrameResourceError::FrameIndexOutOfRange {
                index: frame_index,
                count: self.frame_slot_count,
            });
        }
        Ok(())
    }
}
