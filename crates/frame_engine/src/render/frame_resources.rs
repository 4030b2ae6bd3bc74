//! # Frame Resources
//!
//! Owns everything that changes per frame and ties the pieces together:
//!
//! ```text
//! on_frame_begin ──► rotator picks slot f, waits for slot f's last fence
//! update_*        ──► object table / pass constants (CPU side)
//! record_draws    ──► flush dirty objects into slot f, bind + draw from slot f
//! end_frame       ──► remember the fence of the submission that reads slot f
//! ```
//!
//! A slot is only written after the device has signalled the fence of the
//! last submission that read it. With enough slots that fence has long been
//! signalled and `on_frame_begin` never blocks.

use std::sync::Arc;

use crate::config::FrameResourceConfig;
use crate::foundation::math::Mat4;
use crate::render::backend::{DrawRecorder, GraphicsDevice};
use crate::render::binder::DrawBinder;
use crate::render::error::{FrameResourceError, FrameResult};
use crate::render::frame::{FrameContext, FrameSlotRotator, PassConstants};
use crate::render::resources::{AlignedLayout, UniformArena};
use crate::render::scene::{DirtyState, MeshGeometry, MeshHandle, ObjectConstants, ObjectTable};

/// Counters for one frame tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Tick the counters belong to
    pub frame_number: u64,
    /// Slot written and read this tick
    pub frame_index: usize,
    /// Object constants written by the flush
    pub object_writes: usize,
    /// Pass constants written
    pub pass_writes: usize,
    /// Indexed draws recorded
    pub draws: u32,
    /// Indices submitted
    pub indices: u64,
    /// Times `on_frame_begin` had to block on the device
    pub fence_waits: u32,
}

/// Per-frame uniform storage, render items and slot synchronization
pub struct FrameResources<D: GraphicsDevice> {
    objects: ObjectTable,
    geometries: Vec<MeshGeometry<D::Buffer>>,
    binder: DrawBinder<D::Buffer>,
    rotator: FrameSlotRotator,
    slot_fences: Vec<Option<D::Fence>>,
    flushed_frame: Option<u64>,
    stats: FrameStats,
    total_fence_waits: u64,
    pass_arena: UniformArena<D>,
    object_arena: UniformArena<D>,
    device: Arc<D>,
}

impl<D: GraphicsDevice> FrameResources<D> {
    /// Size and map both arenas
    ///
    /// The element alignment is the larger of the device limit and the
    /// configured override, which must be a power of two even when the
    /// device limit is larger. Every slot starts with default pass constants
    /// and identity object transforms.
    pub fn new(device: Arc<D>, config: &FrameResourceConfig) -> FrameResult<Self> {
        let device_alignment = device.limits().min_uniform_buffer_offset_alignment;
        let alignment = match config.min_uniform_alignment {
            Some(alignment) if !alignment.is_power_of_two() => {
                return Err(FrameResourceError::InvalidAlignment { alignment });
            }
            Some(alignment) => alignment.max(device_alignment),
            None => device_alignment,
        };
        let slots = config.frame_slot_count;

        let rotator = FrameSlotRotator::new(slots)?;
        let objects = ObjectTable::new(config.max_objects, slots)?;

        let pass_layout = AlignedLayout::of::<PassConstants>(alignment)?;
        let object_layout = AlignedLayout::of::<ObjectConstants>(alignment)?;

        let mut pass_arena = UniformArena::new(device.clone(), "pass", pass_layout, 1, slots)?;
        let mut object_arena =
            UniformArena::new(device.clone(), "object", object_layout, config.max_objects, slots)?;
        pass_arena.fill(&PassConstants::default())?;
        object_arena.fill(&ObjectConstants::default())?;

        let binder = DrawBinder::new(&pass_arena, &object_arena, None)?;

        log::info!(
            "{}: {slots} frame slots, {} objects, {}-byte object stride, {} bytes of uniform memory",
            config.application_name,
            config.max_objects,
            object_layout.stride(),
            pass_arena.total_bytes() + object_arena.total_bytes()
        );

        Ok(Self {
            objects,
            geometries: Vec::new(),
            binder,
            rotator,
            slot_fences: vec![None; slots],
            flushed_frame: None,
            stats: FrameStats::default(),
            total_fence_waits: 0,
            pass_arena,
            object_arena,
            device,
        })
    }

    /// Check the object block size reported by the pipeline against the arena stride
    pub fn validate_pipeline_object_range(&mut self, reflected_range: u64) -> FrameResult<()> {
        self.binder = DrawBinder::new(&self.pass_arena, &self.object_arena, Some(reflected_range))?;
        Ok(())
    }

    /// Make a geometry available to render items
    pub fn register_geometry(&mut self, geometry: MeshGeometry<D::Buffer>) -> MeshHandle {
        let handle = MeshHandle(self.geometries.len());
        log::debug!("Registered geometry '{}' as mesh {}", geometry.name(), handle.index());
        self.geometries.push(geometry);
        handle
    }

    /// Registered geometry
    pub fn geometry(&self, mesh: MeshHandle) -> FrameResult<&MeshGeometry<D::Buffer>> {
        self.geometries
            .get(mesh.index())
            .ok_or(FrameResourceError::UnknownMesh(mesh.index()))
    }

    /// Add a render item drawing `submesh` of `mesh`, returning its object index
    pub fn add_render_item(&mut self, mesh: MeshHandle, submesh: &str, world: Mat4) -> FrameResult<usize> {
        let draw = self.geometry(mesh)?.submesh(submesh)?;
        self.objects.insert(world, mesh, draw)
    }

    /// Start a frame tick
    ///
    /// Advances to the next slot and, if the device may still be reading
    /// that slot, blocks until it is done.
    pub fn on_frame_begin(&mut self) -> FrameResult<FrameContext> {
        let ctx = self.rotator.advance();
        let frame_index = ctx.frame_index();

        let mut fence_waits = 0;
        if let Some(fence) = self.slot_fences[frame_index].take() {
            if !self.device.is_fence_signaled(fence)? {
                log::debug!("Frame {}: waiting for slot {frame_index} ({fence:?})", ctx.frame_number());
                self.device.wait_for_fence(fence)?;
                fence_waits += 1;
            }
        }
        self.total_fence_waits += u64::from(fence_waits);

        self.flushed_frame = None;
        self.stats = FrameStats {
            frame_number: ctx.frame_number(),
            frame_index,
            fence_waits,
            ..FrameStats::default()
        };
        log::trace!("Frame {} begins in slot {frame_index}", ctx.frame_number());
        Ok(ctx)
    }

    /// Replace an object's world transform
    ///
    /// The change reaches every slot over the next `frame_slot_count` ticks.
    pub fn update_object_transform(&mut self, object_index: usize, world: Mat4) -> FrameResult<()> {
        self.objects.set_world_transform(object_index, world)
    }

    /// Re-propagate an object's current transform to every slot
    pub fn mark_dirty(&mut self, object_index: usize) -> FrameResult<()> {
        self.objects.mark_dirty(object_index)
    }

    /// Propagation state of an object
    pub fn dirty_state(&self, object_index: usize) -> FrameResult<DirtyState> {
        self.objects.state(object_index)
    }

    /// Write this tick's pass constants into its slot
    pub fn update_pass_constants(&mut self, ctx: FrameContext, constants: &PassConstants) -> FrameResult<()> {
        self.rotator.ensure_current(ctx)?;
        self.pass_arena.write(ctx.frame_index(), 0, constants)?;
        self.stats.pass_writes += 1;
        Ok(())
    }

    /// Write dirty objects into this tick's slot
    ///
    /// Runs at most once per tick. Later calls in the same tick write
    /// nothing.
    pub fn flush_objects(&mut self, ctx: FrameContext) -> FrameResult<usize> {
        self.rotator.ensure_current(ctx)?;
        if self.flushed_frame == Some(ctx.frame_number()) {
            return Ok(0);
        }

        let writes = self.objects.flush(ctx.frame_index(), &mut self.object_arena)?;
        self.flushed_frame = Some(ctx.frame_number());
        self.stats.object_writes += writes;
        Ok(writes)
    }

    /// Record every render item against this tick's slot
    ///
    /// Flushes first if the tick has not been flushed yet.
    pub fn record_draws<R>(&mut self, ctx: FrameContext, recorder: &mut R) -> FrameResult<FrameStats>
    where
        R: DrawRecorder<Buffer = D::Buffer>,
    {
        self.flush_objects(ctx)?;
        let draws = self
            .binder
            .record(recorder, ctx.frame_index(), &self.objects, &self.geometries)?;
        self.stats.draws += draws.draws;
        self.stats.indices += draws.indices;
        Ok(self.stats)
    }

    /// Finish the tick, remembering the fence of the submission that reads its slot
    pub fn end_frame(&mut self, ctx: FrameContext, fence: D::Fence) -> FrameResult<FrameStats> {
        self.rotator.ensure_current(ctx)?;
        self.slot_fences[ctx.frame_index()] = Some(fence);
        Ok(self.stats)
    }

    /// Block until no submission reads any slot
    pub fn wait_idle(&mut self) -> FrameResult<()> {
        for fence in self.slot_fences.iter_mut() {
            if let Some(fence) = fence.take() {
                self.device.wait_for_fence(fence)?;
            }
        }
        Ok(())
    }

    /// Number of frame slots
    pub fn frame_slot_count(&self) -> usize {
        self.rotator.frame_slot_count()
    }

    /// Context of the active tick
    pub fn current_context(&self) -> FrameContext {
        self.rotator.current()
    }

    /// Render items
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Pass constants arena
    pub fn pass_arena(&self) -> &UniformArena<D> {
        &self.pass_arena
    }

    /// Object constants arena
    pub fn object_arena(&self) -> &UniformArena<D> {
        &self.object_arena
    }

    /// Offset arithmetic used for binding
    pub fn binder(&self) -> &DrawBinder<D::Buffer> {
        &self.binder
    }

    /// Counters of the active tick
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Blocking fence waits since creation
    pub fn total_fence_waits(&self) -> u64 {
        self.total_fence_waits
    }

    /// Device the arenas live on
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }
}

impl<D: GraphicsDevice> Drop for FrameResources<D> {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            log::error!("Failed to wait for in-flight frames before release: {e}");
        }
    }
}
