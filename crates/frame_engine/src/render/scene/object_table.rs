//! Dirty-tracked object table
//!
//! Holds the CPU copy of every render item's transform. Each frame slot has
//! its own copy of the object constants, so a changed transform has to be
//! written once per slot before the change has fully landed. Every change
//! marks all of an item's slots stale, and [`ObjectTable::flush`] clears
//! only the slot it actually wrote. A tick that never flushes leaves its
//! slot stale until the rotation comes back to it.

use crate::foundation::math::Mat4;
use crate::render::backend::GraphicsDevice;
use crate::render::error::{FrameResourceError, FrameResult};
use crate::render::resources::UniformArena;
use crate::render::scene::mesh::{MeshHandle, SubmeshGeometry};
use crate::render::scene::object_data::ObjectConstants;
use crate::render::scene::render_item::{DirtyState, RenderItem};

/// Render items indexed by their permanent object index
#[derive(Debug, Clone)]
pub struct ObjectTable {
    items: Vec<RenderItem>,
    capacity: usize,
    frame_slot_count: usize,
}

impl ObjectTable {
    /// Empty table reserving `capacity` object indices
    pub fn new(capacity: usize, frame_slot_count: usize) -> FrameResult<Self> {
        if capacity == 0 {
            return Err(FrameResourceError::ZeroCapacity);
        }
        if frame_slot_count == 0 {
            return Err(FrameResourceError::ZeroFrameSlots);
        }
        Ok(Self {
            items: Vec::with_capacity(capacity),
            capacity,
            frame_slot_count,
        })
    }

    /// Register an item under the next free object index
    ///
    /// Indices are handed out in insertion order and never reused. New items
    /// start dirty in every slot.
    pub fn insert(&mut self, world: Mat4, mesh: MeshHandle, draw: SubmeshGeometry) -> FrameResult<usize> {
        let object_index = self.items.len();
        if object_index >= self.capacity {
            return Err(FrameResourceError::CapacityExceeded { capacity: self.capacity });
        }
        self.items.push(RenderItem::new(object_index, world, mesh, draw, self.frame_slot_count));
        Ok(object_index)
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<&RenderItem> {
        self.items.get(index)
    }

    /// Items in submission order
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.items.iter()
    }

    /// Registered items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No items registered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reserved object indices
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots each change must reach
    pub fn frame_slot_count(&self) -> usize {
        self.frame_slot_count
    }

    /// Replace an item's transform and schedule it for every slot
    pub fn set_world_transform(&mut self, index: usize, world: Mat4) -> FrameResult<()> {
        let frame_slot_count = self.frame_slot_count;
        self.item_mut(index)?.set_world_transform(world, frame_slot_count);
        Ok(())
    }

    /// Schedule an item's current transform for every slot
    pub fn mark_dirty(&mut self, index: usize) -> FrameResult<()> {
        let frame_slot_count = self.frame_slot_count;
        self.item_mut(index)?.mark_dirty(frame_slot_count);
        Ok(())
    }

    /// Propagation state of one item
    pub fn state(&self, index: usize) -> FrameResult<DirtyState> {
        Ok(self.item(index)?.dirty_state(self.frame_slot_count))
    }

    /// Items with at least one stale slot
    pub fn dirty_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_dirty()).count()
    }

    /// Write every item stale in `frame_index` into that slot of `arena`
    ///
    /// Returns the number of elements written. The frame index is checked
    /// before anything is written.
    pub fn flush<D: GraphicsDevice>(
        &mut self,
        frame_index: usize,
        arena: &mut UniformArena<D>,
    ) -> FrameResult<usize> {
        arena.slot_offset(frame_index)?;

        let mut writes = 0;
        for item in self.items.iter_mut().filter(|item| item.is_stale_in(frame_index)) {
            let constants = ObjectConstants::from_world(item.world_transform());
            arena.write(frame_index, item.object_index(), &constants)?;
            item.slot_written(frame_index);
            writes += 1;
        }

        if writes > 0 {
            log::trace!("Flushed {writes} object constants into frame slot {frame_index}");
        }
        Ok(writes)
    }

    fn check_index(&self, index: usize) -> FrameResult<()> {
        if index >= self.capacity {
            return Err(FrameResourceError::ObjectIndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        if index >= self.items.len() {
            return Err(FrameResourceError::UnregisteredObject { index });
        }
        Ok(())
    }

    fn item(&self, index: usize) -> FrameResult<&RenderItem> {
        self.check_index(index)?;
        Ok(&self.items[index])
    }

    fn item_mut(&mut self, index: usize) -> FrameResult<&mut RenderItem> {
        self.check_index(index)?;
        Ok(&mut self.items[index])
    }
}
