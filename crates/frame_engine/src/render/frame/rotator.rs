//! Frame-slot rotation
//!
//! Picks which slot of the uniform arenas the producer may overwrite this
//! tick. The slot index comes back inside a [`FrameContext`] that is passed
//! explicitly to every update and draw call of the frame.

use crate::render::error::{FrameResourceError, FrameResult};

/// Identifies one logical frame tick and the slot it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameContext {
    frame_index: usize,
    frame_number: u64,
}

impl FrameContext {
    /// Slot index in `0..frame_slot_count`
    pub const fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Monotonic tick number, starting at 1 for the first frame
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

/// Cycles through `frame_slot_count` slots, one per frame in flight
#[derive(Debug, Clone)]
pub struct FrameSlotRotator {
    current_index: usize,
    frame_slot_count: usize,
    frame_number: u64,
}

impl FrameSlotRotator {
    /// Start at slot 0 with no frame begun
    pub fn new(frame_slot_count: usize) -> FrameResult<Self> {
        if frame_slot_count == 0 {
            return Err(FrameResourceError::ZeroFrameSlots);
        }
        if frame_slot_count == 1 {
            log::warn!("Single frame slot: every frame waits for the previous one to finish on the GPU");
        }
        Ok(Self {
            current_index: 0,
            frame_slot_count,
            frame_number: 0,
        })
    }

    /// Move to the next slot; called once per tick before any writes
    pub fn advance(&mut self) -> FrameContext {
        self.current_index = (self.current_index + 1) % self.frame_slot_count;
        self.frame_number += 1;
        self.current()
    }

    /// Context of the active tick
    pub const fn current(&self) -> FrameContext {
        FrameContext {
            frame_index: self.current_index,
            frame_number: self.frame_number,
        }
    }

    /// Active slot index
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Number of slots
    pub const fn frame_slot_count(&self) -> usize {
        self.frame_slot_count
    }

    /// Reject contexts from earlier ticks
    pub fn ensure_current(&self, ctx: FrameContext) -> FrameResult<()> {
        if ctx.frame_number != self.frame_number || ctx.frame_index != self.current_index {
            return Err(FrameResourceError::StaleFrameContext {
                stale: ctx.frame_number,
                current: self.frame_number,
            });
        }
        Ok(())
    }
}
