//! Host-memory backend
//!
//! Stands in for a GPU in headless runs and tests. Buffers are plain heap
//! allocations (trivially "coherent"), submissions are numbered, and the
//! simulated device finishes them `latency` submissions behind the
//! producer. Waiting on an unfinished submission lets the device catch up
//! and is counted as a stall.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::collections::HashMap;
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::render::backend::{
    BufferUsage, DeviceError, DeviceLimits, DeviceResult, DrawRecorder, GraphicsDevice, IndexFormat,
    UniformSlot,
};

/// Host buffer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostBufferId(u64);

/// Submission number used as a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionId(u64);

impl SubmissionId {
    /// Raw submission number
    pub const fn value(self) -> u64 {
        self.0
    }
}

struct HostBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    size: u64,
    usage: BufferUsage,
    mapped: bool,
}

// SAFETY: the allocation is exclusively owned by the buffer table entry.
unsafe impl Send for HostBuffer {}

#[derive(Default)]
struct HostState {
    buffers: HashMap<u64, HostBuffer>,
    next_buffer: u64,
    allocated_bytes: u64,
    submitted: u64,
    completed: u64,
    fence_waits: u64,
}

/// Heap-backed [`GraphicsDevice`]
pub struct HostDevice {
    limits: DeviceLimits,
    latency: u64,
    memory_budget: Option<u64>,
    state: Mutex<HostState>,
}

impl HostDevice {
    /// Create a device reporting `min_uniform_alignment` as its offset alignment
    pub fn new(min_uniform_alignment: u64) -> Self {
        Self {
            limits: DeviceLimits {
                min_uniform_buffer_offset_alignment: min_uniform_alignment,
            },
            latency: 0,
            memory_budget: None,
            state: Mutex::new(HostState::default()),
        }
    }

    /// Keep up to `frames` submissions executing behind the producer
    #[must_use]
    pub fn with_latency(mut self, frames: u64) -> Self {
        self.latency = frames;
        self
    }

    /// Fail allocations once `bytes` are outstanding
    #[must_use]
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Submit recorded work, returning its fence
    pub fn submit(&self) -> SubmissionId {
        let mut state = self.state.lock();
        state.submitted += 1;
        let finished = state.submitted.saturating_sub(self.latency);
        state.completed = state.completed.max(finished);
        SubmissionId(state.submitted)
    }

    /// Let the device finish everything submitted so far
    pub fn complete_all(&self) {
        let mut state = self.state.lock();
        state.completed = state.submitted;
    }

    /// Most recent finished submission
    pub fn completed(&self) -> SubmissionId {
        SubmissionId(self.state.lock().completed)
    }

    /// Number of waits that had to block
    pub fn fence_waits(&self) -> u64 {
        self.state.lock().fence_waits
    }

    /// Live buffers
    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Bytes held by live buffers
    pub fn allocated_bytes(&self) -> u64 {
        self.state.lock().allocated_bytes
    }

    /// Usage flags of a live buffer
    pub fn buffer_usage(&self, buffer: HostBufferId) -> Option<BufferUsage> {
        self.state.lock().buffers.get(&buffer.0).map(|b| b.usage)
    }

    fn allocation_layout(&self, size: u64) -> DeviceResult<Layout> {
        let out_of_memory = || DeviceError::OutOfMemory { requested: size };
        let bytes = usize::try_from(size.max(1)).map_err(|_| out_of_memory())?;
        let align = usize::try_from(self.limits.min_uniform_buffer_offset_alignment.max(16))
            .map_err(|_| out_of_memory())?;
        Layout::from_size_align(bytes, align).map_err(|_| out_of_memory())
    }
}

impl GraphicsDevice for HostDevice {
    type Buffer = HostBufferId;
    type Fence = SubmissionId;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn allocate_coherent_buffer(&self, size: u64, usage: BufferUsage) -> DeviceResult<Self::Buffer> {
        let mut state = self.state.lock();
        if let Some(budget) = self.memory_budget {
            if state.allocated_bytes.saturating_add(size) > budget {
                return Err(DeviceError::OutOfMemory { requested: size });
            }
        }

        let layout = self.allocation_layout(size)?;
        // SAFETY: layout has non-zero size.
        let ptr = NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
            .ok_or(DeviceError::OutOfMemory { requested: size })?;

        let id = state.next_buffer;
        state.next_buffer += 1;
        state.allocated_bytes += size;
        state.buffers.insert(id, HostBuffer { ptr, layout, size, usage, mapped: false });

        log::trace!("Host buffer {id}: {size} bytes, {usage:?}");
        Ok(HostBufferId(id))
    }

    fn map_persistent(&self, buffer: Self::Buffer) -> DeviceResult<NonNull<u8>> {
        let mut state = self.state.lock();
        let entry = state.buffers.get_mut(&buffer.0).ok_or(DeviceError::UnknownBuffer)?;
        if entry.mapped {
            return Err(DeviceError::AlreadyMapped);
        }
        entry.mapped = true;
        Ok(entry.ptr)
    }

    fn unmap(&self, buffer: Self::Buffer) {
        if let Some(entry) = self.state.lock().buffers.get_mut(&buffer.0) {
            entry.mapped = false;
        }
    }

    fn destroy_buffer(&self, buffer: Self::Buffer) {
        let mut state = self.state.lock();
        match state.buffers.remove(&buffer.0) {
            Some(entry) => {
                state.allocated_bytes -= entry.size;
                // SAFETY: allocated in allocate_coherent_buffer with this layout.
                unsafe { std::alloc::dealloc(entry.ptr.as_ptr(), entry.layout) };
            }
            None => log::warn!("Destroying unknown host buffer {}", buffer.0),
        }
    }

    fn is_fence_signaled(&self, fence: Self::Fence) -> DeviceResult<bool> {
        Ok(fence.0 <= self.state.lock().completed)
    }

    fn wait_for_fence(&self, fence: Self::Fence) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if fence.0 > state.completed {
            state.completed = fence.0;
            state.fence_waits += 1;
        }
        Ok(())
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.buffers.is_empty() {
            log::warn!("Host device dropped with {} live buffers", state.buffers.len());
        }
        for (_, entry) in state.buffers.drain() {
            // SAFETY: allocated in allocate_coherent_buffer with this layout.
            unsafe { std::alloc::dealloc(entry.ptr.as_ptr(), entry.layout) };
        }
    }
}

/// One recorded command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Uniform range bound to a slot
    BindUniform {
        /// Target slot
        slot: UniformSlot,
        /// Source buffer
        buffer: HostBufferId,
        /// Dynamic byte offset
        offset: u64,
        /// Bound size in bytes
        range: u64,
    },
    /// Vertex buffer bound
    BindVertexBuffer {
        /// Source buffer
        buffer: HostBufferId,
        /// Byte offset
        offset: u64,
    },
    /// Index buffer bound
    BindIndexBuffer {
        /// Source buffer
        buffer: HostBufferId,
        /// Byte offset
        offset: u64,
        /// Index width
        format: IndexFormat,
    },
    /// Indexed draw issued
    DrawIndexed {
        /// Indices to draw
        index_count: u32,
        /// First index in the shared index buffer
        start_index: u32,
        /// Value added to each index
        base_vertex: i32,
    },
}

/// [`DrawRecorder`] that keeps a command list
#[derive(Debug, Default)]
pub struct HostRecorder {
    commands: Vec<DrawCommand>,
}

impl HostRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands in recording order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Number of indexed draws recorded
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawIndexed { .. }))
            .count()
    }

    /// Forget everything recorded so far
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl DrawRecorder for HostRecorder {
    type Buffer = HostBufferId;

    fn bind_uniform_range(
        &mut self,
        slot: UniformSlot,
        buffer: Self::Buffer,
        offset: u64,
        range: u64,
    ) -> DeviceResult<()> {
        self.commands.push(DrawCommand::BindUniform { slot, buffer, offset, range });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: Self::Buffer, offset: u64) {
        self.commands.push(DrawCommand::BindVertexBuffer { buffer, offset });
    }

    fn bind_index_buffer(&mut self, buffer: Self::Buffer, offset: u64, format: IndexFormat) {
        self.commands.push(DrawCommand::BindIndexBuffer { buffer, offset, format });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.commands.push(DrawCommand::DrawIndexed { index_count, start_index, base_vertex });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_controls_completion() {
        let device = HostDevice::new(256).with_latency(2);

        let first = device.submit();
        let second = device.submit();
        assert!(!device.is_fence_signaled(first).expect("query"));

        let third = device.submit();
        assert!(device.is_fence_signaled(first).expect("query"));
        assert!(!device.is_fence_signaled(second).expect("query"));
        assert!(!device.is_fence_signaled(third).expect("query"));
        assert_eq!(device.completed(), first);

        device.complete_all();
        assert!(device.is_fence_signaled(third).expect("query"));
        assert_eq!(device.completed(), third);
    }

    #[test]
    fn test_wait_counts_only_blocking_waits() {
        let device = HostDevice::new(256).with_latency(1);
        let first = device.submit();
        let second = device.submit();

        device.wait_for_fence(first).expect("wait");
        assert_eq!(device.fence_waits(), 0);

        device.wait_for_fence(second).expect("wait");
        assert_eq!(device.fence_waits(), 1);
        assert!(device.is_fence_signaled(second).expect("query"));
    }

    #[test]
    fn test_double_map_is_rejected() {
        let device = HostDevice::new(256);
        let buffer = device.allocate_coherent_buffer(64, BufferUsage::UNIFORM).expect("buffer");

        device.map_persistent(buffer).expect("first map");
        assert!(matches!(device.map_persistent(buffer), Err(DeviceError::AlreadyMapped)));

        device.unmap(buffer);
        device.map_persistent(buffer).expect("map after unmap");
        device.unmap(buffer);
        device.destroy_buffer(buffer);
        assert!(matches!(device.map_persistent(buffer), Err(DeviceError::UnknownBuffer)));
    }

    #[test]
    fn test_allocations_are_zeroed_and_aligned() {
        let device = HostDevice::new(256);
        let buffer = device.allocate_coherent_buffer(512, BufferUsage::UNIFORM).expect("buffer");
        let ptr = device.map_persistent(buffer).expect("map");

        assert_eq!(ptr.as_ptr() as usize % 256, 0);
        // SAFETY: the mapping covers 512 bytes until destroy_buffer.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 512) };
        assert!(bytes.iter().all(|&b| b == 0));

        device.unmap(buffer);
        device.destroy_buffer(buffer);
    }

    #[test]
    fn test_recorder_counts_draws_until_cleared() {
        let device = HostDevice::new(256);
        let vertices = device.allocate_coherent_buffer(64, BufferUsage::VERTEX).expect("buffer");
        let mut recorder = HostRecorder::new();

        recorder.bind_vertex_buffer(vertices, 0);
        recorder.draw_indexed(36, 0, 0);
        recorder.draw_indexed(6, 36, 24);
        assert_eq!(recorder.commands().len(), 3);
        assert_eq!(recorder.draw_count(), 2);

        recorder.clear();
        assert!(recorder.commands().is_empty());
        assert_eq!(recorder.draw_count(), 0);
        device.destroy_buffer(vertices);
    }
}
