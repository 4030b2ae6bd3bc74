//! Scoped device buffers
//!
//! Memory management following RAII patterns: the buffer is released when the
//! guard drops, and the guard keeps its device alive until then.

use std::sync::Arc;

use crate::render::backend::{BufferUsage, DeviceResult, GraphicsDevice};

/// Buffer wrapper with automatic cleanup
pub struct DeviceBuffer<D: GraphicsDevice> {
    device: Arc<D>,
    buffer: D::Buffer,
    size: u64,
    usage: BufferUsage,
}

impl<D: GraphicsDevice> DeviceBuffer<D> {
    /// Allocate a coherent buffer
    pub fn new(device: Arc<D>, size: u64, usage: BufferUsage) -> DeviceResult<Self> {
        let buffer = device.allocate_coherent_buffer(size, usage)?;
        Ok(Self {
            device,
            buffer,
            size,
            usage,
        })
    }

    /// Get buffer handle
    pub fn handle(&self) -> D::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get usage flags
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl<D: GraphicsDevice> Drop for DeviceBuffer<D> {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::host::HostDevice;

    #[test]
    fn test_buffer_released_on_drop() {
        let device = Arc::new(HostDevice::new(256));
        let vertices = DeviceBuffer::new(device.clone(), 1024, BufferUsage::VERTEX).expect("vertex buffer");
        let indices = DeviceBuffer::new(device.clone(), 512, BufferUsage::INDEX).expect("index buffer");

        assert_ne!(vertices.handle(), indices.handle());
        assert_eq!(device.buffer_usage(indices.handle()), Some(BufferUsage::INDEX));
        assert_eq!(device.buffer_count(), 2);

        drop(vertices);
        assert_eq!(device.buffer_count(), 1);
        drop(indices);
        assert_eq!(device.buffer_count(), 0);
    }
}
