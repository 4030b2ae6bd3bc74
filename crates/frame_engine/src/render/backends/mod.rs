//! Device backends
//!
//! `host` keeps everything in process memory and is what tests and the
//! headless demo run on. `vulkan` drives a real device through `ash`.

pub mod host;
pub mod vulkan;

pub use host::{DrawCommand, HostBufferId, HostDevice, HostRecorder, SubmissionId};
pub use vulkan::{VulkanDevice, VulkanDrawRecorder};
