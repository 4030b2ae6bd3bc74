//! # Frame Engine
//!
//! Per-frame GPU resource management for explicit graphics APIs.
//!
//! ## Features
//!
//! - **Frame slots**: N copies of all uniform data so the CPU can record
//!   frame N+1 while the GPU still reads frame N
//! - **Persistent mapping**: uniform arenas are allocated and mapped once,
//!   never per frame
//! - **Dirty tracking**: a changed transform is written into each slot once,
//!   then costs nothing
//! - **Dynamic offsets**: one descriptor set per uniform kind, a new byte
//!   offset per draw
//! - **Backends**: Vulkan through `ash`, and a host-memory device for
//!   headless runs and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frame_engine::prelude::*;
//!
//! fn main() -> Result<(), FrameResourceError> {
//!     let device = Arc::new(HostDevice::new(256));
//!     let config = FrameResourceConfig::default();
//!     let mut resources = FrameResources::new(device.clone(), &config)?;
//!
//!     let ctx = resources.on_frame_begin()?;
//!     resources.update_pass_constants(ctx, &PassConstants::default())?;
//!     let mut recorder = HostRecorder::new();
//!     resources.record_draws(ctx, &mut recorder)?;
//!     resources.end_frame(ctx, device.submit())?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, FrameResourceConfig},
        foundation::{
            math::{Mat4, Mat4Ext, Vec3},
            time::Timer,
        },
        render::{
            backends::{HostDevice, HostRecorder},
            scene::shapes,
            DrawRecorder, FrameContext, FrameResourceError, FrameResources, FrameResult, FrameStats,
            GeometryLayout, GraphicsDevice, MeshGeometry, MeshHandle, OrbitCamera, PassConstants,
        },
    };
}
