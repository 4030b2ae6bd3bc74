//! Frame-level state: slot rotation, pass constants and the camera that feeds them

pub mod camera;
pub mod pass;
pub mod rotator;

pub use camera::OrbitCamera;
pub use pass::{PassConstants, PassParameters};
pub use rotator::{FrameContext, FrameSlotRotator};
