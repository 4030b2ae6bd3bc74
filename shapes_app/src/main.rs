//! Shapes demo application
//!
//! Runs the frame loop over the static shapes scene on the host backend:
//! an orbiting camera, a bobbing box and a simulated GPU that finishes work
//! a configurable number of frames behind the CPU.

use std::sync::Arc;

use frame_engine::config::{Config, ConfigError, FrameResourceConfig};
use frame_engine::foundation::logging;
use frame_engine::foundation::math::{Mat4, Mat4Ext};
use frame_engine::foundation::time::Timer;
use frame_engine::render::backends::{HostDevice, HostRecorder};
use frame_engine::render::scene::shapes::{self, SHAPES_VERTEX_STRIDE};
use frame_engine::render::{
    BufferUsage, DeviceBuffer, DeviceError, FrameResourceError, FrameResources, IndexFormat, MeshGeometry,
    OrbitCamera, PassConstants,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Demo settings, loadable from a `.toml` or `.ron` file given as the first argument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    frame_resources: FrameResourceConfig,
    frame_count: u32,
    gpu_latency_frames: u64,
    render_width: u32,
    render_height: u32,
    camera_radius: f32,
    orbit_speed: f32,
    animate_box: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frame_resources: FrameResourceConfig::new("Shapes Demo"),
            frame_count: 300,
            gpu_latency_frames: 2,
            render_width: 800,
            render_height: 600,
            camera_radius: 15.0,
            orbit_speed: 0.5,
            animate_box: true,
        }
    }
}

impl Config for DemoConfig {}

#[derive(Error, Debug)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frame resource error: {0}")]
    Frame(#[from] FrameResourceError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

/// Fixed step used instead of wall-clock time so runs are reproducible
const FRAME_STEP: f32 = 1.0 / 60.0;

struct ShapesApp {
    config: DemoConfig,
    // Declared before the geometry buffers so in-flight frames are waited
    // on before the buffers they read are released
    resources: FrameResources<HostDevice>,
    _index_buffer: DeviceBuffer<HostDevice>,
    _vertex_buffer: DeviceBuffer<HostDevice>,
    device: Arc<HostDevice>,
    camera: OrbitCamera,
    recorder: HostRecorder,
    timer: Timer,
    total_stalls: u64,
}

impl ShapesApp {
    fn new(config: DemoConfig) -> Result<Self, AppError> {
        config.frame_resources.validate()?;
        log::info!(
            "Creating shapes demo: {} frame slots, GPU {} frames behind",
            config.frame_resources.frame_slot_count,
            config.gpu_latency_frames
        );

        let device = Arc::new(HostDevice::new(256).with_latency(config.gpu_latency_frames));

        let layout = shapes::shapes_geometry_layout()?;
        let vertex_buffer = DeviceBuffer::new(
            device.clone(),
            u64::from(layout.vertex_count()) * u64::from(SHAPES_VERTEX_STRIDE),
            BufferUsage::VERTEX,
        )?;
        let index_buffer = DeviceBuffer::new(
            device.clone(),
            u64::from(layout.index_count()) * IndexFormat::U16.size_bytes(),
            BufferUsage::INDEX,
        )?;
        log::info!(
            "Shape geometry: {} vertices, {} indices",
            layout.vertex_count(),
            layout.index_count()
        );

        let mut resources = FrameResources::new(device.clone(), &config.frame_resources)?;
        let mesh = resources.register_geometry(MeshGeometry::new(
            "shapes",
            &layout,
            vertex_buffer.handle(),
            index_buffer.handle(),
            SHAPES_VERTEX_STRIDE,
            IndexFormat::U16,
        ));
        shapes::build_shapes_scene(&mut resources, mesh)?;

        let camera = OrbitCamera::new(1.5 * std::f32::consts::PI, 0.2 * std::f32::consts::PI, config.camera_radius);

        Ok(Self {
            config,
            resources,
            _index_buffer: index_buffer,
            _vertex_buffer: vertex_buffer,
            device,
            camera,
            recorder: HostRecorder::new(),
            timer: Timer::new(),
            total_stalls: 0,
        })
    }

    fn run(&mut self) -> Result<(), AppError> {
        log::info!("Running {} frames...", self.config.frame_count);

        for _ in 0..self.config.frame_count {
            self.timer.advance_by(FRAME_STEP);
            self.render_frame()?;
        }

        self.resources.wait_idle()?;
        log::info!(
            "Finished {} frames: {} blocking fence waits, {} simulated FPS",
            self.timer.frame_count(),
            self.total_stalls,
            self.timer.average_fps().round()
        );
        Ok(())
    }

    fn update_scene(&mut self) -> Result<(), AppError> {
        self.camera.rotate(self.config.orbit_speed * self.timer.delta_time(), 0.0);

        if self.config.animate_box {
            let lift = 0.5 * (self.timer.total_time() * 2.0).sin().abs();
            let world = Mat4::translation(0.0, 0.5 + lift, 0.0) * Mat4::scaling(2.0, 2.0, 2.0);
            self.resources.update_object_transform(0, world)?;
        }
        Ok(())
    }

    fn render_frame(&mut self) -> Result<(), AppError> {
        let ctx = self.resources.on_frame_begin()?;

        self.update_scene()?;

        let params = self.camera.pass_parameters(
            self.config.render_width,
            self.config.render_height,
            self.timer.total_time(),
            self.timer.delta_time(),
        );
        self.resources
            .update_pass_constants(ctx, &PassConstants::from_parameters(&params))?;

        self.recorder.clear();
        self.resources.record_draws(ctx, &mut self.recorder)?;

        let fence = self.device.submit();
        let stats = self.resources.end_frame(ctx, fence)?;
        self.total_stalls += u64::from(stats.fence_waits);

        log::debug!(
            "Frame {} (slot {}): {} object writes, {} draws, {} indices, {} fence waits",
            stats.frame_number,
            stats.frame_index,
            stats.object_writes,
            self.recorder.draw_count(),
            stats.indices,
            stats.fence_waits
        );
        Ok(())
    }
}

fn load_config() -> Result<DemoConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            DemoConfig::load_from_file(&path)
        }
        None => Ok(DemoConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    log::info!("Starting Shapes Demo");

    let result = load_config()
        .map_err(AppError::from)
        .and_then(ShapesApp::new)
        .and_then(|mut app| app.run());

    match result {
        Ok(()) => {
            log::info!("Shapes demo finished successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Application error: {e}");
            Err(e.into())
        }
    }
}
