//! Drift Runtime
//!
//! Opens a window and drives the bouncing planes once per redraw.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use drift_core::math::Vec3;
use drift_metrics::{Counter, FrameTimer};
use drift_render::window::{create_event_loop, window_attributes, WindowConfig};
use drift_render::{Camera, DriverConfig, FrameDriver, RenderError, WgpuDevice};
use drift_services::Settings;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::{Window, WindowId},
};

struct App {
    settings: Settings,
    seed: u64,
    window: Option<Arc<Window>>,
    driver: Option<FrameDriver<WgpuDevice>>,
    timer: FrameTimer,
    counters: Counter,
    /// Fatal error raised inside the event loop, returned from `main`.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(settings: Settings, seed: u64) -> Self {
        Self {
            settings,
            seed,
            window: None,
            driver: None,
            timer: FrameTimer::new(120),
            counters: Counter::new(),
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = WindowConfig {
            title: self.settings.window.title.clone(),
            width: self.settings.window.width,
            height: self.settings.window.height,
        };
        let window = Arc::new(
            event_loop
                .create_window(window_attributes(&window_config))
                .context("creating window")?,
        );

        let size = window.inner_size();
        let device = pollster::block_on(WgpuDevice::new(window.clone()))
            .context("initializing GPU device")?;
        let config = driver_config(&self.settings, self.seed, (size.width, size.height));
        let driver = FrameDriver::new(device, config).context("building frame driver")?;

        info!(
            planes = driver.planes().len(),
            width = size.width,
            height = size.height,
            "renderer started"
        );

        self.window = Some(window);
        self.driver = Some(driver);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        self.timer.begin();
        let result = driver.render_frame();
        self.timer.end();

        match result {
            Ok(report) if report.presented => self.counters.increment("presented"),
            Ok(_) => self.counters.increment("dropped"),
            Err(RenderError::Timeout { waited }) => {
                warn!(?waited, "frame skipped");
                self.counters.increment("timed_out");
            }
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        }

        let interval = self.settings.frame.fps_log_interval;
        if drift_metrics::ENABLED && interval > 0 && self.timer.frames() % interval == 0 {
            let (min_ms, max_ms) = self.timer.frame_time_range_ms();
            info!(
                fps = self.timer.fps(),
                frame_ms = self.timer.frame_time_ms(),
                min_ms,
                max_ms,
                presented = self.counters.get("presented"),
                dropped = self.counters.get("dropped"),
                timed_out = self.counters.get("timed_out"),
                "frame stats"
            );
        }
    }

    fn log_summary(&self) {
        let Some(driver) = self.driver.as_ref() else {
            return;
        };
        info!(
            generations = driver.generation(),
            steps = driver.simulation().steps(),
            simulated = ?driver.simulation().nominal_elapsed(),
            "shutting down"
        );
        for (phase, total) in driver.profiler().iter() {
            debug!(phase, ?total, "phase time");
        }
        for (name, count) in self.counters.iter() {
            debug!(name, count, "frame count");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.start(event_loop) {
                self.fail(event_loop, err);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                self.log_summary();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(driver) = self.driver.as_mut() {
                    driver.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn driver_config(settings: &Settings, seed: u64, size: (u32, u32)) -> DriverConfig {
    let simulation = &settings.simulation;
    let camera = &settings.camera;
    DriverConfig {
        plane_count: simulation.plane_count,
        plane_scale: simulation.plane_scale,
        alpha: simulation.alpha,
        motion: settings.motion_params(),
        seed,
        camera: Camera {
            eye: Vec3::from_array(camera.eye),
            target: Vec3::from_array(camera.target),
            up: Vec3::from_array(camera.up),
        },
        fovy_degrees: camera.fov_degrees,
        near_z: camera.near,
        far_z: camera.far,
        light_position: Vec3::from_array(camera.light_position),
        acquire_timeout: Duration::from_millis(settings.frame.acquire_timeout_ms),
        initial_size: size,
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Drift v{}", drift_core::VERSION);

    let settings = Settings::from_env().context("loading settings")?;
    let seed = settings.simulation.seed.unwrap_or_else(clock_seed);
    info!(seed, planes = settings.simulation.plane_count, "simulation configured");

    let event_loop = create_event_loop()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(settings, seed);
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_default_driver_config() {
        let config = driver_config(&Settings::default(), 9, (1280, 720));
        let reference = DriverConfig::default();

        assert_eq!(config.plane_count, reference.plane_count);
        assert_eq!(config.plane_scale, reference.plane_scale);
        assert_eq!(config.alpha, reference.alpha);
        assert_eq!(config.motion, reference.motion);
        assert_eq!(config.camera, reference.camera);
        assert_eq!(config.fovy_degrees, reference.fovy_degrees);
        assert_eq!(config.near_z, reference.near_z);
        assert_eq!(config.far_z, reference.far_z);
        assert_eq!(config.light_position, reference.light_position);
        assert_eq!(config.acquire_timeout, reference.acquire_timeout);
        assert_eq!(config.initial_size, reference.initial_size);
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn camera_settings_flow_into_driver() {
        let mut settings = Settings::default();
        settings.camera.eye = [0.0, 2.0, 10.0];
        settings.frame.acquire_timeout_ms = 250;

        let config = driver_config(&settings, 0, (800, 600));
        assert_eq!(config.camera.eye, Vec3::new(0.0, 2.0, 10.0));
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.initial_size, (800, 600));
    }
}
