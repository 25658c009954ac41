//! Desktop host for the Vista placement engine.
//!
//! Runs the engine against the simulated XR runtime: the mouse cursor plays
//! the part of the device's hit test against a floor plane at y = 0, a left
//! click is the select trigger, and the egui button enters and leaves AR.
//!
//! Environment:
//! - `VISTA_CONFIG`: JSON engine config (defaults otherwise)
//! - `VISTA_ASSET_ROOT`: directory the catalog's OBJ paths resolve against
//! - `VISTA_DEMO_MODELS`: if set, place generated boxes instead of loading files

use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use vista_core::assets::{MemoryLoader, ObjLoader};
use vista_core::{Material, Mesh, ModelNode};
use vista_math::{Plane, Pose, Quat, Vec3};
use vista_render::Renderer;
use vista_xr::sim::{SimFrame, SimRuntime};
use vista_xr::{EngineConfig, FrameDriver, LightEstimate, SessionState};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

/// Standing eye height of the simulated viewer, in metres
const EYE_HEIGHT: f32 = 1.6;

/// Downward tilt of the simulated viewer, in radians
const VIEW_PITCH: f32 = -0.45;

type Driver = FrameDriver<SimRuntime, Renderer>;

/// Application state
struct App {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    driver: Option<Driver>,

    // Input state
    cursor: Option<(f64, f64)>,
    started: Instant,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            driver: None,
            cursor: None,
            started: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Vista")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // Initialize renderer (async in pollster block)
        let renderer = pollster::block_on(Renderer::new(window.clone()))?;

        let mut driver = FrameDriver::new(SimRuntime::new(), renderer, self.config.clone());
        let size = window.inner_size();
        driver.resize(size.width, size.height);
        start_preload(&mut driver);
        driver.check_support();

        self.window = Some(window);
        self.driver = Some(driver);
        log::info!("Window and renderer initialized");
        Ok(())
    }

    /// Simulated device frame: the viewer pose plus a floor hit under the cursor.
    fn sim_frame(&self, driver: &Driver, size: (u32, u32)) -> Option<SimFrame> {
        if driver.session_state() != SessionState::Active {
            return None;
        }

        let viewer = Pose::new(Vec3::new(0.0, EYE_HEIGHT, 0.0), Quat::from_rotation_x(VIEW_PITCH));
        let mut frame = SimFrame::empty().with_viewer(viewer).with_light(room_light());

        if let Some((x, y)) = self.cursor {
            let ndc_x = (2.0 * x / f64::from(size.0) - 1.0) as f32;
            let ndc_y = (1.0 - 2.0 * y / f64::from(size.1)) as f32;
            let ray = driver.camera().ray_through_ndc(ndc_x, ndc_y);

            let floor = Plane::horizontal(0.0);
            if let Some(t) = floor.intersect(&ray) {
                frame = frame.push_hit(Some(Pose::new(ray.at(t), floor.orientation())));
            }
        }

        Some(frame)
    }

    fn redraw(&mut self) {
        let (Some(window), Some(driver)) = (self.window.clone(), self.driver.as_ref()) else {
            return;
        };
        let size = driver.target().size();
        let frame = self.sim_frame(driver, size);

        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        let state = driver.session_state();
        let status = driver.status_message();
        let loaded = driver.assets().loaded_count();
        let total = driver.assets().len();
        let failures: Vec<String> = driver.asset_failures().iter().map(ToString::to_string).collect();
        let mut toggle = false;

        driver.target_mut().overlay_mut().run(&window, size, |ctx| {
            egui::Window::new("Vista")
                .default_pos([16.0, 16.0])
                .resizable(false)
                .show(ctx, |ui| {
                    match state {
                        SessionState::Active => toggle |= ui.button("Exit AR").clicked(),
                        SessionState::Inactive => toggle |= ui.button("Enter AR").clicked(),
                        SessionState::Requesting => {
                            ui.add_enabled(false, egui::Button::new("Starting..."));
                        }
                        SessionState::Unchecked | SessionState::Checking => {
                            ui.label("Checking AR support...");
                        }
                        SessionState::Unsupported => {
                            ui.label("AR not supported");
                        }
                    }
                    ui.label(format!("Models: {}/{}", loaded, total));
                    for failure in &failures {
                        ui.small(failure);
                    }
                    if let Some(status) = &status {
                        ui.separator();
                        ui.label(status);
                    }
                });
        });

        if toggle {
            match state {
                SessionState::Active => driver.exit_ar(),
                _ => {
                    if let Err(err) = driver.enter_ar() {
                        log::warn!("Enter AR refused: {}", err);
                    }
                }
            }
        }

        let timestamp = self.started.elapsed().as_secs_f64() * 1000.0;
        driver.tick(timestamp, frame.as_ref());
        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.init(event_loop) {
                log::error!("Failed to initialize viewer: {:#}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        // Let egui handle the event first
        if let (Some(window), Some(driver)) = (&self.window, &mut self.driver) {
            if driver.target_mut().overlay_mut().handle_event(window, &event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                if let Some(driver) = &mut self.driver {
                    driver.exit_ar();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(driver) = &mut self.driver {
                    driver.resize(physical_size.width, physical_size.height);
                    log::info!("Resized to {}x{}", physical_size.width, physical_size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some((position.x, position.y));
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                if let Some(driver) = &mut self.driver {
                    if driver.target().overlay().wants_pointer() {
                        return;
                    }
                    if let Some(placement) = driver.on_select() {
                        log::debug!("Select placed '{}'", placement.id);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if let Some(driver) = &mut self.driver {
                    driver.exit_ar();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Simulated indoor lighting: warm ceiling light above a dim room.
fn room_light() -> LightEstimate {
    LightEstimate {
        ambient: Vec3::splat(0.35),
        primary_color: Vec3::new(1.0, 0.95, 0.85),
        primary_intensity: 0.9,
        primary_direction: Vec3::new(0.3, 1.0, 0.2),
    }
}

/// Start the catalog preload with the loader the environment selects.
fn start_preload(driver: &mut Driver) {
    if std::env::var_os("VISTA_DEMO_MODELS").is_some() {
        let mut loader = MemoryLoader::new();
        for (i, entry) in driver.config().catalog.iter().enumerate() {
            loader = loader.with_model(entry.source.clone(), demo_model(i));
        }
        log::info!("Using generated demo models");
        driver.preload(Rc::new(loader));
    } else {
        let root = std::env::var("VISTA_ASSET_ROOT").unwrap_or_else(|_| ".".to_string());
        log::info!("Loading models from {}", root);
        driver.preload(Rc::new(ObjLoader::new(root)));
    }
}

/// Box of varying proportions and colour.
fn demo_model(index: usize) -> ModelNode {
    let shapes = [
        (Vec3::new(0.6, 1.0, 0.6), Vec3::new(0.85, 0.45, 0.25)),
        (Vec3::new(2.0, 0.8, 0.9), Vec3::new(0.3, 0.5, 0.8)),
        (Vec3::new(0.5, 0.5, 0.5), Vec3::new(0.4, 0.75, 0.35)),
    ];
    let (size, color) = shapes[index % shapes.len()];

    let mesh = Mesh::cuboid(size);
    let body = ModelNode::with_mesh("body", Arc::new(mesh), Some(Arc::new(Material::new("demo", color))));

    let mut root = ModelNode::group(format!("demo_{}", index));
    root.add_child(body);
    root
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting Vista viewer");

    let config = match std::env::var("VISTA_CONFIG") {
        Ok(path) => EngineConfig::load(path)?,
        Err(_) => EngineConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
