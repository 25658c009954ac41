//! egui overlay drawn on top of the scene (AR button, status text).
//!
//! The host builds the UI with [`Overlay::run`] before ticking the engine;
//! the tessellated output is painted by the next `render` call.

use winit::window::Window;

struct PreparedUi {
    paint_jobs: Vec<egui::ClippedPrimitive>,
    textures: egui::TexturesDelta,
    screen: egui_wgpu::ScreenDescriptor,
}

pub struct Overlay {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    prepared: Option<PreparedUi>,
}

impl Overlay {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, window: &Window) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None, // max_texture_side (use default)
        );

        let renderer = egui_wgpu::Renderer::new(
            device, format, None, // No depth testing for egui
            1, false, // allow_srgb_render_target
        );

        log::info!("egui initialized");

        Self {
            ctx,
            state,
            renderer,
            prepared: None,
        }
    }

    /// Returns true if egui consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Does egui want the pointer (hovering a widget)?
    pub fn wants_pointer(&self) -> bool {
        self.ctx.wants_pointer_input()
    }

    /// Build this frame's UI.
    pub fn run(&mut self, window: &Window, size: (u32, u32), build: impl FnMut(&egui::Context)) {
        let raw_input = self.state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, build);

        self.state.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self.ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        self.prepared = Some(PreparedUi {
            paint_jobs,
            textures: full_output.textures_delta,
            screen: egui_wgpu::ScreenDescriptor {
                size_in_pixels: [size.0, size.1],
                pixels_per_point: window.scale_factor() as f32,
            },
        });
    }

    /// Paint the prepared UI over `view`. No-op if nothing was prepared.
    pub(crate) fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        let Some(ui) = self.prepared.take() else {
            return;
        };

        for (id, image_delta) in &ui.textures.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        self.renderer
            .update_buffers(device, queue, encoder, &ui.paint_jobs, &ui.screen);

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime(); // egui renderer needs a 'static pass

            self.renderer.render(&mut egui_pass, &ui.paint_jobs, &ui.screen);
        }

        for id in &ui.textures.free {
            self.renderer.free_texture(id);
        }
    }
}
