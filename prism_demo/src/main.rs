//! Prism demo: opens a window and drives the render pass manager with a
//! single composite pass that clears the swapchain image.

use std::sync::Arc;
use std::time::Instant;

use prism_render::glam::{Mat4, Vec3};
use prism_render::prism::log::{set_min_severity, LogSeverity};
use prism_render::prism::parameters::RenderPassParameters;
use prism_render::prism::pass::{CustomAction, PassDesc, PassKind, PrepareInfo, StandardPass};
use prism_render::prism::render::ImageLayout;
use prism_render::prism::scene::FrameDrawLists;
use prism_render::prism::{Error, RenderConfig, RenderContext, RenderPassManager, Result, ViewUniforms};
use prism_render::{engine_error, engine_info, engine_warn};
use prism_render_vulkan::{print_validation_stats_report, VulkanGraphicsDevice};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const CLEAR_COLOR: [f32; 4] = [0.02, 0.03, 0.08, 1.0];

/// Clear-only pass writing the swapchain image
fn composite_pass() -> StandardPass {
    StandardPass::new(
        PassDesc::new("composite", PassKind::Composite),
        |params: &mut RenderPassParameters, _context: &RenderContext, info: &PrepareInfo| -> Result<()> {
            params.add_swapchain_attachment(
                info.swapchain_images.to_vec(),
                ImageLayout::Undefined,
                ImageLayout::PresentSrc,
                true,
            );
            params.set_clear_color(0, CLEAR_COLOR);
            Ok(())
        },
        CustomAction::empty(),
    )
}

/// Everything that lives as long as the window
///
/// The manager is declared first so the swapchain goes before the window.
struct Renderer {
    manager: RenderPassManager,
    window: Arc<Window>,
}

impl Renderer {
    fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let config = RenderConfig {
            app_name: "Prism Demo".to_string(),
            ..RenderConfig::default()
        }
        .with_render_area(size.width.max(1), size.height.max(1));
        set_min_severity(config.log_severity);

        let device = Arc::new(VulkanGraphicsDevice::new(&window, &config)?);
        let swapchain = device.create_swapchain(&window, size.width, size.height)?;
        let context = Arc::new(RenderContext::new(device, config));

        let mut manager = RenderPassManager::new(context, Box::new(swapchain))?;
        manager.add_pass(composite_pass());
        manager.initialize()?;

        Ok(Self { manager, window })
    }

    fn view_uniforms(&self, elapsed: f32, delta: f32) -> ViewUniforms {
        let size = self.window.inner_size();
        let aspect = size.width.max(1) as f32 / size.height.max(1) as f32;
        let eye = Vec3::new(elapsed.cos() * 4.0, 2.0, elapsed.sin() * 4.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 100.0);
        ViewUniforms::new(view, projection, size.width, size.height)
            .with_time(elapsed, delta, self.manager.frame_number())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Err(e) = self.manager.resize(size.width, size.height) {
            engine_error!("prism::demo", "Resize to {}x{} failed: {}", size.width, size.height, e);
        }
    }
}

struct App {
    renderer: Option<Renderer>,
    scene: FrameDrawLists,
    start: Instant,
    last_frame: Instant,
}

impl App {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            renderer: None,
            scene: FrameDrawLists::new(),
            start: now,
            last_frame: now,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        let now = Instant::now();
        let elapsed = now.duration_since(self.start).as_secs_f32();
        let delta = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        let view = renderer.view_uniforms(elapsed, delta);
        match renderer.manager.render_frame(&view, &self.scene) {
            Ok(stats) => {
                if stats.frame_number % 600 == 0 {
                    engine_info!("prism::demo", "Frame {}: {} submissions, {} command lists",
                        stats.frame_number, stats.submissions, stats.command_lists);
                }
            }
            Err(Error::SwapchainOutOfDate) => {
                let size = renderer.window.inner_size();
                engine_warn!("prism::demo", "Swapchain out of date, recreating at {}x{}", size.width, size.height);
                renderer.resize(size);
            }
            Err(e) => {
                engine_error!("prism::demo", "Frame failed: {}", e);
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("Prism Demo")
            .with_inner_size(PhysicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                engine_error!("prism::demo", "Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match Renderer::new(window) {
            Ok(renderer) => {
                engine_info!("prism::demo", "Initialization complete, entering main loop");
                self.renderer = Some(renderer);
            }
            Err(e) => {
                engine_error!("prism::demo", "Failed to create renderer: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                engine_info!("prism::demo", "Close requested, shutting down");
                // Manager and swapchain go before the event loop ends
                self.renderer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref() {
            renderer.window.request_redraw();
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    set_min_severity(LogSeverity::Info);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    print_validation_stats_report();
    Ok(())
}
