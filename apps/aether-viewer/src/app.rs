//! Viewer application state and event handling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

use aether_assets::{create_texture_sampler, load_shader_words, ResourceManager, TextureResource};
use aether_gpu::context::{DeviceContext, DeviceContextBuilder};
use aether_gpu::memory::MemoryManager;
use aether_gpu::surface::SurfaceContext;
use aether_gpu::swapchain::Swapchain;
use aether_platform::{create_window, drawable_size, WindowConfig};
use aether_render::{
    vulkan_projection, Drawable, FrameRenderer, GeometryBuffers, Mesh, SceneUniforms, Vertex,
};

/// Two-triangle quad: 4 vertices, 6 indices.
const QUAD_VERTICES: [Vertex; 4] = [
    Vertex {
        pos: [-0.5, -0.5],
        color: [1.0, 0.0, 0.0],
        uv: [1.0, 0.0],
    },
    Vertex {
        pos: [0.5, -0.5],
        color: [0.0, 1.0, 0.0],
        uv: [0.0, 0.0],
    },
    Vertex {
        pos: [0.5, 0.5],
        color: [0.0, 0.0, 1.0],
        uv: [0.0, 1.0],
    },
    Vertex {
        pos: [-0.5, 0.5],
        color: [1.0, 1.0, 1.0],
        uv: [1.0, 1.0],
    },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Asset paths, overridable from the command line.
#[derive(Debug, Clone)]
pub struct ViewerPaths {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub texture: PathBuf,
}

impl Default for ViewerPaths {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from("assets/shaders/quad.vert.spv"),
            fragment_shader: PathBuf::from("assets/shaders/quad.frag.spv"),
            texture: PathBuf::from("assets/textures/checker.png"),
        }
    }
}

impl ViewerPaths {
    /// Parse `--vert`, `--frag`, and `--texture` overrides.
    fn from_args() -> Self {
        let mut paths = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i + 1 < args.len() {
            match args[i].as_str() {
                "--vert" => paths.vertex_shader = PathBuf::from(&args[i + 1]),
                "--frag" => paths.fragment_shader = PathBuf::from(&args[i + 1]),
                "--texture" => paths.texture = PathBuf::from(&args[i + 1]),
                _ => {
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        paths
    }
}

/// Top-level winit application.
pub struct ViewerApp {
    config: WindowConfig,
    paths: ViewerPaths,
    state: Option<EngineState>,
}

impl ViewerApp {
    pub fn from_args() -> Self {
        Self {
            config: WindowConfig::new("Aether Viewer"),
            paths: ViewerPaths::from_args(),
            state: None,
        }
    }
}

/// Everything with a GPU lifetime, torn down in reverse creation order.
struct EngineState {
    window: Window,
    gpu: DeviceContext,
    surface: SurfaceContext,
    swapchain: Swapchain,
    memory: MemoryManager,
    renderer: FrameRenderer,
    geometry: GeometryBuffers,
    drawables: Vec<Drawable>,
    texture: Arc<TextureResource>,
    sampler: vk::Sampler,
    #[allow(dead_code)]
    resources: ResourceManager,
    start_time: Instant,
}

impl EngineState {
    /// Initialize in the strict order: instance/surface/device, swapchain,
    /// memory manager, renderer, resources.
    fn new(window: Window, paths: &ViewerPaths) -> anyhow::Result<Self> {
        let (gpu, surface) = DeviceContextBuilder::new()
            .app_name("Aether Viewer")
            .build(&window)?;

        let (width, height) = drawable_size(&window);
        let swapchain = unsafe { surface.create_swapchain(&gpu, width, height) }?;
        info!(
            "Swapchain created: {}x{} ({} images)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.image_count()
        );

        let memory = MemoryManager::new(&gpu)?;

        let vertex_shader = load_shader_words(&paths.vertex_shader)?;
        let fragment_shader = load_shader_words(&paths.fragment_shader)?;
        let renderer = FrameRenderer::new(&gpu, &swapchain, &memory, vertex_shader, fragment_shader)?;

        let meshes = [Mesh {
            vertices: &QUAD_VERTICES,
            indices: &QUAD_INDICES,
        }];
        let (geometry, drawables) = GeometryBuffers::upload(&memory, &meshes)?;

        let mut resources = ResourceManager::new();
        let texture = resources.load_texture(&gpu, &memory, &paths.texture)?;
        let sampler = create_texture_sampler(&gpu)?;
        renderer.set_texture(&gpu, texture.view, sampler)?;

        Ok(Self {
            window,
            gpu,
            surface,
            swapchain,
            memory,
            renderer,
            geometry,
            drawables,
            texture,
            sampler,
            resources,
            start_time: Instant::now(),
        })
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let extent = self.renderer.extent();
        let aspect = extent.width as f32 / extent.height as f32;

        let scene = SceneUniforms {
            model: Mat4::from_rotation_z(elapsed * 90.0_f32.to_radians()),
            view: Mat4::look_at_rh(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO, Vec3::Z),
            proj: vulkan_projection(45.0_f32.to_radians(), aspect, 0.1, 10.0),
        };

        self.renderer.draw_frame(
            &self.gpu,
            &self.surface,
            &mut self.swapchain,
            &self.geometry,
            &self.drawables,
            &scene,
            drawable_size(&self.window),
        )?;

        Ok(())
    }

    fn handle_resize(&mut self, width: u32, height: u32) -> anyhow::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.renderer.handle_resize(
            &self.gpu,
            &self.surface,
            &mut self.swapchain,
            (width, height),
        )?;
        Ok(())
    }

    /// Teardown in exact reverse of initialization.
    fn cleanup(self) {
        if let Err(e) = self.gpu.wait_idle() {
            error!("Failed to wait idle during cleanup: {e}");
        }

        // Externally owned resources go first, before their device
        match Arc::try_unwrap(self.texture) {
            Ok(texture) => unsafe { texture.destroy(&self.gpu, &self.memory) },
            Err(_) => error!("Texture still shared at cleanup; leaking"),
        }
        unsafe {
            self.gpu.device().destroy_sampler(self.sampler, None);
        }

        if let Err(e) = self.renderer.destroy(&self.gpu, &self.memory) {
            error!("Failed to destroy renderer: {e}");
        }
        self.geometry.destroy(&self.memory);

        unsafe {
            self.memory.destroy();
            self.swapchain.destroy(self.gpu.device(), &self.surface.swapchain_loader);
            self.surface.destroy();
        }
        // DeviceContext drops last: device, then instance

        info!("Cleanup complete");
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window = match create_window(event_loop, &self.config) {
            Ok(window) => window,
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match EngineState::new(window, &self.paths) {
            Ok(state) => {
                info!("Viewer ready");
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.render_frame() {
                        error!("Render error: {e}");
                    }
                    state.window.request_redraw();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.handle_resize(size.width, size.height) {
                        error!("Resize error: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
