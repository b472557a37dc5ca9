#[cfg(not(target_arch = "wasm32"))]
pub mod api;
pub mod client;
pub mod components;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
pub mod controller;
pub mod geocode;
pub mod systems;

use anyhow::anyhow;
#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
use bevy_ecs::{entity::Entity, query::Without, world::World};
use client::{ClientError, GeocodeClient};
use components::{
    camera::CameraComponent, material::MaterialComponent, mesh::MeshComponent,
    render_pipelines::RenderPipelineComponent,
};
use controller::{AppController, SelectionChange};
use geocode::{GeocodeResult, Query};
use systems::{
    camera::CameraSystem, clock::FrameClock, globe::GlobeSystem,
    render_pipelines::create_depth_view, stars::StarSystem,
};
use wgpu::Surface;
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy},
    window::{Window, WindowBuilder},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Radius of the globe in world units.
pub const PLANET_RADIUS: f64 = 2.0;
/// How far above the surface a tracked camera settles, as a multiple of the radius.
pub const CAMERA_DISTANCE_FACTOR: f64 = 2.25;
pub const MARKER_RADIUS: f32 = 0.05;
pub const INITIAL_EYE: (f32, f32, f32) = (0.0, 0.0, 5.0);
pub const MIN_CAMERA_DISTANCE: f32 = 2.5;
pub const MAX_CAMERA_DISTANCE: f32 = 10.0;

// cgmath matrices can't go through bytemuck directly
pub fn matrix4_to_array(mat: cgmath::Matrix4<f32>) -> [[f32; 4]; 4] {
    mat.into()
}

/// Everything that reaches the render loop from outside a window event.
#[derive(Debug)]
pub enum AppEvent {
    Search(String),
    ClearSelection,
    LookupFinished(Result<GeocodeResult, ClientError>),
}

struct State {
    // renderer
    size: winit::dpi::PhysicalSize<u32>,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,

    // scene
    world: World,
    camera_component: CameraComponent,
    marker: Option<Entity>,

    // app
    controller: AppController,
    client: GeocodeClient,
    search_input: String,
    clock: FrameClock,
    proxy: EventLoopProxy<AppEvent>,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Runtime,
}

impl State {
    async fn new(window: &Window, proxy: EventLoopProxy<AppEvent>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = State::create_instance();

        // # Safety
        // The surface needs to live as long as the window that created it.
        // The window outlives the event loop closure that owns State.
        let surface = unsafe { instance.create_surface(window) }?;
        let adapter = State::create_adapter(&instance, &surface).await?;
        let (device, queue) = State::create_device_and_queue(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders assume an sRGB surface, anything else comes out too dark.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let camera_component = CameraSystem::new(&device).create_camera(config.width, config.height);

        let mut world = World::new();
        let globe_system = GlobeSystem::new(&device, config.format);
        let globe = globe_system.spawn_globe(&mut world, &camera_component);
        let clouds = globe_system.spawn_clouds(&mut world, &camera_component);
        let stars =
            StarSystem::spawn_star_field(&device, &mut world, &camera_component, config.format);
        tracing::debug!(?globe, ?clouds, ?stars, "scene ready");

        Ok(Self {
            size,
            surface,
            device,
            queue,
            config,
            depth_view,
            world,
            camera_component,
            marker: None,
            controller: AppController::new(),
            client: GeocodeClient::from_env(),
            search_input: String::new(),
            clock: FrameClock::new(),
            proxy,
            #[cfg(not(target_arch = "wasm32"))]
            runtime: tokio::runtime::Runtime::new().context("starting lookup runtime")?,
        })
    }

    pub fn create_instance() -> wgpu::Instance {
        wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            dx12_shader_compiler: Default::default(),
        })
    }

    pub async fn create_adapter(
        instance: &wgpu::Instance,
        surface: &Surface,
    ) -> anyhow::Result<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow!("no graphics adapter can draw to this window"))
    }

    pub async fn create_device_and_queue(
        adapter: &wgpu::Adapter,
    ) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
        let pair = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    // WebGL2 is the lowest target we ship to.
                    limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    label: None,
                },
                None, // Trace path
            )
            .await?;
        Ok(pair)
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
            CameraSystem::resize(&mut self.camera_component, new_size.width, new_size.height);
        }
    }

    /// Returns true when the event was consumed.
    fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::ReceivedCharacter(c) if !c.is_control() => {
                self.search_input.push(*c);
                true
            }
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(key),
                        ..
                    },
                ..
            } => match key {
                VirtualKeyCode::Return => {
                    let input = std::mem::take(&mut self.search_input);
                    self.search(&input);
                    true
                }
                VirtualKeyCode::Back => {
                    self.search_input.pop();
                    true
                }
                VirtualKeyCode::Escape if self.controller.selection().is_some() => {
                    self.clear_selection();
                    true
                }
                _ => self
                    .camera_component
                    .camera_controller
                    .process_events(event),
            },
            _ => self
                .camera_component
                .camera_controller
                .process_events(event),
        }
    }

    fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Search(input) => self.search(&input),
            AppEvent::ClearSelection => self.clear_selection(),
            AppEvent::LookupFinished(outcome) => {
                if let SelectionChange::Selected(result) = self.controller.lookup_finished(outcome)
                {
                    tracing::info!(
                        lat = result.lat,
                        lng = result.lng,
                        formatted = %result.formatted,
                        "flying to selection"
                    );
                }
            }
        }
    }

    fn search(&mut self, input: &str) {
        match self.controller.submit(input) {
            Ok(query) => self.spawn_lookup(query),
            Err(_) => tracing::debug!("ignoring blank search"),
        }
    }

    fn clear_selection(&mut self) {
        if let SelectionChange::Cleared = self.controller.clear() {
            tracing::info!("selection cleared");
        }
    }

    /// Runs the request off the render loop; the outcome comes back as
    /// [`AppEvent::LookupFinished`].
    fn spawn_lookup(&self, query: Query) {
        let client = self.client.clone();
        let proxy = self.proxy.clone();
        let lookup = async move {
            let outcome = client.geocode(query.as_str()).await;
            if proxy.send_event(AppEvent::LookupFinished(outcome)).is_err() {
                tracing::warn!(%query, "event loop closed before the lookup finished");
            }
        };

        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                wasm_bindgen_futures::spawn_local(lookup);
            } else {
                self.runtime.spawn(lookup);
            }
        }
    }

    /// Search box and status line. The browser has real DOM elements for
    /// these, the native window only has its title bar.
    fn publish_status(&self, window: &Window) {
        let status = self.controller.status_line();
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let _ = window;
                if let Some(element) = web_sys::window()
                    .and_then(|win| win.document())
                    .and_then(|doc| doc.get_element_by_id("status"))
                {
                    element.set_text_content(Some(&status));
                }
            } else {
                window.set_title(&format!("geoglobe | {}_ | {}", self.search_input, status));
            }
        }
    }

    fn update(&mut self) {
        let elapsed = self.clock.tick();

        // manual orbit only while nothing is being tracked
        let camera_controller = &mut self.camera_component.camera_controller;
        if self.controller.rig().is_tracking() {
            camera_controller.discard_pending();
        } else {
            camera_controller.update_camera(&mut self.camera_component.camera);
        }
        let eye = self
            .controller
            .advance(self.camera_component.camera.eye_f64(), elapsed);
        self.camera_component.camera.set_eye_f64(eye);
        CameraSystem::write_uniform(&self.queue, &mut self.camera_component);

        GlobeSystem::new(&self.device, self.config.format).sync_marker(
            &mut self.world,
            &mut self.marker,
            &self.camera_component,
            &self.controller,
        );
        GlobeSystem::update_model_matrices(&mut self.world, &self.queue, &self.controller);
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        // lit meshes carry a material, the star field does not
        let mut lit = self
            .world
            .query::<(&RenderPipelineComponent, &MeshComponent, &MaterialComponent)>();
        let mut unlit = self.world.query_filtered::<(
            &RenderPipelineComponent,
            &MeshComponent,
        ), Without<MaterialComponent>>();

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.0,
                        g: 0.0,
                        b: 0.0,
                        a: 1.0,
                    }),
                    store: true,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });

        render_pass.set_bind_group(0, &self.camera_component.camera_bind_group, &[]);

        for (render_pipeline, mesh, material) in lit
            .iter(&self.world)
            .filter(|(pipeline, _, _)| !pipeline.translucent)
        {
            render_pass.set_pipeline(&render_pipeline.render_pipeline);
            render_pass.set_bind_group(1, &material.bind_group, &[]);
            render_pass.set_bind_group(2, &mesh.model_matrix_bind_group, &[]);

            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
        }

        for (render_pipeline, mesh) in unlit.iter(&self.world) {
            render_pass.set_pipeline(&render_pipeline.render_pipeline);
            render_pass.set_bind_group(1, &mesh.model_matrix_bind_group, &[]);

            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
        }

        // clouds last so they blend over the globe and the stars
        for (render_pipeline, mesh, material) in lit
            .iter(&self.world)
            .filter(|(pipeline, _, _)| pipeline.translucent)
        {
            render_pass.set_pipeline(&render_pipeline.render_pipeline);
            render_pass.set_bind_group(1, &material.bind_group, &[]);
            render_pass.set_bind_group(2, &mesh.model_matrix_bind_group, &[]);

            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.num_indices, 0, 0..1);
        }

        drop(render_pass);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static EVENT_PROXY: std::cell::RefCell<Option<EventLoopProxy<AppEvent>>> =
        std::cell::RefCell::new(None);
}

#[cfg(target_arch = "wasm32")]
fn send_to_viewer(event: AppEvent) {
    EVENT_PROXY.with(|proxy| match proxy.borrow().as_ref() {
        Some(proxy) => {
            if proxy.send_event(event).is_err() {
                tracing::warn!("viewer event loop has stopped");
            }
        }
        None => tracing::warn!("viewer is not running yet"),
    });
}

/// Looks up `query` and flies the camera to it.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn search(query: String) {
    send_to_viewer(AppEvent::Search(query));
}

/// Removes the marker and lets the globe spin again.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn clear_selection() {
    send_to_viewer(AppEvent::ClearSelection);
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn run() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            tracing_wasm::set_as_global_default();
        } else {
            use tracing_subscriber::EnvFilter;

            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn"));
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    if let Err(err) = run_viewer().await {
        tracing::error!("viewer failed to start: {err:#}");
    }
}

async fn run_viewer() -> anyhow::Result<()> {
    let event_loop = EventLoopBuilder::<AppEvent>::with_user_event().build();
    let window = WindowBuilder::new()
        .with_title("geoglobe")
        .build(&event_loop)?;

    #[cfg(target_arch = "wasm32")]
    {
        // Winit prevents sizing with CSS, so we have to
        // set the size manually when on web.
        use winit::dpi::PhysicalSize;
        window.set_inner_size(PhysicalSize::new(1280, 720));

        use winit::platform::web::WindowExtWebSys;
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("globe")?;
                let canvas = web_sys::Element::from(window.canvas());
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .ok_or_else(|| anyhow!("couldn't append canvas to #globe"))?;

        let proxy = event_loop.create_proxy();
        EVENT_PROXY.with(|slot| *slot.borrow_mut() = Some(proxy));
    }

    let mut state = State::new(&window, event_loop.create_proxy()).await?;
    state.publish_status(&window);

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent {
            ref event,
            window_id,
        } if window_id == window.id() => {
            if state.input(event) {
                state.publish_status(&window);
            } else {
                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => *control_flow = ControlFlow::Exit,
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        state.resize(**new_inner_size);
                    }
                    _ => {}
                }
            }
        }
        Event::UserEvent(app_event) => {
            state.handle_app_event(app_event);
            state.publish_status(&window);
        }
        Event::RedrawRequested(window_id) if window_id == window.id() => {
            state.update();
            match state.render() {
                Ok(_) => {}
                // Reconfigure the surface if lost
                Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    tracing::error!("GPU out of memory");
                    *control_flow = ControlFlow::Exit
                }
                // Outdated and Timeout clear up by the next frame
                Err(e) => tracing::warn!("render skipped: {e:?}"),
            }
        }
        Event::MainEventsCleared => {
            // RedrawRequested will only trigger once, unless we manually
            // request it.
            window.request_redraw();
        }
        _ => {}
    });
}
