// First-person inspect demo
// Walk around, look at a prop and press E to hold it up in front of the camera.
// Usage: inspect_mode [config.toml]

mod character;
mod config;
mod engine;
mod game_mode;
mod inspect;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use log::{error, info, warn};
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use character::CharacterRig;
use config::GameConfig;
use engine::hud::{Hud, HudStats};
use engine::mesh::{self, GpuVertex, InstanceData};
use engine::{Color, DebugMessages, FirstPersonCamera, FrameTime, GlobalTransform, InputState, Name, PlayerWidget};
use game_mode::GameMode;
use inspect::{InspectController, InspectMode};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// UNIFORM DATA (camera + light)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

impl Uniforms {
    fn new() -> Self {
        let light = Vec3::new(-0.4, -1.0, -0.3).normalize();
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            light_dir: light.extend(0.0).to_array(),
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    max_instances: usize,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: Uniforms,
    depth_view: wgpu::TextureView,
    hud: Hud,

    // ECS World
    world: World,
    schedule: Schedule,
    player: Entity,
    last_update: Instant,
    cursor_grabbed: bool,

    // Stats
    frame_count: u32,
    last_fps_update: Instant,
    fps: u32,
    frame_time_avg_ms: f32,
}

impl State {
    async fn new(window: Arc<Window>, game_mode: GameMode) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no GPU adapter compatible with the window surface")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let uniforms = Uniforms::new();

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::desc(), InstanceData::desc()],  // Vertex + Instance buffers
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let cube = mesh::unit_cube();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&cube.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&cube.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let max_instances = 1024;
        let instance_buffer = create_instance_buffer(&device, max_instances);

        let num_indices = cube.indices.len() as u32;
        let depth_view = create_depth_view(&device, &config);
        let hud = Hud::new(&window, &device, surface_format);

        // ECS world: level, player and the frame schedule
        let mut world = World::new();
        let player = game_mode.start_play(&mut world)?;
        let schedule = GameMode::frame_schedule();

        let now = Instant::now();
        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices,
            max_instances,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            depth_view,
            hud,
            world,
            schedule,
            player,
            last_update: now,
            cursor_grabbed: false,
            frame_count: 0,
            last_fps_update: now,
            fps: 0,
            frame_time_avg_ms: 0.0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn set_cursor_grab(&mut self, grab: bool) {
        if grab == self.cursor_grabbed {
            return;
        }
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => {
                self.window.set_cursor_visible(!grab);
                self.cursor_grabbed = grab;
            }
            Err(err) => warn!("Cursor grab failed: {err}"),
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;

        self.world.resource_mut::<FrameTime>().advance(dt);
        self.schedule.run(&mut self.world);
        self.world.resource_mut::<InputState>().end_frame();

        self.frame_count += 1;
        let since = (now - self.last_fps_update).as_secs_f32();
        if since >= 1.0 {
            self.fps = self.frame_count;
            self.frame_time_avg_ms = since * 1000.0 / self.frame_count as f32;
            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }

    fn view_projection(&self) -> Option<Mat4> {
        let camera = self.world.get::<CharacterRig>(self.player)?.camera;
        let eye = self.world.get::<GlobalTransform>(camera)?;
        let lens = self.world.get::<FirstPersonCamera>(camera)?;
        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        Some(lens.view_projection(eye, aspect))
    }

    fn hud_stats(&mut self) -> HudStats {
        let entity_count = self.world.query::<&GlobalTransform>().iter(&self.world).count();
        let position = self
            .world
            .get::<GlobalTransform>(self.player)
            .map(|global| global.translation())
            .unwrap_or(Vec3::ZERO);
        let name_of = |world: &World, entity: Entity| {
            world
                .get::<Name>(entity)
                .map(|name| name.0.clone())
                .unwrap_or_else(|| format!("{entity:?}"))
        };
        let (inspect_mode, candidate) = match self.world.get::<InspectController>(self.player) {
            Some(controller) => (
                match controller.mode {
                    InspectMode::Idle => "Idle".to_owned(),
                    InspectMode::Inspecting(target) => format!("Inspecting {}", name_of(&self.world, target.entity)),
                },
                controller.candidate.map(|entity| name_of(&self.world, entity)),
            ),
            None => ("-".to_owned(), None),
        };

        HudStats {
            fps: self.fps,
            frame_time_avg_ms: self.frame_time_avg_ms,
            entity_count,
            resolution: (self.size.width, self.size.height),
            player_position: (position.x, position.y, position.z),
            inspect_mode,
            candidate,
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Collect instance data from ECS BEFORE creating render pass
        let mut query = self.world.query::<(&GlobalTransform, &Color)>();
        let instance_data: Vec<InstanceData> = query
            .iter(&self.world)
            .map(|(global, color)| InstanceData::new(global.0, color.to_array()))
            .collect();

        if instance_data.len() > self.max_instances {
            self.max_instances = instance_data.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.max_instances);
        }
        let instance_count = instance_data.len();

        // Write instance data to buffer BEFORE render pass
        if !instance_data.is_empty() {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instance_data));
        }

        if let Some(view_proj) = self.view_projection() {
            self.uniforms.view_proj = view_proj.to_cols_array_2d();
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let stats = if self.hud.stats_visible { Some(self.hud_stats()) } else { None };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.52,
                            g: 0.62,
                            b: 0.75,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));  // Instance data
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

            // ONE DRAW CALL for all instances!
            render_pass.draw_indexed(0..self.num_indices, 0, 0..instance_count as u32);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.hud.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            self.world.resource::<PlayerWidget>(),
            self.world.resource::<DebugMessages>(),
            stats.as_ref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceData>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let game_mode = GameMode::new(GameConfig::load_or_default(&config_path));

    let event_loop = EventLoop::new()?;

    let window_settings = &game_mode.config().window;
    let window_attributes = Window::default_attributes()
        .with_title(window_settings.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(window_settings.width, window_settings.height));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window.clone(), game_mode))?;
    info!("Click to capture the mouse. WASD move, Space jump, E inspect, F3 stats, Esc quit");

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == window.id() => {
                state.hud.handle_window_event(&window, event);
                state.world.resource_mut::<InputState>().process_event(event);

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.exit(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::F3),
                                repeat: false,
                                ..
                            },
                        ..
                    } => state.hud.toggle_stats(),
                    WindowEvent::MouseInput { state: ElementState::Pressed, .. } => {
                        state.set_cursor_grab(true);
                    }
                    WindowEvent::Focused(false) => state.set_cursor_grab(false),
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => control_flow.exit(),
                            Err(e) => error!("{e:?}"),
                        }
                    }
                    _ => {}
                }
            }
            WinitEvent::DeviceEvent { ref event, .. } if state.cursor_grabbed => {
                state.world.resource_mut::<InputState>().process_device_event(event);
            }
            WinitEvent::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
