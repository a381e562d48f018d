use mlaa::*;
use std::borrow::Cow;
use std::sync::Arc;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::Key;
use winit::window::WindowBuilder;

const SHADER: &str = "
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1) * 0.7;
    let y = f32(i32(index & 1u) * 2 - 1) * 0.6;
    return vec4<f32>(x, y, 0.5, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.95, 0.85, 0.3, 1.0);
}
";

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let sample_count: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(1);

    // Initialize wgpu
    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new().with_title("MLAA").build(&event_loop)?);
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(window.clone())?;
    let adapter = futures::executor::block_on(instance.request_adapter(
        &wgpu::RequestAdapterOptions {
            compatible_surface: Some(&surface),
            ..Default::default()
        },
    ))
    .ok_or_else(|| anyhow::anyhow!("no suitable adapter"))?;
    let (device, queue) = futures::executor::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: None,
            required_features: adapter.features() & wgpu::Features::TIMESTAMP_QUERY,
            ..Default::default()
        },
        None,
    ))?;

    // The passes operate on stored values, so present through a linear format.
    let capabilities = surface.get_capabilities(&adapter);
    let swapchain_format = capabilities
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .unwrap_or(capabilities.formats[0]);
    let size = window.inner_size();
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: swapchain_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        desired_maximum_frame_latency: 2,
        alpha_mode: capabilities.alpha_modes[0],
        view_formats: vec![],
    };
    surface.configure(&device, &surface_config);

    // Create MLAA target
    let mut mlaa_target = MlaaTarget::new(
        &device,
        &queue,
        surface_config.width,
        surface_config.height,
        sample_count,
        swapchain_format,
        MlaaConfig::default(),
    )?;

    // Prepare scene
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("triangle"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER)),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[],
        push_constant_ranges: &[],
    });
    let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("triangle"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(swapchain_format.into())],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    });

    // Main loop
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                // Reconfigure the surface with the new size
                surface_config.width = size.width;
                surface_config.height = size.height;
                surface.configure(&device, &surface_config);

                if let Err(e) = mlaa_target.resize(&device, size.width, size.height, sample_count) {
                    log::error!("failed to resize mlaa target: {}", e);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Character(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                let config = *mlaa_target.config();
                let threshold = config.edge_threshold.get();
                match key.as_str() {
                    "m" => mlaa_target.set_enabled(!config.enabled),
                    "j" => mlaa_target.set_use_stencil(!config.use_stencil),
                    "e" => mlaa_target.set_show_edges(!config.show_edges),
                    "+" | "=" => {
                        if let Err(e) = mlaa_target.set_edge_threshold(threshold + 1) {
                            log::warn!("{}", e);
                        }
                    }
                    "-" => {
                        if let Err(e) = mlaa_target.set_edge_threshold(threshold.saturating_sub(1)) {
                            log::warn!("{}", e);
                        }
                    }
                    "t" => log::info!("{:?}", mlaa_target.last_frame_timing()),
                    _ => return,
                }
                log::info!("{:?}", mlaa_target.config());
            }
            WindowEvent::RedrawRequested => {
                let output_frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::warn!("dropped frame: {}", e);
                        surface.configure(&device, &surface_config);
                        return;
                    }
                };
                let frame_view = output_frame.texture.create_view(&Default::default());
                let frame = match mlaa_target.start_frame(&device, &queue, &frame_view) {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("{}", e);
                        if matches!(e, Error::DeviceLost) {
                            elwt.exit();
                        }
                        return;
                    }
                };

                let mut encoder =
                    device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
                {
                    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("scene"),
                        color_attachments: &[Some(frame.color_attachment(wgpu::LoadOp::Clear(
                            wgpu::Color {
                                r: 0.05,
                                g: 0.1,
                                b: 0.2,
                                a: 1.0,
                            },
                        )))],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: frame.depth_stencil_view(),
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    rpass.set_pipeline(&render_pipeline);
                    rpass.draw(0..3, 0..1);
                }
                queue.submit(Some(encoder.finish()));

                // We have to call all `queue.submit()` before presentation
                if let Err(e) = frame.resolve() {
                    log::error!("{}", e);
                }

                output_frame.present();
            }
            WindowEvent::CloseRequested => elwt.exit(),
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;
    Ok(())
}
