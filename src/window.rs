//! Native interactive host: a winit window driving a [`GpuEngine`].
//!
//! Controls: mouse movement steers the cursor, left click snaps it and
//! restarts growth, touches do the same and lock out hover, `C` clears,
//! `Esc` quits.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::config::EngineConfig;
use crate::cursor::NormalizedPoint;
use crate::engine::Viewport;
use crate::gpu::{self, GpuEngine};

pub fn run(shader_source: String, config: EngineConfig, width: u32, height: u32) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("feedback-growth")
            .with_inner_size(PhysicalSize::new(width.max(1), height.max(1)))
            .build(&event_loop)?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(window.clone())?;
    let (adapter, device, queue) = pollster::block_on(gpu::request_device(&instance, Some(&surface)))?;

    let caps = surface.get_capabilities(&adapter);
    let format = gpu::preferred_surface_format(&caps)
        .ok_or_else(|| anyhow!("Surface reports no supported formats"))?;

    let size = window.inner_size();
    let viewport = Viewport::new(size.width.max(1), size.height.max(1))
        .ok_or_else(|| anyhow!("Window has no area"))?;

    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: viewport.width,
        height: viewport.height,
        present_mode: caps.present_modes[0],
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let mut engine: GpuEngine = pollster::block_on(gpu::create_engine(
        device,
        queue,
        &shader_source,
        format,
        viewport,
        &config,
    ))?;

    let started = Instant::now();
    let mut pointer = PhysicalPosition::new(0.0, 0.0);

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                if size.width > 0 && size.height > 0 {
                    surface_config.width = size.width;
                    surface_config.height = size.height;
                    surface.configure(engine.backend().device(), &surface_config);
                }
                engine.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                pointer = position;
                engine.observe_continuous(normalize(position, &surface_config));
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                engine.observe_discrete(normalize(pointer, &surface_config));
            }
            WindowEvent::Touch(Touch {
                phase: TouchPhase::Started,
                location,
                ..
            }) => {
                engine.observe_touch(normalize(location, &surface_config));
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => elwt.exit(),
                KeyCode::KeyC => engine.request_clear(),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                let now_ms = started.elapsed().as_secs_f64() * 1000.0;
                match surface.get_current_texture() {
                    Ok(output) => {
                        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                        engine.frame(now_ms, &view);
                        output.present();
                    }
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(engine.backend().device(), &surface_config);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Surface out of memory");
                        elwt.exit();
                    }
                    Err(e) => log::warn!("Surface error: {:?}", e),
                }
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}

fn normalize(position: PhysicalPosition<f64>, surface_config: &wgpu::SurfaceConfiguration) -> NormalizedPoint {
    NormalizedPoint::from_pixels(
        position.x as f32,
        position.y as f32,
        surface_config.width as f32,
        surface_config.height as f32,
    )
}
