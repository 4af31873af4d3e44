use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;

use crate::config::EngineConfig;
use crate::cursor::NormalizedPoint;
use crate::engine::Viewport;
use crate::gpu::{self, GpuEngine};

type AnimationClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// A feedback sketch bound to a canvas.
///
/// Pointer coordinates are normalized to the canvas with a top-left origin.
#[wasm_bindgen]
pub struct WasmSketch {
    inner: Rc<RefCell<Option<SketchContext>>>,
    animation: AnimationClosure,
    /// Pending `requestAnimationFrame` id.
    scheduled: Rc<Cell<Option<i32>>>,
}

struct SketchContext {
    engine: GpuEngine,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

/// WGSL source of the built-in growth sketch. `create_sketch` uses it when
/// given an empty shader source.
#[wasm_bindgen]
pub fn builtin_shader() -> String {
    gpu::BUILTIN_SHADER.to_string()
}

#[wasm_bindgen]
impl WasmSketch {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmSketch, JsValue> {
        Err(JsValue::from_str("Use the create_sketch async constructor"))
    }

    pub fn pointer_move(&self, x: f32, y: f32) {
        self.with_engine(|engine| engine.observe_continuous(NormalizedPoint::new(x, y)));
    }

    pub fn activate(&self, x: f32, y: f32) {
        self.with_engine(|engine| engine.observe_discrete(NormalizedPoint::new(x, y)));
    }

    pub fn touch(&self, x: f32, y: f32) {
        self.with_engine(|engine| engine.observe_touch(NormalizedPoint::new(x, y)));
    }

    pub fn request_clear(&self) {
        self.with_engine(|engine| engine.request_clear());
    }

    /// Resize the drawing surface now; the feedback buffers follow on the next frame.
    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        let Some(ctx) = inner.as_mut() else {
            return;
        };
        if width > 0 && height > 0 {
            ctx.config.width = width;
            ctx.config.height = height;
            ctx.surface.configure(ctx.engine.backend().device(), &ctx.config);
        }
        ctx.engine.resize(width, height);
    }

    /// Render a single frame at `now_ms`, for hosts driving their own loop.
    pub fn render(&self, now_ms: f64) -> bool {
        render_frame(&self.inner, now_ms)
    }

    /// Start (or resume) the `requestAnimationFrame` loop.
    pub fn start(&self) -> Result<(), JsValue> {
        if !self.with_engine(|engine| engine.start()) {
            return Err(JsValue::from_str("Sketch has been disposed"));
        }

        if self.animation.borrow().is_none() {
            let inner = self.inner.clone();
            let animation = self.animation.clone();
            let scheduled = self.scheduled.clone();
            *self.animation.borrow_mut() = Some(Closure::wrap(Box::new(move |now_ms: f64| {
                scheduled.set(None);
                if !render_frame(&inner, now_ms) {
                    return;
                }
                if let Err(e) = schedule(&animation, &scheduled) {
                    log::error!("Failed to schedule animation frame: {:?}", e);
                }
            }) as Box<dyn FnMut(f64)>));
        }

        schedule(&self.animation, &self.scheduled)
    }

    pub fn stop(&self) {
        self.with_engine(|engine| engine.stop());
        cancel(&self.scheduled);
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .borrow()
            .as_ref()
            .map(|ctx| ctx.engine.is_running())
            .unwrap_or(false)
    }

    /// Stop the loop and release every GPU resource. Further calls are no-ops.
    pub fn dispose(&self) {
        cancel(&self.scheduled);
        self.animation.borrow_mut().take();
        if let Some(ctx) = self.inner.borrow_mut().take() {
            drop(ctx.engine.dispose());
        }
    }
}

impl WasmSketch {
    /// Returns false once disposed.
    fn with_engine(&self, f: impl FnOnce(&mut GpuEngine)) -> bool {
        match self.inner.borrow_mut().as_mut() {
            Some(ctx) => {
                f(&mut ctx.engine);
                true
            }
            None => false,
        }
    }
}

fn render_frame(inner: &RefCell<Option<SketchContext>>, now_ms: f64) -> bool {
    let mut inner = inner.borrow_mut();
    let Some(ctx) = inner.as_mut() else {
        return false;
    };
    if !ctx.engine.is_running() {
        return false;
    }

    match ctx.surface.get_current_texture() {
        Ok(output) => {
            let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
            ctx.engine.frame(now_ms, &view);
            output.present();
        }
        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
            ctx.surface.configure(ctx.engine.backend().device(), &ctx.config);
        }
        Err(wgpu::SurfaceError::OutOfMemory) => {
            log::error!("Surface out of memory");
        }
        Err(e) => {
            log::warn!("Surface error: {:?}", e);
        }
    }
    true
}

fn schedule(animation: &AnimationClosure, scheduled: &Cell<Option<i32>>) -> Result<(), JsValue> {
    if scheduled.get().is_some() {
        return Ok(());
    }
    let animation = animation.borrow();
    let Some(closure) = animation.as_ref() else {
        return Ok(());
    };
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let id = window.request_animation_frame(closure.as_ref().unchecked_ref())?;
    scheduled.set(Some(id));
    Ok(())
}

fn cancel(scheduled: &Cell<Option<i32>>) {
    if let (Some(id), Some(window)) = (scheduled.take(), web_sys::window()) {
        let _ = window.cancel_animation_frame(id);
    }
}

#[wasm_bindgen]
pub async fn create_sketch(
    canvas: HtmlCanvasElement,
    shader_source: String,
    config_json: Option<String>,
) -> Result<WasmSketch, JsValue> {
    init_panic_hook();

    let engine_config = match config_json.as_deref() {
        Some(json) => EngineConfig::from_json(json).map_err(to_js)?,
        None => EngineConfig::default(),
    };
    let shader_source = if shader_source.trim().is_empty() {
        gpu::BUILTIN_SHADER.to_string()
    } else {
        shader_source
    };

    let viewport = Viewport::new(canvas.width(), canvas.height())
        .ok_or_else(|| JsValue::from_str("Canvas has no area"))?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let surface = instance
        .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let (adapter, device, queue) = gpu::request_device(&instance, Some(&surface))
        .await
        .map_err(to_js)?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = gpu::preferred_surface_format(&surface_caps)
        .ok_or_else(|| JsValue::from_str("Surface reports no supported formats"))?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: viewport.width,
        height: viewport.height,
        present_mode: surface_caps.present_modes[0],
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let engine = gpu::create_engine(
        device,
        queue,
        &shader_source,
        surface_format,
        viewport,
        &engine_config,
    )
    .await
    .map_err(to_js)?;

    Ok(WasmSketch {
        inner: Rc::new(RefCell::new(Some(SketchContext {
            engine,
            surface,
            config,
        }))),
        animation: Rc::new(RefCell::new(None)),
        scheduled: Rc::new(Cell::new(None)),
    })
}

fn to_js(e: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", e))
}
