//! The feedback engine: one explicitly constructed instance owning the
//! buffer pair, cursor and shader parameters.
//!
//! Each frame runs in a fixed order:
//! ```text
//! deferred resize → cursor easing → parameter update → feedback pass → present → swap
//! ```
//! The feedback pass always reads the buffer written by the previous
//! frame's feedback pass, never the one it is about to write.
//!
//! Resizing recreates both buffers. Whatever had accumulated in them is
//! discarded; callers should expect the effect to restart from black.

use crate::clear_pulse::ClearPulse;
use crate::config::EngineConfig;
use crate::cursor::{CursorState, CursorTracker, NormalizedPoint};
use crate::parameters::{ParameterState, ShaderParameters};
use crate::scheduler::FrameScheduler;
use crate::swap_chain::SwapChain;

/// Non-degenerate viewport size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Returns `None` when either dimension is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            None
        } else {
            Some(Self { width, height })
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Clamp both dimensions to `max` (itself at least 1).
    pub fn clamped(self, max: u32) -> Self {
        let max = max.max(1);
        Self {
            width: self.width.min(max),
            height: self.height.min(max),
        }
    }
}

/// Graphics operations the engine needs from a backend.
///
/// All work for one frame is issued between the first call and
/// `finish_frame`; the engine only swaps roles after that.
pub trait RenderBackend {
    /// One offscreen image surface.
    type Buffer;
    /// Whatever the presentation pass draws into (a surface view, usually).
    type Target: ?Sized;

    /// Create an empty buffer sized to `viewport`.
    fn create_buffer(&mut self, viewport: Viewport, label: &str) -> Self::Buffer;

    /// Run the feedback program reading `input` and writing `output`.
    fn feedback(&mut self, input: &Self::Buffer, output: &Self::Buffer, params: &ShaderParameters);

    /// Copy `source` onto `target` unchanged.
    fn present(&mut self, source: &Self::Buffer, target: &Self::Target);

    /// Flush the frame's work.
    fn finish_frame(&mut self) {}

    /// Largest width or height `create_buffer` accepts.
    fn max_buffer_dimension(&self) -> u32 {
        u32::MAX
    }
}

pub struct FeedbackEngine<B: RenderBackend> {
    backend: B,
    buffers: SwapChain<B::Buffer>,
    viewport: Viewport,
    /// Resize requested since the last frame; applied at the start of the next one.
    pending_viewport: Option<Viewport>,
    cursor: CursorTracker,
    parameters: ParameterState,
    clear_pulse: ClearPulse,
    clear_requested: bool,
    scheduler: FrameScheduler,
}

impl<B: RenderBackend> FeedbackEngine<B> {
    pub fn new(mut backend: B, viewport: Viewport, config: &EngineConfig) -> Self {
        let viewport = fit_to_backend(&backend, viewport);
        let buffers = create_buffer_pair(&mut backend, viewport);
        log::info!(
            "Feedback engine created at {}x{}",
            viewport.width,
            viewport.height
        );

        Self {
            backend,
            buffers,
            viewport,
            pending_viewport: None,
            cursor: CursorTracker::new(config.ease, config.touch_platform),
            parameters: ParameterState::new(viewport.width, viewport.height, config.seed),
            clear_pulse: ClearPulse::new(config.clear_pulse_ms),
            clear_requested: false,
            scheduler: FrameScheduler::new(),
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn observe_continuous(&mut self, point: NormalizedPoint) {
        self.cursor.observe_continuous(point);
    }

    pub fn observe_discrete(&mut self, point: NormalizedPoint) {
        self.cursor.observe_discrete(point);
    }

    pub fn observe_touch(&mut self, point: NormalizedPoint) {
        self.cursor.observe_touch(point);
    }

    /// Start a clear pulse at the next frame.
    pub fn request_clear(&mut self) {
        self.clear_requested = true;
    }

    /// Request new buffer dimensions.
    ///
    /// Degenerate sizes are ignored and oversized ones are clamped to what the
    /// backend supports. The buffers are recreated at the start of the next
    /// frame, which discards the accumulated image. Requests that end up back
    /// at the current size before that frame cancel the recreation.
    pub fn resize(&mut self, width: u32, height: u32) {
        let Some(viewport) = Viewport::new(width, height) else {
            log::debug!("Ignoring degenerate resize to {}x{}", width, height);
            return;
        };
        let viewport = fit_to_backend(&self.backend, viewport);

        if viewport == self.viewport {
            if self.pending_viewport.take().is_some() {
                log::debug!(
                    "Pending resize cancelled; size back to {}x{}",
                    viewport.width,
                    viewport.height
                );
            }
            return;
        }
        self.pending_viewport = Some(viewport);
    }

    // ========================================================================
    // Frame loop
    // ========================================================================

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Run one iteration at host time `now_ms`, presenting into `target`.
    ///
    /// Returns `false` when the loop is stopped and nothing was rendered.
    pub fn frame(&mut self, now_ms: f64, target: &B::Target) -> bool {
        let Some(dt) = self.scheduler.begin_frame(now_ms) else {
            return false;
        };

        self.apply_pending_resize();

        self.cursor.step();
        let stop_event = self.cursor.take_stop_event();
        if std::mem::take(&mut self.clear_requested) {
            self.clear_pulse.request(now_ms);
        }
        let clearing = self.clear_pulse.is_active(now_ms);
        self.parameters.advance(dt, self.cursor.state(), stop_event, clearing);

        let (input, output) = self.buffers.acquire();
        self.backend.feedback(input, output, self.parameters.params());
        self.backend.present(output, target);
        self.backend.finish_frame();

        self.buffers.commit_swap();
        self.parameters.end_frame();
        true
    }

    fn apply_pending_resize(&mut self) {
        let Some(viewport) = self.pending_viewport.take() else {
            return;
        };

        let a = self.backend.create_buffer(viewport, "Feedback Buffer A");
        let b = self.backend.create_buffer(viewport, "Feedback Buffer B");
        drop(self.buffers.replace(a, b));
        self.viewport = viewport;
        self.parameters.set_viewport(viewport.width, viewport.height);
        log::info!(
            "Feedback buffers recreated at {}x{}; accumulated image discarded",
            viewport.width,
            viewport.height
        );
    }

    /// Tear the engine down, returning the backend.
    pub fn dispose(self) -> B {
        log::info!(
            "Feedback engine disposed after {} frames",
            self.scheduler.frame_count()
        );
        self.backend
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn params(&self) -> &ShaderParameters {
        self.parameters.params()
    }

    pub fn cursor_state(&self) -> &CursorState {
        self.cursor.state()
    }

    /// Current buffer size. A pending resize is not reflected until the next frame.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn buffers(&self) -> &SwapChain<B::Buffer> {
        &self.buffers
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }
}

fn fit_to_backend<B: RenderBackend>(backend: &B, viewport: Viewport) -> Viewport {
    let fitted = viewport.clamped(backend.max_buffer_dimension());
    if fitted != viewport {
        log::warn!(
            "Requested {}x{} exceeds the backend limit; using {}x{}",
            viewport.width,
            viewport.height,
            fitted.width,
            fitted.height
        );
    }
    fitted
}

fn create_buffer_pair<B: RenderBackend>(backend: &mut B, viewport: Viewport) -> SwapChain<B::Buffer> {
    let a = backend.create_buffer(viewport, "Feedback Buffer A");
    let b = backend.create_buffer(viewport, "Feedback Buffer B");
    SwapChain::new(a, b)
}
