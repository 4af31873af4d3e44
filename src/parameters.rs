//! Uniform parameters consumed by the feedback shader.
//!
//! [`ShaderParameters`] is uploaded verbatim as the group 1 uniform buffer;
//! [`ParameterState`] owns it and applies the per-frame update rules.

use bytemuck::{Pod, Zeroable};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::cursor::CursorState;

/// GPU-compatible uniform block for the feedback shader.
///
/// Layout: three vec2 (24 bytes) + six scalars (24 bytes) = 48 bytes,
/// a multiple of 16 for WebGL2 uniform buffers. Matches `Params` in
/// `shader_growth.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShaderParameters {
    /// Cursor in shader convention (y up).
    pub cursor: [f32; 2],
    /// Fresh pair of uniform draws in `[0,1)` per stop event.
    pub random_seed: [f32; 2],
    /// Buffer size in pixels.
    pub resolution: [f32; 2],
    /// Seconds since the last stop event.
    pub elapsed_since_stop: f32,
    pub aspect_ratio: f32,
    /// 0 while a clear pulse is active, 1 otherwise.
    pub clear_flag: f32,
    /// Seconds since the engine started.
    pub time: f32,
    /// Frames rendered since the buffers were (re)created.
    pub frame: u32,
    pub _padding: f32,
}

impl Default for ShaderParameters {
    fn default() -> Self {
        Self {
            cursor: [0.5, 0.5],
            random_seed: [0.0, 0.0],
            resolution: [1.0, 1.0],
            elapsed_since_stop: 0.0,
            aspect_ratio: 1.0,
            clear_flag: 1.0,
            time: 0.0,
            frame: 0,
            _padding: 0.0,
        }
    }
}

/// Owns the [`ShaderParameters`] and the random source used for seeds.
pub struct ParameterState {
    params: ShaderParameters,
    rng: SmallRng,
}

impl ParameterState {
    /// Create parameter state for a viewport.
    ///
    /// With `seed` set, the sequence of random seeds is reproducible.
    pub fn new(width: u32, height: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let mut state = Self {
            params: ShaderParameters::default(),
            rng,
        };
        state.set_viewport(width, height);
        state
    }

    pub fn params(&self) -> &ShaderParameters {
        &self.params
    }

    /// Update the per-frame fields.
    ///
    /// A stop event resets `elapsed_since_stop` and draws a new seed; it is
    /// passed in already consumed, so one event applies exactly one reset.
    pub fn advance(&mut self, dt: f32, cursor: &CursorState, stop_event: bool, clear_requested: bool) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        self.params.cursor = [cursor.current.x(), 1.0 - cursor.current.y()];

        if stop_event {
            self.params.random_seed = [self.rng.random::<f32>(), self.rng.random::<f32>()];
            self.params.elapsed_since_stop = 0.0;
        } else {
            self.params.elapsed_since_stop += dt;
        }

        self.params.clear_flag = if clear_requested { 0.0 } else { 1.0 };
        self.params.time += dt;
    }

    /// Record a new viewport. Only called on resize, never per frame.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.params.aspect_ratio = width as f32 / height as f32;
        self.params.resolution = [width as f32, height as f32];
        self.params.frame = 0;
    }

    /// Bump the frame counter after a frame has been issued.
    pub fn end_frame(&mut self) {
        self.params.frame = self.params.frame.wrapping_add(1);
    }
}
