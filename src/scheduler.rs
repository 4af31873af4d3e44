//! Frame timing and run state.
//!
//! Hosts hand in monotonic timestamps in milliseconds (`performance.now()`
//! in the browser, `Instant` elapsed time natively). The clock turns them
//! into per-frame deltas; the scheduler gates whether frames run at all.

/// Converts host timestamps into frame deltas in seconds.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta since the previous tick. The first tick yields 0, as does a
    /// timestamp that goes backwards.
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) if now_ms > last => ((now_ms - last) / 1000.0) as f32,
            _ => 0.0,
        };
        self.last_ms = Some(now_ms);
        dt
    }

    /// Forget the previous timestamp so the next tick yields 0.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

/// Run state of the frame loop.
#[derive(Clone, Debug)]
pub struct FrameScheduler {
    clock: FrameClock,
    running: bool,
    frames: u64,
}

impl FrameScheduler {
    /// Create a scheduler in the running state.
    pub fn new() -> Self {
        Self {
            clock: FrameClock::new(),
            running: true,
            frames: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            // Time spent stopped must not show up as one huge dt.
            self.clock.reset();
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Total frames scheduled.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Begin an iteration. Returns the frame delta, or `None` when stopped.
    pub fn begin_frame(&mut self, now_ms: f64) -> Option<f32> {
        if !self.running {
            return None;
        }
        self.frames += 1;
        Some(self.clock.tick(now_ms))
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}
