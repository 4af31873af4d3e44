//! Timed clear pulse.
//!
//! A clear request holds `clear_flag` at 0 for a short fixed window, long
//! enough for the feedback shader to wipe the accumulation, then releases it.

/// Default pulse length in milliseconds.
pub const DEFAULT_CLEAR_PULSE_MS: f64 = 50.0;

#[derive(Clone, Debug)]
pub struct ClearPulse {
    duration_ms: f64,
    /// Host timestamp (ms) at which the pulse ends.
    active_until: Option<f64>,
}

impl ClearPulse {
    pub fn new(duration_ms: f64) -> Self {
        let duration_ms = if duration_ms.is_finite() && duration_ms > 0.0 {
            duration_ms
        } else {
            DEFAULT_CLEAR_PULSE_MS
        };
        Self {
            duration_ms,
            active_until: None,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Start (or restart) the pulse at `now_ms`.
    pub fn request(&mut self, now_ms: f64) {
        self.active_until = Some(now_ms + self.duration_ms);
        log::debug!("Clear pulse until {:.1}ms", now_ms + self.duration_ms);
    }

    /// Whether the pulse covers `now_ms`. Expired pulses are dropped.
    pub fn is_active(&mut self, now_ms: f64) -> bool {
        match self.active_until {
            Some(until) if now_ms < until => true,
            Some(_) => {
                self.active_until = None;
                false
            }
            None => false,
        }
    }
}

impl Default for ClearPulse {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAR_PULSE_MS)
    }
}
