//! Scripted input for offline rendering.
//!
//! A timeline is a JSON array of frame-stamped actions:
//! ```json
//! [
//!   { "frame": 0,   "action": "activate", "x": 0.5, "y": 0.5 },
//!   { "frame": 120, "action": "move",     "x": 0.8, "y": 0.2 },
//!   { "frame": 240, "action": "clear" }
//! ]
//! ```
//! Coordinates are normalized with a top-left origin, like pointer input.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cursor::NormalizedPoint;
use crate::engine::{FeedbackEngine, RenderBackend};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InputAction {
    /// Continuous pointer movement.
    Move { x: f32, y: f32 },
    /// Click or tap: snaps the cursor and fires a stop event.
    Activate { x: f32, y: f32 },
    /// Touch contact: like `Activate`, and locks out continuous movement.
    Touch { x: f32, y: f32 },
    Clear,
    Resize { width: u32, height: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedInput {
    pub frame: u64,
    #[serde(flatten)]
    pub action: InputAction,
}

impl InputAction {
    pub fn apply<B: RenderBackend>(&self, engine: &mut FeedbackEngine<B>) {
        match *self {
            InputAction::Move { x, y } => engine.observe_continuous(NormalizedPoint::new(x, y)),
            InputAction::Activate { x, y } => engine.observe_discrete(NormalizedPoint::new(x, y)),
            InputAction::Touch { x, y } => engine.observe_touch(NormalizedPoint::new(x, y)),
            InputAction::Clear => engine.request_clear(),
            InputAction::Resize { width, height } => engine.resize(width, height),
        }
    }
}

/// Frame-ordered list of input actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputTimeline {
    events: Vec<TimedInput>,
}

impl InputTimeline {
    /// Events are sorted by frame; events on the same frame keep their order.
    pub fn new(mut events: Vec<TimedInput>) -> Self {
        events.sort_by_key(|e| e.frame);
        Self { events }
    }

    /// A single activation at the centre on the first frame.
    pub fn centered_activation() -> Self {
        Self::new(vec![TimedInput {
            frame: 0,
            action: InputAction::Activate { x: 0.5, y: 0.5 },
        }])
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let events: Vec<TimedInput> =
            serde_json::from_str(json).context("Failed to parse input timeline")?;
        Ok(Self::new(events))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input timeline {:?}", path))?;
        Self::from_json(&contents)
    }

    pub fn events(&self) -> &[TimedInput] {
        &self.events
    }

    /// Events scheduled for `frame`.
    pub fn at(&self, frame: u64) -> impl Iterator<Item = &InputAction> {
        let start = self.events.partition_point(|e| e.frame < frame);
        self.events[start..]
            .iter()
            .take_while(move |e| e.frame == frame)
            .map(|e| &e.action)
    }

    /// Feed every event scheduled for `frame` into `engine`.
    pub fn apply<B: RenderBackend>(&self, frame: u64, engine: &mut FeedbackEngine<B>) -> usize {
        let mut applied = 0;
        for action in self.at(frame) {
            log::debug!("frame {}: {:?}", frame, action);
            action.apply(engine);
            applied += 1;
        }
        applied
    }
}
