pub mod clear_pulse;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod gpu;
pub mod input;
pub mod parameters;
pub mod scheduler;
pub mod swap_chain;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod window;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use config::EngineConfig;
pub use cursor::NormalizedPoint;
pub use engine::{FeedbackEngine, RenderBackend, Viewport};
pub use parameters::ShaderParameters;
