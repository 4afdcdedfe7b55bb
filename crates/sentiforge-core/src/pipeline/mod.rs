pub mod config;
pub mod context;
pub mod progress;

pub use config::PipelineConfig;
pub use context::{Pipeline, PipelineContext};
pub use progress::{Milestone, NoProgress, Progress};
