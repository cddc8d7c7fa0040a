pub mod compiler;
pub mod config;
pub mod environment;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod preview;
pub mod tasks;
pub mod transform;
pub mod types;
pub mod watch;

pub use config::{BuildConfig, ConfigLoader, ConfigValidator};
pub use environment::BuildEnvironment;
pub use error::AppError;
pub use pipeline::{PipelineOptions, PipelineReport, PipelineSpec};
pub use tasks::{BuildSummary, TaskGraph, TaskNode, TaskRegistryBuilder};
pub use types::*;
