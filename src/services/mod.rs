//! Pipeline services.
//!
//! Business logic is separated from UI concerns: services report progress
//! through [`PipelineEvent`]s and the CLI decides how to display them.

pub mod batch;
pub mod events;
pub mod fetch;
pub mod files;
pub mod merge;
pub mod processor;
pub mod toolchain;

pub use batch::{BatchRunner, PipelineConfig};
pub use events::{EventSender, PipelineEvent};
pub use fetch::{Downloaded, Fetcher};
pub use merge::{merge, MergeOptions, MergeReport, MergeStep};
pub use processor::ItemProcessor;
pub use toolchain::{DockerToolchain, ToolStep, Toolchain, ToolchainConfig};
