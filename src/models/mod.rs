//! Domain models for the region pipeline.

mod outcome;
mod region;
mod retry;

pub use outcome::{ProcessingResult, RunSummary};
pub use region::{Region, GRAPH_EXTENSION};
pub use retry::RetryPolicy;
