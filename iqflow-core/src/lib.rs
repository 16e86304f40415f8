//! Concurrent, multi-threaded I/Q sample pipeline.
//!
//! [`orchestrator::run`] wires one OS thread per pipeline stage — source
//! capture, reader/deframe, pre-processing, resampling, post-processing,
//! and output — around bounded queues and ring buffers, and drives them to
//! completion or to a reported fatal error. [`config::PipelineConfig`]
//! describes one run; everything else in this crate is either a pipeline
//! stage or a type that stage touches.

pub mod cancellation;
pub mod chunk;
pub mod config;
pub mod dsp;
pub mod errors;
pub mod heartbeat;
pub mod orchestrator;
pub mod packet;
pub mod progress;
pub mod queue;
pub mod ring_buffer;
pub mod sample_format;
pub mod sink;
pub mod source;
pub mod workers;

pub use cancellation::CancellationToken;
pub use config::PipelineConfig;
pub use errors::{ConfigError, FatalError, PipelineError};
pub use orchestrator::{run, PipelineMode, RunOptions, RunSummary};
pub use progress::{ProgressCallback, ProgressSnapshot};
