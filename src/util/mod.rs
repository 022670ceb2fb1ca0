//! General utility code that didn't fit anywhere else
// (c) 2026 The mqft authors

pub mod stats;

mod tracing;
pub use tracing::{
    TimeFormat, is_initialized as tracing_is_initialised, setup as setup_tracing, trace_level,
};

mod signal;
pub use signal::shutdown_signal;
