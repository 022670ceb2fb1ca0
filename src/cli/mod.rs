//! Command Line Interface for mqft
// (c) 2026 The mqft authors
mod args;
mod cli_main;
pub mod styles;
pub use cli_main::cli;
