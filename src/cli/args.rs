//! Command line arguments
// (c) 2026 The mqft authors

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use super::styles::CLAP_STYLES;
use crate::config::parse_mailbox_id;
use crate::util::TimeFormat;

/// File transfer over kernel message queues
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about,
    long_about = None,
    styles = CLAP_STYLES,
    infer_long_args(true),
    arg_required_else_help(true),
)]
pub(crate) struct CliArgs {
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=mqft=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, global(true), action, help_heading("Debug"))]
    pub(crate) debug: bool,

    /// Quiet mode: reports only errors
    #[arg(
        short,
        long,
        global(true),
        action,
        conflicts_with("debug"),
        help_heading("Output")
    )]
    pub(crate) quiet: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(
        short('l'),
        long,
        global(true),
        value_name("FILE"),
        help_heading("Output"),
        next_line_help(true)
    )]
    pub(crate) log_file: Option<String>,

    #[command(flatten)]
    pub(crate) config: ConfigurationOverrides,

    #[command(subcommand)]
    pub(crate) mode: MainMode,
}

/// What we have been asked to do
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum MainMode {
    /// Serve files until interrupted
    Server,
    /// Fetch a file from the server
    Get {
        /// The file to fetch, as the server sees it
        pathname: String,
        /// Write the file here instead of to standard output
        #[arg(short, long, value_name("FILE"))]
        output: Option<PathBuf>,
    },
    /// Outputs the configuration, and where each value came from, then exits
    ShowConfig,
    /// Outputs the paths to configuration file(s), then exits
    ConfigFiles,
}

/// Configuration settings given on the command line.
///
/// These override every other configuration source.
/// Fields left unset are not serialized, so they do not mask lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, clap::Args, Serialize)]
pub(crate) struct ConfigurationOverrides {
    /// Prefix of every queue name. Client and server must agree.
    #[arg(long, global(true), value_name("NAME"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) namespace: Option<String>,

    /// The server's well-known mailbox (decimal, or hex with 0x)
    #[arg(long, global(true), value_name("ID"), value_parser(parse_mailbox_id), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) server_id: Option<u32>,

    /// How many messages each mailbox holds
    #[arg(long, global(true), value_name("N"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) queue_depth: Option<usize>,

    /// Server: how many requests to serve at once
    #[arg(long, global(true), value_name("N"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_workers: Option<usize>,

    /// Client: seconds to wait for each response (0 = forever)
    #[arg(long, global(true), value_name("SECONDS"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) session_timeout: Option<u64>,

    /// Seconds to wait for room in a full mailbox (0 = forever)
    #[arg(long, global(true), value_name("SECONDS"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) send_timeout: Option<u64>,

    /// Format of log message timestamps
    #[arg(long, global(true), value_name("FORMAT"), help_heading("Output"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) time_format: Option<TimeFormat>,
}
