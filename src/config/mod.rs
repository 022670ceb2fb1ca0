// (c) 2026 The mqft authors
//! # 📖 Configuration management
//!
//! mqft obtains run-time configuration from the following sources, in order of priority:
//! 1. Command-line options
//! 2. Environment variables prefixed `MQFT_` (for example `MQFT_QUEUE_DEPTH=20`)
//! 3. The user's configuration file, `~/.mqft.toml`
//! 4. The system-wide configuration file, `/etc/mqft.toml`
//! 5. Hard-wired defaults
//!
//! Run `mqft config-files` for a list of which files we read,
//! and `mqft show-config` to see the result of merging them.
//!
//! ## File format
//!
//! Configuration files are [TOML](https://toml.io/). Every key is optional.
//!
//! ```toml
//! # Keep test deployments apart from production
//! namespace = "mqft-test"
//! # The server's well-known mailbox
//! server_id = 0x6d716674
//! # Messages each mailbox can hold
//! queue_depth = 10
//! max_workers = 64
//! # Seconds; 0 means wait forever
//! session_timeout = 30
//! send_timeout = 30
//! time_format = "utc"
//! ```
//!
//! The set of supported fields is the [`Configuration`] structure.
//!
//! ## Tips and traps
//! 1. Client and server must agree on `namespace` and `server_id`, or they will not find each other.
//! 1. With POSIX message queues, unprivileged users may not set `queue_depth` above
//!    `/proc/sys/fs/mqueue/msg_max` (usually 10).

mod manager;
pub use manager::Manager;

mod structure;
pub use structure::{Configuration, parse_mailbox_id};
