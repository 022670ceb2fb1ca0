// (c) 2026 The mqft authors

//! mqft serves files to local clients over an addressed-mailbox IPC channel,
//! normally kernel POSIX message queues.
//!
//! ## 📖 Documentation
//!
//! * [About the protocol](protocol)
//! * [Configuring mqft](config)
//! * [Mailboxes](mailbox)
//!
//! ## Overview
//!
//! A **server** owns a well-known mailbox. A **client** creates a private mailbox and sends one
//! request, naming the file it wants and where to send it. The server hands each request to a
//! worker of its own, which streams the file back to the client's mailbox as a sequence of
//! bounded `Data` messages followed by `End`, or replies with a single `Failure`.
//!
//! ```text
//!  client                      server                       worker
//!    | create private mailbox    |                            |
//!    |--- Request(id, path) ---->|                            |
//!    |                           |--- spawn ----------------->|
//!    |<------------------------------------ Data ... Data ----|
//!    |<------------------------------------ End --------------|
//!    | destroy private mailbox   |                            |
//! ```
//!
//! Workers share nothing. A slow client stalls only its own worker, and then only until the
//! send timeout. A worker whose client has destroyed its mailbox gives up as soon as it finds
//! no room to send.
//!
//! ## 🧰 Getting Started
//!
//! ```text
//! $ mqft server &
//! $ mqft get /etc/hostname
//! $ mqft get /var/log/syslog -o syslog.copy
//! ```
//!
//! ## Use as a library
//!
//! The [`server::Server`] and [`client::Client`] are generic over a [`mailbox::PostOffice`].
//! [`mailbox::memory::MemoryPostOffice`] keeps everything in one process, which is handy for
//! embedding and tests.

pub mod cli;
pub use cli::cli as main;

pub mod client;
pub mod config;
pub use config::Configuration;
pub mod error;
pub use error::{Error, Result};
pub mod mailbox;
pub mod protocol;
pub mod server;
pub mod session;
pub mod util;
