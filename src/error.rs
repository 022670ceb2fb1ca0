//! Error taxonomy
// (c) 2026 The mqft authors

use crate::client::ClientState;
use crate::mailbox::{MailboxError, MailboxId};
use crate::protocol::{CodecError, PathnameError};

/// Reasons a message could not be sent
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The pathname is not acceptable for a request
    #[error(transparent)]
    Pathname(#[from] PathnameError),
    /// The message could not be encoded
    #[error(transparent)]
    Encode(#[from] CodecError),
    /// The destination is absent, full, or the OS refused
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

/// Everything that can go wrong in a client, server or worker
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A client or server could not allocate its mailbox
    #[error("could not create mailbox: {0}")]
    MailboxCreate(#[source] MailboxError),
    /// The server's well-known mailbox already exists; another server is probably running
    #[error("mailbox {0} already exists; is another server running?")]
    AlreadyRunning(MailboxId),
    /// A send failed. Fatal to the current request (client) or to the worker concerned.
    #[error("send failed: {0}")]
    Send(#[from] SendError),
    /// The requested file could not be opened (server side; reported to the client as `Failure`)
    #[error("{0}")]
    OpenFailure(String),
    /// The server told us the request failed
    #[error("server reported failure: {0}")]
    ServerFailure(String),
    /// The session ended without a terminal response
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The server could not start a worker for a request
    #[error("could not start worker: {0}")]
    Spawn(String),
    /// The server could not dequeue a request
    #[error("failed to receive request: {0}")]
    Receive(#[source] MailboxError),
    /// A client operation was called out of sequence
    #[error("operation not valid in session state {0}")]
    SessionState(ClientState),
    /// Local I/O (file or output sink)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Syntactic sugar
pub type Result<T, E = Error> = std::result::Result<T, E>;
