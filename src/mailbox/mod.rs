// (c) 2026 The mqft authors

//! Addressed mailboxes
//!
//! A mailbox is a kernel- (or process-) managed queue of discrete messages, named by a
//! [`MailboxId`]. Message boundaries are always preserved, and messages from one sender to
//! one mailbox arrive in the order they were sent.
//!
//! A [`PostOffice`] creates, opens and destroys mailboxes. Creating a mailbox yields an
//! [`Inbox`], through which its single reader receives; opening one yields an [`Outbox`],
//! through which any number of writers send.
//!
//! Two post offices are provided:
//! * [`posix::PosixPostOffice`] uses kernel POSIX message queues and works between processes;
//! * [`memory::MemoryPostOffice`] lives inside one process. It is intended for tests and embedding.

use std::fmt::{Debug, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod memory;
#[cfg(unix)]
pub mod posix;

/// Identifies a mailbox within a post office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailboxId(pub u32);

impl MailboxId {
    /// A random id, for a private mailbox.
    /// Collisions are possible; the caller must create the mailbox exclusively.
    #[must_use]
    pub fn random() -> Self {
        Self(fastrand::u32(1..))
    }
}

impl Display for MailboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for MailboxId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// How [`PostOffice::create`] treats an existing mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Fail with [`MailboxError::AlreadyExists`]
    Exclusive,
    /// Attach to it (where the post office supports that)
    OpenOrCreate,
}

/// Mailbox layer errors
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    /// Exclusive creation found the mailbox present
    #[error("mailbox {0} already exists")]
    AlreadyExists(MailboxId),
    /// There is no such mailbox (or it has been destroyed)
    #[error("mailbox {0} does not exist")]
    NotFound(MailboxId),
    /// The mailbox closed under us
    #[error("mailbox {0} was closed")]
    Closed(MailboxId),
    /// Nothing arrived, or no room was made, within the allotted time
    #[error("timed out")]
    Timeout,
    /// The message does not fit in one mailbox message
    #[error("message of {size} bytes exceeds the mailbox limit of {limit}")]
    TooLarge {
        /// attempted size
        size: usize,
        /// mailbox message size
        limit: usize,
    },
    /// Bad post office parameters
    #[error("invalid mailbox configuration: {0}")]
    Config(String),
    /// An operating system call failed
    #[cfg(unix)]
    #[error("{op}: {errno}")]
    Os {
        /// the call that failed
        op: &'static str,
        /// what the OS said
        errno: nix::errno::Errno,
    },
}

/// Creates, opens and destroys mailboxes.
///
/// Implementations are cheap handles: cloning one yields another handle to the same
/// set of mailboxes.
pub trait PostOffice: Clone + Debug + Send + Sync + 'static {
    /// Reading end of a mailbox
    type Inbox: Inbox;
    /// Writing end of a mailbox
    type Outbox: Outbox;

    /// Creates a mailbox and returns its reading end.
    fn create(&self, id: MailboxId, mode: CreateMode) -> Result<Self::Inbox, MailboxError>;

    /// Opens an existing mailbox for sending.
    fn open(&self, id: MailboxId) -> Result<Self::Outbox, MailboxError>;

    /// Removes a mailbox. Messages still queued are lost.
    fn destroy(&self, id: MailboxId) -> Result<(), MailboxError>;
}

/// The reading end of a mailbox
pub trait Inbox: Debug + Send + 'static {
    /// Which mailbox this is
    fn id(&self) -> MailboxId;

    /// Blocks until a message arrives.
    ///
    /// # Return
    /// * `Ok(Some(message))`
    /// * `Ok(None)` is an empty read: the mailbox has gone away and nothing more will arrive.
    /// * `Err(MailboxError::Timeout)` if `timeout` elapsed first.
    fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, MailboxError>;
}

/// The writing end of a mailbox
pub trait Outbox: Debug + Send + 'static {
    /// Which mailbox this sends to
    fn destination(&self) -> MailboxId;

    /// Sends one message, blocking while the mailbox is full.
    ///
    /// If `timeout` elapses while the mailbox is still full, returns [`MailboxError::Timeout`].
    /// A zero timeout makes a single attempt.
    fn send(&self, message: &[u8], timeout: Option<Duration>) -> Result<(), MailboxError>;
}

#[cfg(test)]
mod test {
    use super::MailboxId;

    #[test]
    fn display() {
        assert_eq!(MailboxId(0x6d71_6674).to_string(), "0x6d716674");
        assert_eq!(MailboxId(1).to_string(), "0x00000001");
    }

    #[test]
    fn random_is_never_zero() {
        for _ in 0..1000 {
            assert_ne!(MailboxId::random(), MailboxId(0));
        }
    }
}
