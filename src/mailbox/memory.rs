// (c) 2026 The mqft authors

//! In-process mailboxes
//!
//! Each mailbox is a bounded channel. The post office keeps the sending half in a shared
//! registry; the [`Inbox`] owns the receiving half. Destroying a mailbox drops the registry
//! entry, so once in-flight sends finish the reader sees an empty read.
//!
//! A mailbox has exactly one reader, so [`CreateMode::OpenOrCreate`] on an existing
//! mailbox fails in the same way as [`CreateMode::Exclusive`].

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use super::{CreateMode, Inbox, MailboxError, MailboxId, Outbox, PostOffice};
use crate::protocol::MAX_MESSAGE_SIZE;

/// How long a full-mailbox send waits before retrying
const RETRY_INTERVAL: Duration = Duration::from_millis(2);

type Registry = HashMap<MailboxId, SyncSender<Vec<u8>>>;

/// A post office whose mailboxes live in this process
#[derive(Debug, Clone)]
pub struct MemoryPostOffice {
    registry: Arc<Mutex<Registry>>,
    depth: usize,
}

impl MemoryPostOffice {
    /// Constructor. Each mailbox holds up to `depth` messages.
    pub fn new(depth: usize) -> Result<Self, MailboxError> {
        if depth == 0 {
            return Err(MailboxError::Config("queue depth must be at least 1".into()));
        }
        Ok(Self {
            registry: Arc::default(),
            depth,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, id: MailboxId) -> Option<SyncSender<Vec<u8>>> {
        self.lock().get(&id).cloned()
    }

    /// Whether a mailbox currently exists
    #[must_use]
    pub fn exists(&self, id: MailboxId) -> bool {
        self.lock().contains_key(&id)
    }
}

impl PostOffice for MemoryPostOffice {
    type Inbox = MemoryInbox;
    type Outbox = MemoryOutbox;

    fn create(&self, id: MailboxId, mode: CreateMode) -> Result<MemoryInbox, MailboxError> {
        let mut registry = self.lock();
        if registry.contains_key(&id) {
            trace!("create {id} ({mode:?}): exists");
            return Err(MailboxError::AlreadyExists(id));
        }
        let (tx, rx) = mpsc::sync_channel(self.depth);
        let _ = registry.insert(id, tx);
        Ok(MemoryInbox { id, rx })
    }

    fn open(&self, id: MailboxId) -> Result<MemoryOutbox, MailboxError> {
        if !self.exists(id) {
            return Err(MailboxError::NotFound(id));
        }
        Ok(MemoryOutbox {
            id,
            office: self.clone(),
        })
    }

    fn destroy(&self, id: MailboxId) -> Result<(), MailboxError> {
        self.lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(MailboxError::NotFound(id))
    }
}

/// Reading end of an in-process mailbox
#[derive(Debug)]
pub struct MemoryInbox {
    id: MailboxId,
    rx: Receiver<Vec<u8>>,
}

impl Inbox for MemoryInbox {
    fn id(&self) -> MailboxId {
        self.id
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, MailboxError> {
        match timeout {
            None => Ok(self.rx.recv().ok()),
            Some(t) => match self.rx.recv_timeout(t) {
                Ok(message) => Ok(Some(message)),
                Err(RecvTimeoutError::Timeout) => Err(MailboxError::Timeout),
                Err(RecvTimeoutError::Disconnected) => Ok(None),
            },
        }
    }
}

/// Writing end of an in-process mailbox.
///
/// The destination is looked up afresh on every send, so sending to a destroyed
/// mailbox fails with [`MailboxError::NotFound`].
#[derive(Debug)]
pub struct MemoryOutbox {
    id: MailboxId,
    office: MemoryPostOffice,
}

impl Outbox for MemoryOutbox {
    fn destination(&self) -> MailboxId {
        self.id
    }

    fn send(&self, message: &[u8], timeout: Option<Duration>) -> Result<(), MailboxError> {
        let limit = MAX_MESSAGE_SIZE as usize;
        if message.len() > limit {
            return Err(MailboxError::TooLarge {
                size: message.len(),
                limit,
            });
        }
        let sender = self
            .office
            .sender(self.id)
            .ok_or(MailboxError::NotFound(self.id))?;
        let gone = |_| MailboxError::NotFound(self.id);

        let Some(timeout) = timeout else {
            return sender.send(message.to_vec()).map_err(gone);
        };
        let deadline = Instant::now() + timeout;
        let mut pending = message.to_vec();
        loop {
            match sender.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(MailboxError::NotFound(self.id)),
                Err(TrySendError::Full(m)) => {
                    if Instant::now() >= deadline {
                        return Err(MailboxError::Timeout);
                    }
                    pending = m;
                    std::thread::sleep(RETRY_INTERVAL);
                }
            }
        }
    }
}
