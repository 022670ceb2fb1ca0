// (c) 2026 The mqft authors

//! Kernel POSIX message queues
//!
//! Mailbox `id` in namespace `ns` is the queue `/ns.<id as 8 hex digits>`.
//! On Linux, live queues can be inspected under `/dev/mqueue` (if mounted).
//!
//! Caveats of the kernel primitive:
//! * An unlinked queue lives on while descriptors to it remain open, so a writer that opened a
//!   mailbox before it was destroyed can keep sending into it until the queue fills. From then
//!   on each retry checks that the queue name still exists, and fails with
//!   [`MailboxError::NotFound`] once it does not.
//! * An inbox therefore never reports an empty read; a silent peer shows up as a timeout.
//! * Queue depth and message size are capped by `/proc/sys/fs/mqueue/msg_max` and
//!   `msgsize_max` for unprivileged users.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::mqueue::{
    MQ_OFlag, MqAttr, MqdT, mq_attr_member_t, mq_close, mq_getattr, mq_open, mq_receive,
    mq_send, mq_timedreceive, mq_unlink,
};
use nix::sys::stat::Mode;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use tracing::{trace, warn};

use super::{CreateMode, Inbox, MailboxError, MailboxId, Outbox, PostOffice};
use crate::protocol::MAX_MESSAGE_SIZE;

/// Longest namespace we accept. Queue names are limited to `NAME_MAX`.
const MAX_NAMESPACE_LEN: usize = 200;

/// Backoff bounds while a destination queue is full
const RETRY_MIN: Duration = Duration::from_millis(1);
const RETRY_MAX: Duration = Duration::from_millis(50);

fn os(op: &'static str) -> impl Fn(Errno) -> MailboxError {
    move |errno| MailboxError::Os { op, errno }
}

/// Mailboxes are readable by their owner and writable by anyone:
/// clients write to the server's mailbox, workers write to clients' mailboxes.
fn mailbox_mode() -> Mode {
    Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IWGRP | Mode::S_IWOTH
}

/// A post office backed by kernel POSIX message queues
#[derive(Debug, Clone)]
pub struct PosixPostOffice {
    namespace: String,
    depth: usize,
}

impl PosixPostOffice {
    /// Constructor.
    ///
    /// `namespace` keeps unrelated deployments apart; `depth` is the number of messages each
    /// mailbox created through this post office can hold.
    pub fn new(namespace: &str, depth: usize) -> Result<Self, MailboxError> {
        if namespace.is_empty() || namespace.len() > MAX_NAMESPACE_LEN {
            return Err(MailboxError::Config(format!(
                "namespace must be 1 to {MAX_NAMESPACE_LEN} bytes long"
            )));
        }
        if namespace.contains(['/', '\0']) {
            return Err(MailboxError::Config(
                "namespace must not contain '/' or NUL".into(),
            ));
        }
        if depth == 0 {
            return Err(MailboxError::Config("queue depth must be at least 1".into()));
        }
        Ok(Self {
            namespace: namespace.to_owned(),
            depth,
        })
    }

    /// The kernel queue name for a mailbox
    #[must_use]
    pub fn queue_name(&self, id: MailboxId) -> String {
        format!("/{}.{:08x}", self.namespace, id.0)
    }

    fn attributes(&self) -> Result<MqAttr, MailboxError> {
        let depth = mq_attr_member_t::try_from(self.depth)
            .map_err(|_| MailboxError::Config(format!("queue depth {} too large", self.depth)))?;
        let message_size = mq_attr_member_t::try_from(MAX_MESSAGE_SIZE)
            .map_err(|_| MailboxError::Config("message size too large".into()))?;
        Ok(MqAttr::new(0, depth, message_size, 0))
    }
}

impl PostOffice for PosixPostOffice {
    type Inbox = PosixInbox;
    type Outbox = PosixOutbox;

    fn create(&self, id: MailboxId, mode: CreateMode) -> Result<PosixInbox, MailboxError> {
        let name = self.queue_name(id);
        let mut flags = MQ_OFlag::O_RDONLY | MQ_OFlag::O_CREAT | MQ_OFlag::O_CLOEXEC;
        if mode == CreateMode::Exclusive {
            flags |= MQ_OFlag::O_EXCL;
        }
        let attr = self.attributes()?;
        let mqd = match mq_open(name.as_str(), flags, mailbox_mode(), Some(&attr)) {
            Ok(mqd) => mqd,
            Err(Errno::EEXIST) => return Err(MailboxError::AlreadyExists(id)),
            Err(errno) => return Err(MailboxError::Os { op: "mq_open", errno }),
        };
        // An existing queue keeps its own attributes; size the buffer to what it really has.
        let message_size = mq_getattr(&mqd)
            .map_err(os("mq_getattr"))
            .and_then(|a| {
                usize::try_from(a.msgsize())
                    .map_err(|_| MailboxError::Config("negative message size".into()))
            });
        let message_size = match message_size {
            Ok(size) => size,
            Err(e) => {
                let _ = mq_close(mqd);
                return Err(e);
            }
        };
        trace!("created {name} (message size {message_size})");
        Ok(PosixInbox {
            id,
            name,
            mqd: Some(mqd),
            buffer: vec![0; message_size],
        })
    }

    fn open(&self, id: MailboxId) -> Result<PosixOutbox, MailboxError> {
        let name = self.queue_name(id);
        let flags = MQ_OFlag::O_WRONLY | MQ_OFlag::O_NONBLOCK | MQ_OFlag::O_CLOEXEC;
        match mq_open(name.as_str(), flags, Mode::empty(), None) {
            Ok(mqd) => Ok(PosixOutbox {
                id,
                name,
                mqd: Some(mqd),
            }),
            Err(Errno::ENOENT) => Err(MailboxError::NotFound(id)),
            Err(errno) => Err(MailboxError::Os { op: "mq_open", errno }),
        }
    }

    fn destroy(&self, id: MailboxId) -> Result<(), MailboxError> {
        match mq_unlink(self.queue_name(id).as_str()) {
            Ok(()) => Ok(()),
            Err(Errno::ENOENT) => Err(MailboxError::NotFound(id)),
            Err(errno) => Err(MailboxError::Os {
                op: "mq_unlink",
                errno,
            }),
        }
    }
}

fn close(name: &str, mqd: Option<MqdT>) {
    if let Some(mqd) = mqd {
        if let Err(e) = mq_close(mqd) {
            warn!("closing {name}: {e}");
        }
    }
}

/// Reading end of a kernel message queue
pub struct PosixInbox {
    id: MailboxId,
    name: String,
    mqd: Option<MqdT>,
    buffer: Vec<u8>,
}

impl Debug for PosixInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixInbox")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for PosixInbox {
    fn drop(&mut self) {
        close(&self.name, self.mqd.take());
    }
}

impl Inbox for PosixInbox {
    fn id(&self) -> MailboxId {
        self.id
    }

    fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<u8>>, MailboxError> {
        let Some(mqd) = self.mqd.as_ref() else {
            return Ok(None);
        };
        // mq_timedreceive wants an absolute CLOCK_REALTIME deadline
        let deadline = match timeout {
            None => None,
            Some(t) => Some(
                clock_gettime(ClockId::CLOCK_REALTIME).map_err(os("clock_gettime"))?
                    + TimeSpec::from_duration(t),
            ),
        };
        let mut priority = 0u32;
        loop {
            let result = match &deadline {
                None => mq_receive(mqd, &mut self.buffer, &mut priority),
                Some(deadline) => mq_timedreceive(mqd, &mut self.buffer, &mut priority, deadline),
            };
            match result {
                Ok(len) => return Ok(Some(self.buffer[..len].to_vec())),
                Err(Errno::EINTR) => trace!("receive interrupted, retrying"),
                Err(Errno::ETIMEDOUT) => return Err(MailboxError::Timeout),
                Err(Errno::EBADF) => return Ok(None),
                Err(errno) => {
                    return Err(MailboxError::Os {
                        op: "mq_receive",
                        errno,
                    })
                }
            }
        }
    }
}

/// Writing end of a kernel message queue
pub struct PosixOutbox {
    id: MailboxId,
    name: String,
    mqd: Option<MqdT>,
}

impl Debug for PosixOutbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixOutbox")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for PosixOutbox {
    fn drop(&mut self) {
        close(&self.name, self.mqd.take());
    }
}

impl PosixOutbox {
    /// Fails with [`MailboxError::NotFound`] if our queue has been unlinked since we opened it.
    fn ensure_linked(&self) -> Result<(), MailboxError> {
        let flags = MQ_OFlag::O_WRONLY | MQ_OFlag::O_NONBLOCK | MQ_OFlag::O_CLOEXEC;
        match mq_open(self.name.as_str(), flags, Mode::empty(), None) {
            Ok(mqd) => {
                close(&self.name, Some(mqd));
                Ok(())
            }
            Err(Errno::ENOENT) => Err(MailboxError::NotFound(self.id)),
            // Inconclusive (out of descriptors, say); keep waiting for room.
            Err(errno) => {
                trace!("checking {}: {errno}", self.name);
                Ok(())
            }
        }
    }
}

impl Outbox for PosixOutbox {
    fn destination(&self) -> MailboxId {
        self.id
    }

    fn send(&self, message: &[u8], timeout: Option<Duration>) -> Result<(), MailboxError> {
        let Some(mqd) = self.mqd.as_ref() else {
            return Err(MailboxError::Closed(self.id));
        };
        // The descriptor is non-blocking; a full queue is retried with backoff until the deadline.
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut backoff = RETRY_MIN;
        loop {
            match mq_send(mqd, message, 0) {
                Ok(()) => return Ok(()),
                Err(Errno::EINTR) => (),
                Err(Errno::EAGAIN) => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        return Err(MailboxError::Timeout);
                    }
                    self.ensure_linked()?;
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(RETRY_MAX);
                }
                Err(Errno::EMSGSIZE) => {
                    return Err(MailboxError::TooLarge {
                        size: message.len(),
                        limit: MAX_MESSAGE_SIZE as usize,
                    })
                }
                Err(errno) => return Err(MailboxError::Os { op: "mq_send", errno }),
            }
        }
    }
}
