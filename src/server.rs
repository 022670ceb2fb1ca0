//! Server accept loop
// (c) 2026 The mqft authors

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, trace, warn};

use crate::error::{Error, Result};
use crate::mailbox::{CreateMode, Inbox, MailboxError, MailboxId, Outbox as _, PostOffice};
use crate::protocol::{ProtocolMessage as _, Request, Response};
use crate::session::{WorkerOutcome, worker};

/// What a client is told when no worker can be started for it
pub const BUSY: &str = "server busy";

/// Server tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// How many workers may run at once. Requests beyond this are refused.
    pub max_workers: usize,
    /// The longest a worker waits for room in a client's mailbox. `None` waits forever.
    pub send_timeout: Option<Duration>,
    /// How often the listener checks whether the server is shutting down
    pub poll_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_workers: 64,
            send_timeout: Some(Duration::from_secs(30)),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Counters kept by the accept loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Requests dispatched to a worker
    pub accepted: u64,
    /// Workers that sent a whole file
    pub completed: u64,
    /// Workers that reported an open failure
    pub refused: u64,
    /// Workers that gave up part way (send failure, read error, panic)
    pub aborted: u64,
    /// Requests turned away because the worker limit was reached
    pub busy: u64,
    /// Payload bytes sent by completed workers
    pub bytes: u64,
}

impl Display for ServerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use human_repr::HumanCount as _;
        write!(
            f,
            "{} requests: {} completed ({}), {} refused, {} aborted, {} busy",
            self.accepted,
            self.completed,
            self.bytes.human_count_bytes(),
            self.refused,
            self.aborted,
            self.busy,
        )
    }
}

/// Owns the well-known mailbox; destroys it when dropped
#[derive(Debug)]
struct WellKnownMailbox<P: PostOffice> {
    office: P,
    id: MailboxId,
}

impl<P: PostOffice> Drop for WellKnownMailbox<P> {
    fn drop(&mut self) {
        match self.office.destroy(self.id) {
            Ok(()) => debug!("destroyed mailbox {}", self.id),
            Err(e) => warn!("destroying mailbox {}: {e}", self.id),
        }
    }
}

type Incoming = std::result::Result<Request, MailboxError>;

/// A file transfer server, listening on its well-known mailbox
#[derive(Debug)]
pub struct Server<P: PostOffice> {
    mailbox: WellKnownMailbox<P>,
    inbox: P::Inbox,
    options: ServerOptions,
}

impl<P: PostOffice> Server<P> {
    /// Creates the well-known mailbox.
    ///
    /// Fails with [`Error::AlreadyRunning`] if it exists already.
    pub fn start(office: P, id: MailboxId, options: ServerOptions) -> Result<Self> {
        let inbox = office
            .create(id, CreateMode::Exclusive)
            .map_err(|e| match e {
                MailboxError::AlreadyExists(id) => Error::AlreadyRunning(id),
                e => Error::MailboxCreate(e),
            })?;
        info!("listening on mailbox {id}");
        Ok(Self {
            mailbox: WellKnownMailbox { office, id },
            inbox,
            options,
        })
    }

    /// The well-known mailbox
    #[must_use]
    pub fn id(&self) -> MailboxId {
        self.mailbox.id
    }

    /// Accepts and serves requests until `shutdown` completes.
    ///
    /// Each request is handed to its own worker on the blocking thread pool. Finished workers
    /// are reaped as the loop goes. On shutdown the loop stops accepting, waits for in-flight
    /// workers, and destroys the well-known mailbox.
    ///
    /// A receive failure also destroys the mailbox, and is returned as [`Error::Receive`].
    pub async fn accept_loop<F>(self, shutdown: F) -> Result<ServerStats>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mailbox,
            inbox,
            options,
        } = self;
        let (tx, mut rx) = mpsc::channel(1);
        let poll = options.poll_interval;
        let listener = std::thread::Builder::new()
            .name("mqft-listener".into())
            .spawn(move || listen(inbox, &tx, poll))?;

        let mut workers = JoinSet::new();
        let mut stats = ServerStats::default();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutting down");
                    break Ok(());
                }
                incoming = rx.recv() => match incoming {
                    Some(Ok(request)) => {
                        dispatch(&mailbox, &mut workers, &mut stats, request, &options);
                    }
                    Some(Err(e)) => {
                        error!("receive failed: {e}");
                        break Err(Error::Receive(e));
                    }
                    None => break Err(Error::Receive(MailboxError::Closed(mailbox.id))),
                },
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    record(joined, &mut stats);
                }
            }
        };

        drop(rx);
        if !workers.is_empty() {
            debug!("waiting for {} workers", workers.len());
        }
        while let Some(joined) = workers.join_next().await {
            record(joined, &mut stats);
        }
        match tokio::task::spawn_blocking(move || listener.join()).await {
            Ok(Ok(())) => trace!("listener finished"),
            _ => warn!("listener thread panicked"),
        }
        drop(mailbox);
        info!("{stats}");
        result.map(|()| stats)
    }
}

/// Blocking receive loop; runs on its own thread.
///
/// Undecodable requests carry no trustworthy reply address, so they are dropped here.
fn listen<I: Inbox>(mut inbox: I, tx: &mpsc::Sender<Incoming>, poll: Duration) {
    let id = inbox.id();
    while !tx.is_closed() {
        let item = match inbox.receive(Some(poll)) {
            Ok(Some(wire)) => match Request::from_slice(&wire) {
                Ok(request) => Ok(request),
                Err(e) => {
                    warn!("discarding undecodable request ({} bytes): {e}", wire.len());
                    continue;
                }
            },
            Ok(None) => Err(MailboxError::Closed(id)),
            Err(MailboxError::Timeout) => continue,
            Err(e) => Err(e),
        };
        let fatal = item.is_err();
        if tx.blocking_send(item).is_err() || fatal {
            break;
        }
    }
    trace!("listener exiting");
}

fn dispatch<P: PostOffice>(
    mailbox: &WellKnownMailbox<P>,
    workers: &mut JoinSet<Result<WorkerOutcome>>,
    stats: &mut ServerStats,
    request: Request,
    options: &ServerOptions,
) {
    while let Some(joined) = workers.try_join_next() {
        record(joined, stats);
    }
    debug!(
        "request from {} for {}",
        request.client_mailbox_id, request.pathname
    );
    if request.client_mailbox_id == mailbox.id {
        warn!("ignoring request that names our own mailbox as its reply address");
        return;
    }
    let office = &mailbox.office;

    if workers.len() >= options.max_workers {
        let e = Error::Spawn(format!("{} workers already running", workers.len()));
        warn!("{}: {e}", request.client_mailbox_id);
        stats.busy += 1;
        refuse(office, &request);
        return;
    }

    stats.accepted += 1;
    let office = office.clone();
    let send_timeout = options.send_timeout;
    let span = info_span!("worker", client = %request.client_mailbox_id, path = %request.pathname);
    let _ = workers.spawn_blocking(move || {
        let _guard = span.enter();
        let result = worker(&office, &request, send_timeout);
        match &result {
            Ok(outcome) => debug!("{outcome}"),
            Err(e) => warn!("{e}"),
        }
        result
    });
}

/// Best-effort notice that no worker was available. Never blocks.
fn refuse<P: PostOffice>(office: &P, request: &Request) {
    let sent = Response::failure(BUSY)
        .to_vec()
        .map_err(|e| e.to_string())
        .and_then(|wire| {
            office
                .open(request.client_mailbox_id)
                .and_then(|outbox| outbox.send(&wire, Some(Duration::ZERO)))
                .map_err(|e| e.to_string())
        });
    if let Err(e) = sent {
        debug!("could not tell {} we are busy: {e}", request.client_mailbox_id);
    }
}

fn record(joined: std::result::Result<Result<WorkerOutcome>, JoinError>, stats: &mut ServerStats) {
    match joined {
        Ok(Ok(WorkerOutcome::Completed { bytes, .. })) => {
            stats.completed += 1;
            stats.bytes += bytes;
        }
        Ok(Ok(WorkerOutcome::Refused(_))) => stats.refused += 1,
        Ok(Err(_)) => stats.aborted += 1,
        Err(e) => {
            error!("worker panicked: {e}");
            stats.aborted += 1;
        }
    }
}
