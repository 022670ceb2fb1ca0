//! Server-side worker: serves one request
// (c) 2026 The mqft authors

use std::fmt::Display;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result, SendError};
use crate::mailbox::{Outbox, PostOffice};
use crate::protocol::{MAX_PAYLOAD, ProtocolMessage as _, Request, Response};

/// How a worker finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The file was sent, followed by `End`
    Completed {
        /// payload bytes sent
        bytes: u64,
        /// `Data` messages sent
        messages: u64,
    },
    /// The file could not be opened; `Failure` was sent
    Refused(String),
}

impl Display for WorkerOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerOutcome::Completed { bytes, messages } => {
                write!(f, "sent {bytes} bytes in {messages} messages")
            }
            WorkerOutcome::Refused(why) => write!(f, "refused: {why}"),
        }
    }
}

/// One in-flight transfer.
///
/// Owned by exactly one worker. Nothing in here is shared with any other session.
#[derive(Debug)]
struct Session<O: Outbox> {
    outbox: O,
    file: File,
    /// Bytes read (and sent) so far
    cursor: u64,
    messages: u64,
    send_timeout: Option<Duration>,
}

impl<O: Outbox> Session<O> {
    fn send(&self, response: &Response) -> Result<()> {
        trace!("sending {response} to {}", self.outbox.destination());
        let wire = response.to_vec().map_err(SendError::from)?;
        self.outbox
            .send(&wire, self.send_timeout)
            .map_err(|e| Error::Send(e.into()))
    }

    /// Fills `buf` as far as the file allows. Returns 0 only at end of file.
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Streams the whole file as `Data` messages, then `End`.
    fn stream(mut self, pathname: &str) -> Result<WorkerOutcome> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        loop {
            let n = match self.read_chunk(&mut buf) {
                Ok(n) => n,
                // Nothing sent yet: the client can still be told properly.
                Err(e) if self.messages == 0 => {
                    let why = format!("{pathname}: {e}");
                    self.send(&Response::failure(why.clone()))?;
                    return Ok(WorkerOutcome::Refused(why));
                }
                // Data has already gone out, so Failure would break the protocol.
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                break;
            }
            self.send(&Response::Data(buf[..n].to_vec()))?;
            self.cursor += n as u64;
            self.messages += 1;
        }
        self.send(&Response::End)?;
        Ok(WorkerOutcome::Completed {
            bytes: self.cursor,
            messages: self.messages,
        })
    }
}

/// Opens a file for streaming. Directories are refused up front.
fn open_for_reading(pathname: &str) -> Result<File> {
    let file = File::open(pathname)
        .map_err(|e| Error::OpenFailure(format!("{pathname}: {e}")))?;
    let meta = file
        .metadata()
        .map_err(|e| Error::OpenFailure(format!("{pathname}: {e}")))?;
    if meta.is_dir() {
        return Err(Error::OpenFailure(format!("{pathname}: is a directory")));
    }
    Ok(file)
}

/// Serves one request, start to finish.
///
/// * If the file cannot be opened, sends a single `Failure` and returns [`WorkerOutcome::Refused`].
/// * Otherwise sends the file in order as `Data` messages of up to [`MAX_PAYLOAD`] bytes,
///   then one `End` (even for an empty file).
///
/// A send failure aborts the worker with [`Error::Send`]; nothing is retried, and the client
/// will have received only part of the stream.
pub fn worker<P: PostOffice>(
    office: &P,
    request: &Request,
    send_timeout: Option<Duration>,
) -> Result<WorkerOutcome> {
    let pathname = request.pathname.as_str();
    let outbox = office
        .open(request.client_mailbox_id)
        .map_err(|e| Error::Send(e.into()))?;

    match open_for_reading(pathname) {
        Ok(file) => {
            debug!("streaming to {}", outbox.destination());
            Session {
                outbox,
                file,
                cursor: 0,
                messages: 0,
                send_timeout,
            }
            .stream(pathname)
        }
        Err(Error::OpenFailure(why)) => {
            debug!("{why}");
            let wire = Response::failure(why.as_str())
                .to_vec()
                .map_err(SendError::from)?;
            outbox
                .send(&wire, send_timeout)
                .map_err(|e| Error::Send(e.into()))
                .inspect_err(|e| warn!("could not deliver failure: {e}"))?;
            Ok(WorkerOutcome::Refused(why))
        }
        Err(e) => Err(e),
    }
}
