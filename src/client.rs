// (c) 2026 The mqft authors

//! Client side of a transfer
//!
//! A [`Client`] owns a private mailbox for the lifetime of one session:
//! [`connect`](Client::connect), then [`request`](Client::request) exactly once, then
//! [`receive_all`](Client::receive_all). The private mailbox is destroyed when the client
//! is dropped.

use std::io::Write;
use std::time::{Duration, Instant};

use human_repr::HumanDuration as _;
use tracing::{debug, trace};

use crate::error::{Error, Result, SendError};
use crate::mailbox::{CreateMode, Inbox, MailboxError, MailboxId, Outbox as _, PostOffice};
use crate::protocol::{Pathname, ProtocolMessage as _, Request, Response};

/// Where a client is in its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ClientState {
    /// Private mailbox exists, nothing sent yet
    Connected,
    /// The request is with the server
    RequestSent,
    /// Draining responses
    Receiving,
    /// `End` was received
    Completed,
    /// Something went wrong; the session cannot continue
    Failed,
}

/// Tuning for a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// The longest wait for each response. `None` waits forever.
    pub session_timeout: Option<Duration>,
    /// The longest wait for room in the server's mailbox. `None` waits forever.
    pub send_timeout: Option<Duration>,
    /// How many times to retry if a randomly-chosen mailbox id is already in use
    pub create_attempts: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            session_timeout: Some(Duration::from_secs(30)),
            send_timeout: Some(Duration::from_secs(30)),
            create_attempts: 8,
        }
    }
}

/// What a successful transfer amounted to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Payload bytes received
    pub bytes: u64,
    /// `Data` messages received
    pub messages: u64,
    /// From the start of [`Client::receive_all`] until `End`
    pub elapsed: Duration,
}

/// One client session
#[derive(Debug)]
pub struct Client<P: PostOffice> {
    office: P,
    inbox: P::Inbox,
    server: MailboxId,
    state: ClientState,
    options: ClientOptions,
}

impl<P: PostOffice> Client<P> {
    /// Creates a private mailbox and returns a client ready to send its request.
    ///
    /// Mailbox ids are chosen at random; a collision with an existing mailbox is retried
    /// with a fresh id, up to [`ClientOptions::create_attempts`] times.
    pub fn connect(office: P, server: MailboxId, options: ClientOptions) -> Result<Self> {
        let mut attempt = 0;
        let inbox = loop {
            let id = MailboxId::random();
            if id == server {
                continue;
            }
            match office.create(id, CreateMode::Exclusive) {
                Ok(inbox) => break inbox,
                Err(MailboxError::AlreadyExists(_)) if attempt < options.create_attempts => {
                    trace!("mailbox {id} in use, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(Error::MailboxCreate(e)),
            }
        };
        debug!("connected with mailbox {}", inbox.id());
        Ok(Self {
            office,
            inbox,
            server,
            state: ClientState::Connected,
            options,
        })
    }

    /// Our private mailbox
    #[must_use]
    pub fn id(&self) -> MailboxId {
        self.inbox.id()
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    fn require(&self, wanted: ClientState) -> Result<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(Error::SessionState(self.state))
        }
    }

    /// Asks the server for a file. Valid once per session.
    ///
    /// Fails with [`Error::Send`] if the pathname is unacceptable, or the server mailbox is
    /// absent or stays full beyond the send timeout.
    pub fn request(&mut self, pathname: &str) -> Result<()> {
        self.require(ClientState::Connected)?;
        let result = self.send_request(pathname).map_err(Error::from);
        self.state = if result.is_ok() {
            ClientState::RequestSent
        } else {
            ClientState::Failed
        };
        result
    }

    fn send_request(&self, pathname: &str) -> Result<(), SendError> {
        let request = Request {
            client_mailbox_id: self.inbox.id(),
            pathname: Pathname::try_from(pathname)?,
        };
        let wire = request.to_vec()?;
        let outbox = self.office.open(self.server)?;
        outbox.send(&wire, self.options.send_timeout)?;
        trace!("sent request for {pathname} to {}", self.server);
        Ok(())
    }

    /// Drains the session until a terminal response, writing any payload to `sink`.
    ///
    /// # Return
    /// * On `End`, the transfer statistics
    /// * On `Failure`, [`Error::ServerFailure`] with the server's diagnostic
    /// * [`Error::ProtocolViolation`] if the session stops without a terminal response:
    ///   the mailbox went away, nothing arrived within the session timeout, or a message
    ///   could not be understood
    pub fn receive_all(&mut self, sink: Option<&mut dyn Write>) -> Result<TransferStats> {
        self.require(ClientState::RequestSent)?;
        self.state = ClientState::Receiving;
        let result = self.drain(sink);
        self.state = if result.is_ok() {
            ClientState::Completed
        } else {
            ClientState::Failed
        };
        result
    }

    fn drain(&mut self, mut sink: Option<&mut dyn Write>) -> Result<TransferStats> {
        let start = Instant::now();
        let mut stats = TransferStats::default();
        loop {
            let wire = match self.inbox.receive(self.options.session_timeout) {
                Ok(Some(wire)) => wire,
                Ok(None) => {
                    return Err(Error::ProtocolViolation(
                        "session ended without a terminal response".into(),
                    ))
                }
                Err(MailboxError::Timeout) => {
                    let waited = self.options.session_timeout.unwrap_or_default();
                    return Err(Error::ProtocolViolation(format!(
                        "nothing received for {}",
                        waited.human_duration()
                    )));
                }
                Err(e) => return Err(Error::Receive(e)),
            };
            let response = Response::from_slice(&wire)
                .map_err(|e| Error::ProtocolViolation(format!("bad response: {e}")))?;
            trace!("received {response}");
            match response {
                Response::Failure(why) => return Err(Error::ServerFailure(why)),
                Response::Data(data) => {
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.write_all(&data)?;
                    }
                    stats.bytes += data.len() as u64;
                    stats.messages += 1;
                }
                Response::End => {
                    if let Some(sink) = sink.as_deref_mut() {
                        sink.flush()?;
                    }
                    stats.elapsed = start.elapsed();
                    return Ok(stats);
                }
            }
        }
    }
}

impl<P: PostOffice> Drop for Client<P> {
    fn drop(&mut self) {
        let id = self.inbox.id();
        match self.office.destroy(id) {
            Ok(()) => trace!("destroyed mailbox {id}"),
            Err(e) => debug!("destroying mailbox {id}: {e}"),
        }
    }
}

/// One-shot convenience: connect, request `pathname`, and receive it into `sink`.
pub fn fetch<P: PostOffice>(
    office: P,
    server: MailboxId,
    pathname: &str,
    sink: Option<&mut dyn Write>,
    options: ClientOptions,
) -> Result<TransferStats> {
    let mut client = Client::connect(office, server, options)?;
    client.request(pathname)?;
    client.receive_all(sink)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{Client, ClientOptions, ClientState, TransferStats};
    use crate::error::{Error, SendError};
    use crate::mailbox::memory::{MemoryInbox, MemoryPostOffice};
    use crate::mailbox::{
        CreateMode, Inbox as _, MailboxError, MailboxId, Outbox as _, PostOffice as _,
    };
    use crate::protocol::{PathnameError, ProtocolMessage as _, Request, Response};

    const SERVER: MailboxId = MailboxId(0x5e);

    fn options() -> ClientOptions {
        ClientOptions {
            session_timeout: Some(Duration::from_millis(100)),
            send_timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        }
    }

    fn setup() -> (MemoryPostOffice, MemoryInbox, Client<MemoryPostOffice>) {
        let office = MemoryPostOffice::new(8).unwrap();
        let server = office.create(SERVER, CreateMode::Exclusive).unwrap();
        let client = Client::connect(office.clone(), SERVER, options()).unwrap();
        (office, server, client)
    }

    /// Plays the server: takes the request, answers with `responses`
    fn serve(office: &MemoryPostOffice, server: &mut MemoryInbox, responses: &[Response]) -> Request {
        let wire = server.receive(Some(Duration::from_secs(1))).unwrap().unwrap();
        let request = Request::from_slice(&wire).unwrap();
        let outbox = office.open(request.client_mailbox_id).unwrap();
        for r in responses {
            outbox.send(&r.to_vec().unwrap(), None).unwrap();
        }
        request
    }

    #[test]
    fn happy_path() {
        let (office, mut server, mut client) = setup();
        assert_eq!(client.state(), ClientState::Connected);
        client.request("/etc/hostname").unwrap();
        assert_eq!(client.state(), ClientState::RequestSent);

        let request = serve(
            &office,
            &mut server,
            &[
                Response::Data(b"hello ".to_vec()),
                Response::Data(b"world\n".to_vec()),
                Response::End,
            ],
        );
        assert_eq!(request.client_mailbox_id, client.id());
        assert_eq!(request.pathname.as_str(), "/etc/hostname");

        let mut out = Vec::new();
        let stats = client.receive_all(Some(&mut out)).unwrap();
        assert_eq!(out, b"hello world\n");
        assert_eq!((stats.bytes, stats.messages), (12, 2));
        assert_eq!(client.state(), ClientState::Completed);
    }

    #[test]
    fn no_sink() {
        let (office, mut server, mut client) = setup();
        client.request("/x").unwrap();
        let _ = serve(&office, &mut server, &[Response::Data(vec![1; 10]), Response::End]);
        let stats = client.receive_all(None).unwrap();
        assert_eq!(
            stats,
            TransferStats {
                elapsed: stats.elapsed,
                bytes: 10,
                messages: 1
            }
        );
    }

    #[test]
    fn server_failure() {
        let (office, mut server, mut client) = setup();
        client.request("/no/such/file").unwrap();
        let _ = serve(
            &office,
            &mut server,
            &[Response::failure("/no/such/file: No such file or directory")],
        );
        let err = client.receive_all(None).unwrap_err();
        assert!(
            matches!(err, Error::ServerFailure(ref why) if why.contains("No such file")),
            "{err}"
        );
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[test]
    fn operations_out_of_order() {
        let (_office, _server, mut client) = setup();
        assert!(matches!(
            client.receive_all(None),
            Err(Error::SessionState(ClientState::Connected))
        ));
        client.request("/x").unwrap();
        assert!(matches!(
            client.request("/y"),
            Err(Error::SessionState(ClientState::RequestSent))
        ));
    }

    #[test]
    fn mailbox_vanishes() {
        let (office, _server, mut client) = setup();
        client.request("/x").unwrap();
        office.destroy(client.id()).unwrap();
        assert!(matches!(
            client.receive_all(None),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn silent_server() {
        let (_office, _server, mut client) = setup();
        client.request("/x").unwrap();
        assert!(matches!(
            client.receive_all(None),
            Err(Error::ProtocolViolation(_))
        ));
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[test]
    fn stream_cut_short() {
        let (office, mut server, mut client) = setup();
        client.request("/x").unwrap();
        let _ = serve(&office, &mut server, &[Response::Data(vec![0; 4])]);
        assert!(matches!(
            client.receive_all(None),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn junk_response() {
        let (office, mut server, mut client) = setup();
        client.request("/x").unwrap();
        let _ = serve(&office, &mut server, &[]);
        office.open(client.id()).unwrap().send(&[9, 9, 9], None).unwrap();
        assert!(matches!(
            client.receive_all(None),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn no_server() {
        let office = MemoryPostOffice::new(8).unwrap();
        let mut client = Client::connect(office, SERVER, options()).unwrap();
        assert!(matches!(
            client.request("/x"),
            Err(Error::Send(SendError::Mailbox(MailboxError::NotFound(SERVER))))
        ));
        assert_eq!(client.state(), ClientState::Failed);
    }

    #[test]
    fn bad_pathnames() {
        let (_office, _server, mut client) = setup();
        assert!(matches!(
            client.request(&"a".repeat(300)),
            Err(Error::Send(SendError::Pathname(PathnameError::TooLong(300))))
        ));
        let (_office, _server, mut client) = setup();
        assert!(matches!(
            client.request(""),
            Err(Error::Send(SendError::Pathname(PathnameError::Empty)))
        ));
    }

    #[test]
    fn drop_destroys_mailbox() {
        let (office, _server, client) = setup();
        let id = client.id();
        assert!(office.exists(id));
        drop(client);
        assert!(!office.exists(id));
    }

    /// Occupies the next `n` ids this thread's generator will hand out after `seed`
    fn occupy_next_ids(office: &MemoryPostOffice, seed: u64, n: usize) -> Vec<MemoryInbox> {
        fastrand::seed(seed);
        let ids: Vec<_> = (0..n).map(|_| MailboxId::random()).collect();
        fastrand::seed(seed);
        ids.into_iter()
            .map(|id| office.create(id, CreateMode::Exclusive).unwrap())
            .collect()
    }

    #[test]
    fn id_collisions_are_retried() {
        let office = MemoryPostOffice::new(8).unwrap();
        let taken = occupy_next_ids(&office, 0x1dea, 3);
        let client = Client::connect(office.clone(), SERVER, options()).unwrap();
        assert!(taken.iter().all(|inbox| inbox.id() != client.id()));
        assert!(office.exists(client.id()));
    }

    #[test]
    fn id_collisions_give_up_eventually() {
        let office = MemoryPostOffice::new(8).unwrap();
        let options = ClientOptions {
            create_attempts: 3,
            ..options()
        };
        // The first try and three retries
        let _taken = occupy_next_ids(&office, 0xbad, 4);
        let err = Client::connect(office, SERVER, options).unwrap_err();
        assert!(
            matches!(err, Error::MailboxCreate(MailboxError::AlreadyExists(_))),
            "{err}"
        );
    }

    #[test]
    fn distinct_mailboxes() {
        let (office, _server, a) = setup();
        let b = Client::connect(office, SERVER, options()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), SERVER);
    }
}
