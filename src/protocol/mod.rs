// (c) 2026 The mqft authors

//! 📖 The mqft protocol
//!
//! mqft exchanges discrete messages between addressed [mailboxes](crate::mailbox).
//! There is one well-known mailbox, owned by the server, and one private mailbox per client session.
//!
//! ```text
//!  Client                          Server                    Worker
//!  ======                          ======                    ======
//!  (creates private mailbox)
//!    --- Request(id, pathname) -->
//!                                  (hands request to a worker) -->
//!                                                            (opens file)
//!    <------------------------------------------------------ Data
//!    <------------------------------------------------------ Data ...
//!    <------------------------------------------------------ End
//!  (destroys private mailbox)
//! ```
//!
//! * Each request produces exactly one terminal [`Response`]: either a single
//!   [`Failure`](Response::Failure), or any number of [`Data`](Response::Data) followed by
//!   one [`End`](Response::End).
//! * `Data` messages carry between 1 and [`MAX_PAYLOAD`] bytes, in file order.
//! * Responses are only ever sent to the mailbox named in the request.
//! * A client makes exactly one request per session.
//!
//! There is no cancellation message. A client that goes away simply destroys its mailbox;
//! the worker's next send fails (or times out) and the worker stops.
//!
//! ### Encoding
//!
//! See [`common`].

pub mod common;
pub use common::{CodecError, MAX_MESSAGE_SIZE, ProtocolMessage};

mod request;
pub use request::{MAX_PATHNAME_LEN, Pathname, PathnameError, Request};

mod response;
pub use response::{MAX_DIAGNOSTIC_LEN, MAX_PAYLOAD, Response};
