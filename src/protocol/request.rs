//! Client to server request
// (c) 2026 The mqft authors

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::common::ProtocolMessage;
use crate::mailbox::MailboxId;

/// The longest pathname a [`Request`] may carry, in bytes.
pub const MAX_PATHNAME_LEN: usize = 255;

/// Reasons a string is not acceptable as a [`Pathname`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathnameError {
    /// Nothing to ask for
    #[error("pathname is empty")]
    Empty,
    /// Over [`MAX_PATHNAME_LEN`]
    #[error("pathname is {0} bytes long (limit: {MAX_PATHNAME_LEN})")]
    TooLong(usize),
    /// Pathnames never contain NUL
    #[error("pathname contains a NUL byte")]
    ContainsNul,
}

/// A length-checked, NUL-free pathname.
///
/// Decoding from the wire enforces the same rules as construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pathname(String);

impl Pathname {
    /// Accessor
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Pathname {
    type Error = PathnameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(PathnameError::Empty);
        }
        if value.len() > MAX_PATHNAME_LEN {
            return Err(PathnameError::TooLong(value.len()));
        }
        if value.contains('\0') {
            return Err(PathnameError::ContainsNul);
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for Pathname {
    type Error = PathnameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_owned())
    }
}

impl From<Pathname> for String {
    fn from(value: Pathname) -> Self {
        value.0
    }
}

impl AsRef<std::path::Path> for Pathname {
    fn as_ref(&self) -> &std::path::Path {
        self.0.as_ref()
    }
}

impl Display for Pathname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request packet: the only message a client sends.
///
/// Responses go to `client_mailbox_id` and nowhere else.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct Request {
    /// The client's private mailbox
    pub client_mailbox_id: MailboxId,
    /// File to transfer
    pub pathname: Pathname,
}

impl ProtocolMessage for Request {
    const WIRE_ENCODING_LIMIT: u32 = 512;
}

#[cfg(test)]
mod test {
    use super::{MAX_PATHNAME_LEN, Pathname, PathnameError, Request};
    use crate::mailbox::MailboxId;
    use crate::protocol::{CodecError, ProtocolMessage as _};
    use pretty_assertions::assert_eq;

    #[test]
    fn pathname_bounds() {
        let longest = "x".repeat(MAX_PATHNAME_LEN);
        assert_eq!(Pathname::try_from(longest.as_str()).unwrap().as_str(), longest);
        let too_long = "x".repeat(MAX_PATHNAME_LEN + 1);
        assert_eq!(
            Pathname::try_from(too_long),
            Err(PathnameError::TooLong(MAX_PATHNAME_LEN + 1))
        );
        assert_eq!(Pathname::try_from(""), Err(PathnameError::Empty));
        assert_eq!(
            Pathname::try_from("/etc/\0passwd"),
            Err(PathnameError::ContainsNul)
        );
    }

    #[test]
    fn wire_encoding() {
        let req = Request {
            client_mailbox_id: MailboxId(0x0102_0304),
            pathname: Pathname::try_from("/a").unwrap(),
        };
        let wire = req.to_vec().unwrap();
        assert_eq!(wire, [4, 3, 2, 1, 2, b'/', b'a']);
        assert_eq!(Request::from_slice(&wire).unwrap(), req);
    }

    #[test]
    fn longest_request_fits() {
        let req = Request {
            client_mailbox_id: MailboxId(u32::MAX),
            pathname: Pathname::try_from("y".repeat(MAX_PATHNAME_LEN)).unwrap(),
        };
        assert!(req.to_vec().is_ok());
    }

    #[test]
    fn decode_rejects_bad_pathname() {
        // id, then a string containing NUL
        let wire = [1, 0, 0, 0, 3, b'a', 0, b'b'];
        let err = Request::from_slice(&wire).unwrap_err();
        assert!(matches!(err, CodecError::Bare(_)));
        // id, then an empty string
        let wire = [1, 0, 0, 0, 0];
        assert!(Request::from_slice(&wire).is_err());
    }
}
