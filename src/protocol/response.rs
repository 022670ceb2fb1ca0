//! Server to client responses
// (c) 2026 The mqft authors

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::common::{CodecError, ProtocolMessage};

/// The most file bytes a single [`Response::Data`] carries.
pub const MAX_PAYLOAD: usize = 2048;

/// The longest diagnostic a [`Response::Failure`] carries, in bytes.
pub const MAX_DIAGNOSTIC_LEN: usize = 256;

/// Response packet.
///
/// For any one request the server sends either a single `Failure`,
/// or zero or more `Data` followed by exactly one `End`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, strum::IntoStaticStr)]
pub enum Response {
    /// The request could not be served. Terminal.
    ///
    /// The string is a short human-readable diagnostic.
    Failure(String),
    /// The next chunk of the file, in file order. Never empty.
    Data(Vec<u8>),
    /// The whole file has been sent. Terminal.
    End,
}

impl Response {
    /// Constructs a `Failure`, truncating the message to [`MAX_DIAGNOSTIC_LEN`] if necessary
    #[must_use]
    pub fn failure<S: Into<String>>(message: S) -> Self {
        let mut message = message.into();
        if message.len() > MAX_DIAGNOSTIC_LEN {
            let mut cut = MAX_DIAGNOSTIC_LEN;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self::Failure(message)
    }
}

impl ProtocolMessage for Response {
    fn validate(&self) -> Result<(), CodecError> {
        match self {
            Response::Failure(msg) if msg.len() > MAX_DIAGNOSTIC_LEN => Err(CodecError::Invalid(
                format!("diagnostic of {} bytes is too long", msg.len()),
            )),
            Response::Data(data) if data.is_empty() => {
                Err(CodecError::Invalid("empty Data response".into()))
            }
            Response::Data(data) if data.len() > MAX_PAYLOAD => Err(CodecError::Invalid(
                format!("Data payload of {} bytes is too long", data.len()),
            )),
            _ => Ok(()),
        }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Response::Failure(msg) => write!(f, "Failure ({msg})"),
            Response::Data(data) => write!(f, "Data ({} bytes)", data.len()),
            Response::End => f.write_str("End"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{MAX_DIAGNOSTIC_LEN, MAX_PAYLOAD, Response};
    use crate::protocol::{CodecError, MAX_MESSAGE_SIZE, ProtocolMessage as _};
    use pretty_assertions::assert_eq;

    #[test]
    fn failure_is_truncated_on_a_char_boundary() {
        // 'é' is two bytes, so MAX_DIAGNOSTIC_LEN falls in the middle of one
        let long = format!("x{}", "é".repeat(MAX_DIAGNOSTIC_LEN));
        let Response::Failure(msg) = Response::failure(long) else {
            panic!("expected Failure");
        };
        assert_eq!(msg.len(), MAX_DIAGNOSTIC_LEN - 1);
        assert!(Response::Failure(msg).to_vec().is_ok());
    }

    #[test]
    fn largest_data_fits_in_a_message() {
        let wire = Response::Data(vec![0xaa; MAX_PAYLOAD]).to_vec().unwrap();
        assert!(wire.len() <= MAX_MESSAGE_SIZE as usize);
    }

    #[test]
    fn payload_bounds_are_enforced() {
        assert!(matches!(
            Response::Data(vec![]).to_vec(),
            Err(CodecError::Invalid(_))
        ));
        assert!(matches!(
            Response::Data(vec![0; MAX_PAYLOAD + 1]).to_vec(),
            Err(CodecError::Invalid(_))
        ));
        // Variant 1 (Data) with a zero-length payload, hand-encoded
        assert!(matches!(
            Response::from_slice(&[1, 0]),
            Err(CodecError::Invalid(_))
        ));
    }

    #[test]
    fn wire_encoding() {
        assert_eq!(Response::End.to_vec().unwrap(), [2]);
        assert_eq!(Response::Data(vec![7, 8]).to_vec().unwrap(), [1, 2, 7, 8]);
        let decoded = Response::from_slice(&[0, 2, b'n', b'o']).unwrap();
        assert_eq!(decoded, Response::Failure("no".into()));
    }

    #[test]
    fn display() {
        assert_eq!(Response::Data(vec![0; 10]).to_string(), "Data (10 bytes)");
        assert_eq!(Response::End.to_string(), "End");
    }
}
