// (c) 2026 The mqft authors

//! Encoding shared by every message in the [protocol](super)
//!
//! # On-Wire Framing
//!
//! Each protocol message travels as exactly one mailbox message.
//! The mailbox keeps message boundaries intact, so unlike a byte stream there is no
//! length header: the mailbox message *is* the frame.
//!
//! Messages are encoded using [BARE].
//!
//! [BARE]: https://www.ietf.org/archive/id/draft-devault-bare-11.html
//! [serde_bare]: https://docs.rs/serde_bare/latest/serde_bare/

use serde_bare::error::Error as sbError;

/// The size of a single mailbox message. Every protocol message must encode to no more than this.
pub const MAX_MESSAGE_SIZE: u32 = 4096;

/// Things that can go wrong turning a protocol message into bytes, or back
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoding is longer than the type permits
    #[error("wire message size {size} was too long for {type_name} (limit: {limit})")]
    TooLong {
        /// Encoded (or received) size
        size: usize,
        /// The message type concerned
        type_name: &'static str,
        /// The type's [`WIRE_ENCODING_LIMIT`](ProtocolMessage::WIRE_ENCODING_LIMIT)
        limit: u32,
    },
    /// The BARE layer rejected the data
    #[error(transparent)]
    Bare(#[from] sbError),
    /// The message decoded but breaks a protocol rule
    #[error("invalid message: {0}")]
    Invalid(String),
}

/// Provides encoding and decoding for all structs taking part in our protocol.
///
/// N.B. Message structs are not expected to override the provided implementations,
/// other than [`validate`](Self::validate).
pub trait ProtocolMessage
where
    Self: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Specifies an absolute limit on the wire encoding of this type.
    /// Encoding and decoding both refuse anything longer.
    const WIRE_ENCODING_LIMIT: u32 = MAX_MESSAGE_SIZE;

    /// Checks a size against this type's [`WIRE_ENCODING_LIMIT`](Self::WIRE_ENCODING_LIMIT).
    fn check_size(size: usize) -> Result<(), CodecError> {
        if size > Self::WIRE_ENCODING_LIMIT as usize {
            return Err(CodecError::TooLong {
                size,
                type_name: std::any::type_name::<Self>(),
                limit: Self::WIRE_ENCODING_LIMIT,
            });
        }
        Ok(())
    }

    /// Semantic checks beyond what the type system expresses.
    ///
    /// Called before encoding and after decoding.
    fn validate(&self) -> Result<(), CodecError> {
        Ok(())
    }

    /// Creates this struct from one mailbox message
    fn from_slice(slice: &[u8]) -> Result<Self, CodecError> {
        Self::check_size(slice.len())?;
        let message: Self = serde_bare::from_slice(slice)?;
        message.validate()?;
        Ok(message)
    }

    /// Serializes this struct into one mailbox message
    fn to_vec(&self) -> Result<Vec<u8>, CodecError> {
        self.validate()?;
        let vec = serde_bare::to_vec(&self)?;
        Self::check_size(vec.len())?;
        Ok(vec)
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{CodecError, ProtocolMessage};
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestMessage {
        data: Vec<u8>,
    }

    impl ProtocolMessage for TestMessage {
        const WIRE_ENCODING_LIMIT: u32 = 16;
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Even(u8);

    impl ProtocolMessage for Even {
        fn validate(&self) -> Result<(), CodecError> {
            if self.0 % 2 == 1 {
                return Err(CodecError::Invalid(format!("{} is odd", self.0)));
            }
            Ok(())
        }
    }

    #[test]
    fn slicing() {
        let msg = TestMessage {
            data: vec![4, 5, 6],
        };
        let vec = msg.to_vec().unwrap();
        assert_eq!(vec, [3, 4, 5, 6]);
        let decoded = TestMessage::from_slice(&vec).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn serialize_limit() {
        let msg = TestMessage {
            data: vec![0u8; TestMessage::WIRE_ENCODING_LIMIT as usize],
        };
        let err = msg.to_vec().expect_err("an error was expected");
        assert!(matches!(err, CodecError::TooLong { limit: 16, .. }));
    }

    #[test]
    fn deserialize_limit() {
        let buf = [17u8; 18];
        let err = TestMessage::from_slice(&buf).expect_err("an error was expected");
        assert!(matches!(err, CodecError::TooLong { size: 18, .. }));
    }

    #[test]
    fn deserialize_junk_insufficient_data() {
        // Length says 10, only 3 follow
        let buf = [10u8, 1, 2, 3];
        let err = TestMessage::from_slice(&buf).expect_err("an error was expected");
        assert!(matches!(err, CodecError::Bare(_)));
    }

    #[test]
    fn validation_applies_both_ways() {
        assert!(matches!(Even(3).to_vec(), Err(CodecError::Invalid(_))));
        assert!(matches!(Even::from_slice(&[5]), Err(CodecError::Invalid(_))));
        assert_eq!(Even::from_slice(&Even(4).to_vec().unwrap()).unwrap(), Even(4));
    }
}
