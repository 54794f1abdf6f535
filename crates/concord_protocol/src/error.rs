//! # Codec Error Types

use thiserror::Error;

use crate::kind::MessageKind;

/// Errors that can occur while encoding a message.
///
/// Decoding never errors: a payload that cannot be read is simply absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The encoded message would not fit in one datagram.
    #[error("{kind} message exceeds {limit} bytes")]
    MessageTooLarge {
        /// Kind of the message being encoded.
        kind: MessageKind,
        /// Maximum encoded size.
        limit: usize,
    },
}
