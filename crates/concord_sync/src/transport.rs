//! # Transport Interface
//!
//! The session layer is a name-addressed pub/sub byte channel with at most
//! one handler per channel name. Handlers may be invoked from any thread;
//! they only enqueue the payload for the next tick.

use concord_protocol::{Delivery, MessageKind};
use crossbeam_channel::{Receiver, Sender};

use crate::error::TransportError;

/// Callback invoked by the transport with one received payload.
pub type InboundHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Interface to the external transport/session layer.
pub trait Transport {
    /// Registers the handler for `channel`, replacing any previous one.
    ///
    /// # Errors
    /// [`TransportError::RegistrationRejected`] if the channel cannot be used.
    fn register_channel_handler(
        &mut self,
        channel: &str,
        handler: InboundHandler,
    ) -> Result<(), TransportError>;

    /// Hands one payload to the transport. Fire-and-forget.
    ///
    /// # Errors
    /// [`TransportError::SendFailed`] if the payload was refused outright.
    fn send(&mut self, channel: &str, payload: &[u8], delivery: Delivery)
        -> Result<(), TransportError>;

    /// Display name of the local peer, if the session knows it.
    fn local_peer_name(&self) -> Option<String>;
}

/// One payload received on a sync channel, waiting for the tick thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundDatagram {
    /// Kind implied by the channel it arrived on.
    pub kind: MessageKind,
    /// Raw payload.
    pub payload: Vec<u8>,
}

/// Queue between transport callbacks and the tick thread.
pub(crate) fn inbound_queue() -> (Sender<InboundDatagram>, Receiver<InboundDatagram>) {
    crossbeam_channel::unbounded()
}

/// Builds the handler for one channel: every payload is queued with its kind.
pub(crate) fn queueing_handler(kind: MessageKind, sender: Sender<InboundDatagram>) -> InboundHandler {
    Box::new(move |payload: &[u8]| {
        // Receiver gone means the session is shutting down.
        let _ = sender.send(InboundDatagram {
            kind,
            payload: payload.to_vec(),
        });
    })
}
