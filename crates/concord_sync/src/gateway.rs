//! # Dispatch Gateway
//!
//! The single point of contact with the transport.
//!
//! ## Send Path
//!
//! ```text
//! SyncMessage ─> stamp local peer ─> encode ─> transport.send(channel, bytes, delivery)
//! ```
//!
//! ## Receive Path
//!
//! ```text
//! transport callback ─> inbound queue ─(tick)─> decode by channel kind
//!                                                  │
//!                          origin == local peer? ──┴─> drop (self-echo)
//!                                                  │
//!                                                  └─> routed to apply-path
//! ```
//!
//! The transport may be a relay fabric that hands a peer its own broadcasts
//! back, so every inbound message is checked against the local identity.
//! Each send and each receive is isolated: one failure never blocks another.

use std::fmt;

use concord_protocol::{MessageKind, MessageSerializer, SyncMessage};
use crossbeam_channel::Receiver;

use crate::error::GatewayError;
use crate::transport::{inbound_queue, queueing_handler, InboundDatagram, Transport};

/// Display name of the local peer, fixed for the session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Uses the transport's name, or `fallback` if it has none.
    #[must_use]
    pub fn resolve(reported: Option<String>, fallback: &str) -> Self {
        match reported {
            Some(name) if !name.is_empty() => Self(name),
            _ => Self(fallback.to_owned()),
        }
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gateway statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Messages handed to the transport.
    pub sent: u64,
    /// Messages that failed to encode or send.
    pub send_failures: u64,
    /// Payloads received.
    pub received: u64,
    /// Payloads that did not decode for their channel.
    pub decode_failures: u64,
    /// Own messages echoed back and dropped.
    pub echoes_suppressed: u64,
    /// Messages routed to an apply-path.
    pub routed: u64,
}

/// Owns the transport for one session.
pub struct DispatchGateway<T: Transport> {
    /// The external transport.
    transport: T,
    /// Local peer name stamped on every outgoing message.
    peer: PeerIdentity,
    /// Reused encode buffer.
    serializer: MessageSerializer,
    /// Payloads queued by transport callbacks.
    inbound: Receiver<InboundDatagram>,
    /// Kinds whose channel handler registered successfully.
    registered: Vec<MessageKind>,
    /// Stats.
    stats: GatewayStats,
}

impl<T: Transport> DispatchGateway<T> {
    /// Resolves the local peer name and registers one handler per channel.
    ///
    /// A channel whose registration fails is logged and skipped; the others
    /// keep working.
    pub fn connect(mut transport: T, fallback_peer_name: &str) -> Self {
        let peer = PeerIdentity::resolve(transport.local_peer_name(), fallback_peer_name);
        let (sender, inbound) = inbound_queue();

        let mut registered = Vec::with_capacity(MessageKind::ALL.len());
        for kind in MessageKind::ALL {
            let handler = queueing_handler(kind, sender.clone());
            match transport.register_channel_handler(kind.channel(), handler) {
                Ok(()) => {
                    tracing::debug!("Registered handler for {} on {}", kind, kind.channel());
                    registered.push(kind);
                }
                Err(err) => {
                    tracing::warn!("Failed to register {} handler: {}", kind, err);
                }
            }
        }

        tracing::info!(
            "Gateway connected as peer {} ({} of {} channels)",
            peer,
            registered.len(),
            MessageKind::ALL.len()
        );

        Self {
            transport,
            peer,
            serializer: MessageSerializer::new(),
            inbound,
            registered,
            stats: GatewayStats::default(),
        }
    }

    /// Stamps the local peer, encodes and sends one message.
    ///
    /// # Errors
    /// [`GatewayError::Encode`] if the message does not fit in a datagram,
    /// [`GatewayError::Transport`] if the transport refused it.
    pub fn send(&mut self, mut message: SyncMessage) -> Result<(), GatewayError> {
        message.set_player_name(self.peer.as_str());
        let kind = message.kind();

        let result = match message.serialize_into(&mut self.serializer) {
            Ok(bytes) => self
                .transport
                .send(kind.channel(), bytes, kind.delivery())
                .map_err(GatewayError::from),
            Err(err) => Err(GatewayError::from(err)),
        };

        match &result {
            Ok(()) => self.stats.sent += 1,
            Err(err) => {
                self.stats.send_failures += 1;
                tracing::warn!("Failed to send {}: {}", kind, err);
            }
        }
        result
    }

    /// Decodes one payload received on `channel`.
    ///
    /// Returns `None` for unknown channels, undecodable payloads and
    /// self-echoes.
    pub fn receive(&mut self, channel: &str, payload: &[u8]) -> Option<SyncMessage> {
        let Some(kind) = MessageKind::from_channel(channel) else {
            tracing::debug!("Ignoring payload on unknown channel {}", channel);
            return None;
        };
        self.route(kind, payload)
    }

    /// Drains every queued payload, returning the messages to apply in arrival order.
    pub fn drain_inbound(&mut self) -> Vec<SyncMessage> {
        let datagrams: Vec<InboundDatagram> = self.inbound.try_iter().collect();
        datagrams
            .into_iter()
            .filter_map(|datagram| self.route(datagram.kind, &datagram.payload))
            .collect()
    }

    fn route(&mut self, kind: MessageKind, payload: &[u8]) -> Option<SyncMessage> {
        self.stats.received += 1;

        let Some(message) = SyncMessage::decode_as(kind, payload) else {
            self.stats.decode_failures += 1;
            tracing::debug!("Dropped undecodable {} payload ({} bytes)", kind, payload.len());
            return None;
        };

        if message.player_name() == self.peer.as_str() {
            self.stats.echoes_suppressed += 1;
            return None;
        }

        self.stats.routed += 1;
        Some(message)
    }

    /// Local peer identity.
    #[must_use]
    pub const fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Kinds whose channel handler registered.
    #[must_use]
    pub fn registered_kinds(&self) -> &[MessageKind] {
        &self.registered
    }

    /// Returns statistics.
    #[must_use]
    pub const fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Read access to the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}
