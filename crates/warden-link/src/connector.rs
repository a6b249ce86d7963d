//! Transport adapters.
//!
//! A [`Connector`] frames outbound messages into [`Envelope`]s,
//! stamping each with a monotonically increasing sequence number, and
//! hands them to the underlying transport. It is transport-agnostic:
//! the only assumption is a reliable, ordered, full-duplex stream of
//! discrete structured values. Inbound envelopes reach the link
//! through the receiver half returned alongside the connector.
//!
//! [`ChannelConnector`] is the in-process implementation over a tokio
//! mpsc pair, used to wire node chains inside one process and in
//! tests. A network transport implements the same trait.
//!
//! # Sequence Numbers
//!
//! Sequence numbers start at 1 and are independent per endpoint and
//! per connection; a reconnect produces a fresh connector and a fresh
//! sequence space. Requests in flight at disconnect are failed, never
//! retried.

use crate::error::LinkError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use warden_proto::Envelope;

/// Frames and transmits outbound envelopes.
pub trait Connector: Send + Sync {
    /// Stamps a fresh sequence number on `data` and transmits it as
    /// an envelope of `message_type`. Returns the assigned number.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] if the transport is gone.
    fn send(&self, message_type: &str, data: Value) -> Result<u64, LinkError>;

    /// Transmits a response envelope echoing `request_seq` instead of
    /// assigning a fresh number.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Closed`] if the transport is gone.
    fn reply(&self, message_type: &str, data: Value, request_seq: u64) -> Result<(), LinkError>;

    /// Closes the outbound half. Idempotent.
    fn close(&self);

    /// Returns `true` once the transport is closed in either
    /// direction.
    fn is_closed(&self) -> bool;
}

/// In-process connector over a tokio mpsc channel.
#[derive(Debug)]
pub struct ChannelConnector {
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    seq: AtomicU64,
    closed: AtomicBool,
}

impl ChannelConnector {
    /// Wraps one outbound sender.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates two connected endpoints: everything endpoint A sends
    /// arrives on endpoint B's receiver and vice versa.
    #[must_use]
    pub fn pair() -> (ConnectorEnd, ConnectorEnd) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            ConnectorEnd {
                connector: Arc::new(ChannelConnector::new(a_tx)),
                receiver: a_rx,
            },
            ConnectorEnd {
                connector: Arc::new(ChannelConnector::new(b_tx)),
                receiver: b_rx,
            },
        )
    }

    fn transmit(&self, envelope: Envelope) -> Result<(), LinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(LinkError::Closed);
        };
        if tx.send(envelope).is_err() {
            // Peer receiver dropped
            self.closed.store(true, Ordering::Release);
            return Err(LinkError::Closed);
        }
        Ok(())
    }
}

impl Connector for ChannelConnector {
    fn send(&self, message_type: &str, data: Value) -> Result<u64, LinkError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.transmit(Envelope::new(message_type, seq, data))?;
        Ok(seq)
    }

    fn reply(&self, message_type: &str, data: Value, request_seq: u64) -> Result<(), LinkError> {
        self.transmit(Envelope::new(message_type, request_seq, data))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender closes the peer's receiver
        self.tx.lock().take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// One side of an in-process connection: the outbound connector plus
/// the inbound receiver to drive the link's serve loop with.
#[derive(Debug)]
pub struct ConnectorEnd {
    /// Outbound half.
    pub connector: Arc<ChannelConnector>,
    /// Inbound half; feed this to [`Link::serve`](crate::Link::serve).
    pub receiver: mpsc::UnboundedReceiver<Envelope>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sequence_numbers_start_at_one_and_increase() {
        let (mut a, mut b) = ChannelConnector::pair();
        assert_eq!(a.connector.send("ping_request", json!({})).expect("send"), 1);
        assert_eq!(a.connector.send("ping_request", json!({})).expect("send"), 2);

        let first = b.receiver.recv().await.expect("receive");
        assert_eq!(first.seq, 1);
        let second = b.receiver.recv().await.expect("receive");
        assert_eq!(second.seq, 2);

        // Sequence spaces are independent per endpoint
        assert_eq!(b.connector.send("ping_request", json!({})).expect("send"), 1);
        assert_eq!(a.receiver.recv().await.expect("receive").seq, 1);
    }

    #[tokio::test]
    async fn reply_echoes_request_seq() {
        let (a, mut b) = ChannelConnector::pair();
        a.connector
            .reply("ping_response", json!({"seq": 4}), 4)
            .expect("reply");
        let envelope = b.receiver.recv().await.expect("receive");
        assert_eq!(envelope.seq, 4);
        assert_eq!(envelope.data_seq(), Some(4));
    }

    #[tokio::test]
    async fn close_stops_sends_and_ends_peer_receiver() {
        let (a, mut b) = ChannelConnector::pair();
        a.connector.close();
        assert!(a.connector.is_closed());
        assert!(matches!(
            a.connector.send("ping_request", json!({})),
            Err(LinkError::Closed)
        ));
        assert!(b.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_after_peer_drop_reports_closed() {
        let (a, b) = ChannelConnector::pair();
        drop(b);
        assert!(matches!(
            a.connector.send("ping_request", json!({})),
            Err(LinkError::Closed)
        ));
        assert!(a.connector.is_closed());
    }
}
