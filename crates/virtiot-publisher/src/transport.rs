use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Connection events emitted by a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport handshake completed.
    Connected,
    /// The connection was closed.
    Closed,
    /// A transport-level failure, with its description.
    Error(String),
}

impl fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Closed => f.write_str("closed"),
            Self::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// A publish/subscribe connection.
///
/// Publishing is best-effort and must not block: the message is handed to
/// the transport, which delivers it asynchronously without reporting any
/// acknowledgement back.
pub trait Transport {
    /// Submits a payload for publication on a topic.
    ///
    /// # Errors
    ///
    /// An error is returned when the transport cannot accept the message,
    /// for example because its outgoing queue is full or closed.
    fn publish(&self, topic: &str, payload: String) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn publish(&self, topic: &str, payload: String) -> Result<()> {
        (**self).publish(topic, payload)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn publish(&self, topic: &str, payload: String) -> Result<()> {
        (**self).publish(topic, payload)
    }
}
