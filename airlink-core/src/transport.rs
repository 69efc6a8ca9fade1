//! Transport driver contract: the radio primitives the state machine consumes.

use crate::peer::{MacAddr, PeerRecord};

/// Network role the radio is configured into at initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioMode {
    /// Join as a client; used by the transmitter.
    Station,
    /// Host the rendezvous network and advertise its identity; used by the
    /// receiver.
    AccessPoint {
        name: String,
        password: String,
        channel: u8,
    },
}

/// Outcome of one asynchronous send, reported through the send callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Delivered,
    Failed,
}

/// One entry from a discovery scan: advertised network name plus the
/// advertised hardware address in string form (the caller parses it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub name: String,
    pub addr: String,
}

/// Invoked when an asynchronous send completes, on an arbitrary thread.
pub type SendCallback = Box<dyn Fn(MacAddr, SendStatus) + Send + Sync>;

/// Invoked for every inbound frame, on an arbitrary thread.
pub type RecvCallback = Box<dyn Fn(MacAddr, &[u8]) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("radio configuration failed: {0}")]
    Configure(String),
    #[error("send rejected: {0}")]
    Rejected(String),
    #[error("association update failed: {0}")]
    Association(String),
}

/// Radio driver the link runs on. Callbacks may fire at any instant relative
/// to the thread driving the link; implementations must be callable from
/// both contexts.
pub trait Transport: Send + Sync {
    /// Configure the network role. Failure here is fatal to the link.
    fn configure(&self, mode: &RadioMode) -> Result<(), TransportError>;

    /// Submit one datagram. `Ok` means accepted for transmission; delivery
    /// success or failure arrives later through the send callback.
    fn send(&self, dest: MacAddr, payload: &[u8]) -> Result<(), TransportError>;

    /// Snapshot of currently visible rendezvous advertisements.
    fn discover(&self) -> Vec<DiscoveredPeer>;

    fn has_association(&self, addr: MacAddr) -> bool;

    /// Register a fixed peer association enabling direct send/receive.
    fn add_association(&self, peer: &PeerRecord) -> Result<(), TransportError>;

    fn remove_association(&self, addr: MacAddr) -> Result<(), TransportError>;

    fn set_send_callback(&self, cb: SendCallback);

    fn set_recv_callback(&self, cb: RecvCallback);
}
