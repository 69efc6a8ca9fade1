//! Airlink protocol reference implementation.
//! Host-driven: all radio I/O goes through the `Transport` trait supplied by the host.

pub mod codec;
pub mod config;
pub mod link;
pub mod peer;
pub mod transport;

pub use codec::{MessageBuf, HANDSHAKE_TOKEN, MAX_PAYLOAD_LEN};
pub use config::LinkConfig;
pub use link::{Link, LinkError, LinkStatus, Role, RoleParseError};
pub use peer::{AddrParseError, Interface, MacAddr, PeerRecord};
pub use transport::{
    DiscoveredPeer, RadioMode, RecvCallback, SendCallback, SendStatus, Transport, TransportError,
};
