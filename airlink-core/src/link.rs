//! Connection state machine: discovery, association, handshake, steady state.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::codec::{MessageBuf, HANDSHAKE_TOKEN};
use crate::config::LinkConfig;
use crate::peer::{Interface, MacAddr, PeerRecord};
use crate::transport::{RadioMode, SendStatus, Transport, TransportError};

/// Advancement attempts `ensure_connected` makes before reporting back.
const MAX_HEALTH_ATTEMPTS: u32 = 6;

/// Pause between `establish` evaluations; progress out of `HANDSHAKE` comes
/// from the callback thread, which must get to run.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Ordered progress marker of the connection lifecycle. Advances one step at
/// a time toward `Ready`, or jumps to `Error` and resets to `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    NotFound = 0,
    Found = 1,
    Paired = 2,
    Handshake = 3,
    Ready = 4,
    Error = 5,
}

impl LinkStatus {
    fn from_u8(v: u8) -> LinkStatus {
        match v {
            1 => LinkStatus::Found,
            2 => LinkStatus::Paired,
            3 => LinkStatus::Handshake,
            4 => LinkStatus::Ready,
            5 => LinkStatus::Error,
            // Unknown values restart discovery.
            _ => LinkStatus::NotFound,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkStatus::NotFound => "not-found",
            LinkStatus::Found => "found",
            LinkStatus::Paired => "paired",
            LinkStatus::Handshake => "handshake",
            LinkStatus::Ready => "ready",
            LinkStatus::Error => "error",
        })
    }
}

/// Fixed identity of this node for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiates discovery and the handshake; joins as a station.
    Transmitter,
    /// Hosts the rendezvous network; reacts to what arrives.
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Transmitter => "transmitter",
            Role::Receiver => "receiver",
        })
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("transmitter") {
            Ok(Role::Transmitter)
        } else if s.eq_ignore_ascii_case("receiver") {
            Ok(Role::Receiver)
        } else {
            Err(RoleParseError(s.to_string()))
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role `{0}`, expected `transmitter` or `receiver`")]
pub struct RoleParseError(String);

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("radio initialization failed: {0}")]
    Init(#[from] TransportError),
}

/// Shared status cell. The thread driving the link and the transport
/// callbacks both write it; forward poll transitions use compare-and-swap so
/// a callback transition landing in between is never overwritten.
struct StatusCell(AtomicU8);

impl StatusCell {
    fn new(status: LinkStatus) -> Self {
        StatusCell(AtomicU8::new(status as u8))
    }

    fn get(&self) -> LinkStatus {
        LinkStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, status: LinkStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }

    fn advance(&self, from: LinkStatus, to: LinkStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Link state shared with the transport callbacks.
struct LinkShared {
    status: StatusCell,
    peer: Mutex<PeerRecord>,
    outbound: Mutex<MessageBuf>,
    inbound: Mutex<MessageBuf>,
}

/// A poisoned guard still holds consistent link state; recover rather than
/// wedge the link.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One point-to-point link: owns the peer record and status, drives
/// discovery, association, and handshake over the supplied transport.
pub struct Link {
    role: Role,
    config: LinkConfig,
    transport: Arc<dyn Transport>,
    shared: Arc<LinkShared>,
}

impl Link {
    pub fn new(role: Role, config: LinkConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            role,
            config,
            transport,
            shared: Arc::new(LinkShared {
                status: StatusCell::new(LinkStatus::NotFound),
                peer: Mutex::new(PeerRecord::new()),
                outbound: Mutex::new(MessageBuf::new()),
                inbound: Mutex::new(MessageBuf::new()),
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn status(&self) -> LinkStatus {
        self.shared.status.get()
    }

    /// Current peer address (unset until discovery or adoption).
    pub fn peer_addr(&self) -> MacAddr {
        lock(&self.shared.peer).addr
    }

    /// Configure the radio for this node's role, reset peer and status, and
    /// register the transport callbacks. Failure is fatal: there is no
    /// degraded mode, and the caller is expected to exit and be restarted.
    pub fn initialize(&self) -> Result<(), LinkError> {
        match self.role {
            Role::Transmitter => self.transport.configure(&RadioMode::Station)?,
            Role::Receiver => self.transport.configure(&RadioMode::AccessPoint {
                name: self.config.network_name.clone(),
                password: self.config.network_password.clone(),
                channel: self.config.channel,
            })?,
        }

        lock(&self.shared.peer).clear();
        lock(&self.shared.outbound).clear();
        lock(&self.shared.inbound).clear();
        self.shared.status.set(LinkStatus::NotFound);

        let shared = Arc::clone(&self.shared);
        self.transport
            .set_send_callback(Box::new(move |peer_addr: MacAddr, status: SendStatus| {
                handle_send_result(&shared, peer_addr, status);
            }));

        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        let role = self.role;
        let config = self.config.clone();
        self.transport
            .set_recv_callback(Box::new(move |from: MacAddr, data: &[u8]| {
                handle_frame(&shared, transport.as_ref(), role, &config, from, data);
            }));

        log::info!("{} link initialized", self.role);
        Ok(())
    }

    /// Block until the link is `Ready`. No iteration cap: a boot-time step
    /// expected to succeed eventually, retrying locally through
    /// `Error -> NotFound`.
    pub fn establish(&self) {
        log::info!("{} establishing link", self.role);
        while self.shared.status.get() != LinkStatus::Ready {
            self.step();
            std::thread::sleep(POLL_INTERVAL);
        }
        log::info!("link ready, peer {}", self.peer_addr());
    }

    /// Bounded health check: make at most `MAX_HEALTH_ATTEMPTS` advancement
    /// attempts, then report whether the link is `Ready`.
    pub fn ensure_connected(&self) -> bool {
        let mut attempts = 0;
        while self.shared.status.get() != LinkStatus::Ready && attempts < MAX_HEALTH_ATTEMPTS {
            attempts += 1;
            self.step();
        }
        self.shared.status.get() == LinkStatus::Ready
    }

    /// Submit one datagram to the current peer, truncated to the payload
    /// limit. Does not wait for delivery; a synchronous rejection flags
    /// `Error`, an asynchronous delivery failure does the same later.
    pub fn send(&self, payload: &[u8]) {
        send_payload(&self.shared, self.transport.as_ref(), payload);
    }

    /// Most recently received payload. Not a queue: each datagram overwrites
    /// the previous one.
    pub fn receive(&self) -> Vec<u8> {
        lock(&self.shared.inbound).to_vec()
    }

    /// Evaluate the current status once and perform its action.
    fn step(&self) {
        let status = self.shared.status.get();
        log::debug!("{} step: status={}", self.role, status);
        match status {
            LinkStatus::NotFound => {
                // Only the transmitter scans; the receiver learns its peer
                // passively through the receive callback.
                if self.role == Role::Transmitter {
                    self.scan();
                }
            }
            LinkStatus::Found => {
                if register_peer(&self.shared, self.transport.as_ref(), self.role, &self.config)
                {
                    self.shared.status.advance(LinkStatus::Found, LinkStatus::Paired);
                } else {
                    self.shared.status.set(LinkStatus::NotFound);
                }
            }
            LinkStatus::Paired => self.handshake(),
            LinkStatus::Handshake | LinkStatus::Ready => {}
            LinkStatus::Error => {
                log::warn!("link error, restarting discovery");
                self.shared.status.set(LinkStatus::NotFound);
            }
        }
    }

    /// Scan for a rendezvous network whose advertised name starts with the
    /// configured name, and parse its advertised hardware address.
    fn scan(&self) {
        let results = self.transport.discover();
        self.shared.status.set(LinkStatus::NotFound);
        lock(&self.shared.peer).clear();
        if results.is_empty() {
            log::debug!("scan: no networks visible");
            return;
        }
        for found in results {
            if !found.name.starts_with(&self.config.network_name) {
                continue;
            }
            match found.addr.parse::<MacAddr>() {
                Ok(addr) => {
                    lock(&self.shared.peer).addr = addr;
                    self.shared.status.advance(LinkStatus::NotFound, LinkStatus::Found);
                    log::info!("scan: found {} at {}", found.name, addr);
                }
                Err(err) => log::warn!("scan: {} advertises bad address: {}", found.name, err),
            }
            break;
        }
    }

    /// Initiate the handshake from `Paired`. The transmitter sends the token
    /// and advances only if the submission did not error; the receiver
    /// advances unconditionally and waits for the callback path.
    fn handshake(&self) {
        if self.shared.status.get() != LinkStatus::Paired {
            return;
        }
        match self.role {
            Role::Transmitter => {
                send_payload(&self.shared, self.transport.as_ref(), HANDSHAKE_TOKEN);
                if self.shared.status.get() != LinkStatus::Error {
                    self.shared
                        .status
                        .advance(LinkStatus::Paired, LinkStatus::Handshake);
                }
            }
            Role::Receiver => {
                self.shared
                    .status
                    .advance(LinkStatus::Paired, LinkStatus::Handshake);
            }
        }
    }
}

/// Re-register the peer association: drop any stale registration, refresh
/// the record's channel/interface fields, and add it back. Returns whether
/// the association is live. Skipped when the association already exists and
/// the link is `Ready`.
fn register_peer(
    shared: &LinkShared,
    transport: &dyn Transport,
    role: Role,
    config: &LinkConfig,
) -> bool {
    let record = {
        let mut peer = lock(&shared.peer);
        peer.channel = config.channel;
        peer.encrypt = false;
        if role == Role::Receiver {
            peer.interface = Interface::AccessPoint;
        }
        peer.clone()
    };

    if transport.has_association(record.addr) && shared.status.get() == LinkStatus::Ready {
        return true;
    }

    if transport.remove_association(record.addr).is_ok() {
        log::debug!("cleared stale association for {}", record.addr);
    }
    match transport.add_association(&record) {
        Ok(()) => {
            log::info!("associated with {}", record.addr);
            true
        }
        Err(err) => {
            log::warn!("association with {} failed: {}", record.addr, err);
            false
        }
    }
}

/// Copy the payload into the outbound buffer (truncating) and submit it to
/// the transport. A synchronous rejection flags `Error`.
fn send_payload(shared: &LinkShared, transport: &dyn Transport, payload: &[u8]) {
    let dest = lock(&shared.peer).addr;
    let frame = {
        let mut outbound = lock(&shared.outbound);
        outbound.store(payload);
        outbound.to_vec()
    };
    log::debug!("send {} bytes to {}", frame.len(), dest);
    if let Err(err) = transport.send(dest, &frame) {
        log::warn!("send to {} rejected: {}", dest, err);
        shared.status.set(LinkStatus::Error);
    }
}

/// Send-completion callback: a failed delivery flags `Error`. The lost
/// datagram is not resent; recovery runs through reset and rediscovery.
fn handle_send_result(shared: &LinkShared, peer_addr: MacAddr, status: SendStatus) {
    if status == SendStatus::Failed {
        log::warn!("delivery to {} failed", peer_addr);
        shared.status.set(LinkStatus::Error);
    }
}

/// Receive callback: adopt an unknown sender as the peer, decode the payload
/// into the inbound buffer, and recognize handshake completion. The receiver
/// answers the token with an echo; an echo rejection aborts without
/// advancing.
fn handle_frame(
    shared: &LinkShared,
    transport: &dyn Transport,
    role: Role,
    config: &LinkConfig,
    from: MacAddr,
    data: &[u8],
) {
    {
        let mut peer = lock(&shared.peer);
        if !peer.addr.is_set() || shared.status.get() == LinkStatus::NotFound {
            peer.addr = from;
            shared.status.set(LinkStatus::Found);
            log::debug!("adopted {} as peer", from);
        }
    }

    let (stored, is_handshake) = {
        let mut inbound = lock(&shared.inbound);
        let n = inbound.store(data);
        (n, inbound.is_handshake())
    };
    log::debug!("recv {} bytes from {}", stored, from);

    if !is_handshake {
        return;
    }
    if role == Role::Receiver {
        register_peer(shared, transport, role, config);
        send_payload(shared, transport, HANDSHAKE_TOKEN);
        if shared.status.get() == LinkStatus::Error {
            return;
        }
    }
    shared.status.set(LinkStatus::Ready);
    log::info!("handshake complete, link ready");
}
