//! UDP broadcast "radio": the core transport contract over a LAN socket.
//!
//! Beacons stand in for the hosted rendezvous network: an access-point node
//! broadcasts its advertised name and address, a station node collects them
//! into the discovery cache. Data frames teach the radio each address's UDP
//! endpoint, and only associated addresses may be sent to.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use airlink_core::{
    DiscoveredPeer, MacAddr, PeerRecord, RadioMode, RecvCallback, SendCallback, SendStatus,
    Transport, TransportError,
};
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

const BEACON_INTERVAL: Duration = Duration::from_secs(2);
const BEACON_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DATAGRAM: usize = 1024;

/// Everything on the air is one bincode-encoded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Frame {
    /// Rendezvous advertisement from an access-point node.
    Beacon { name: String, addr: MacAddr },
    /// User datagram.
    Data { from: MacAddr, payload: Vec<u8> },
}

struct BeaconEntry {
    name: String,
    last_seen: Instant,
}

struct Outbound {
    dest: MacAddr,
    endpoint: SocketAddr,
    frame: Vec<u8>,
}

struct RadioInner {
    addr: MacAddr,
    port: u16,
    beacon_suffix: Option<String>,
    socket: Arc<UdpSocket>,
    runtime: tokio::runtime::Handle,
    beacon_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    endpoints: Mutex<HashMap<MacAddr, SocketAddr>>,
    associations: Mutex<HashSet<MacAddr>>,
    beacons: Mutex<HashMap<MacAddr, BeaconEntry>>,
    send_cb: Mutex<Option<SendCallback>>,
    recv_cb: Mutex<Option<RecvCallback>>,
    out_tx: mpsc::UnboundedSender<Outbound>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct UdpRadio {
    inner: Arc<RadioInner>,
}

impl UdpRadio {
    /// Bind the broadcast socket and start the reader and writer tasks.
    pub async fn bind(
        port: u16,
        addr: MacAddr,
        beacon_suffix: Option<String>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.set_broadcast(true)?;
        let socket = Arc::new(socket);

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(RadioInner {
            addr,
            port,
            beacon_suffix,
            socket,
            runtime: tokio::runtime::Handle::current(),
            beacon_task: Mutex::new(None),
            endpoints: Mutex::new(HashMap::new()),
            associations: Mutex::new(HashSet::new()),
            beacons: Mutex::new(HashMap::new()),
            send_cb: Mutex::new(None),
            recv_cb: Mutex::new(None),
            out_tx,
        });
        tokio::spawn(recv_loop(inner.clone()));
        tokio::spawn(send_loop(inner.clone(), out_rx));
        Ok(Self { inner })
    }
}

impl Transport for UdpRadio {
    fn configure(&self, mode: &RadioMode) -> Result<(), TransportError> {
        if let Some(task) = lock(&self.inner.beacon_task).take() {
            task.abort();
        }
        match mode {
            RadioMode::Station => {
                log::info!("radio configured as station");
            }
            RadioMode::AccessPoint { name, channel, .. } => {
                let advertised = match &self.inner.beacon_suffix {
                    Some(suffix) => format!("{name}-{suffix}"),
                    None => name.clone(),
                };
                let frame = bincode::serialize(&Frame::Beacon {
                    name: advertised.clone(),
                    addr: self.inner.addr,
                })
                .map_err(|e| TransportError::Configure(e.to_string()))?;
                let task = self.inner.runtime.spawn(beacon_loop(self.inner.clone(), frame));
                *lock(&self.inner.beacon_task) = Some(task);
                log::info!(
                    "radio configured as access point, advertising {} on channel {}",
                    advertised,
                    channel
                );
            }
        }
        Ok(())
    }

    fn send(&self, dest: MacAddr, payload: &[u8]) -> Result<(), TransportError> {
        if !lock(&self.inner.associations).contains(&dest) {
            return Err(TransportError::Rejected(format!("{dest} is not associated")));
        }
        let endpoint = lock(&self.inner.endpoints)
            .get(&dest)
            .copied()
            .ok_or_else(|| TransportError::Rejected(format!("no known endpoint for {dest}")))?;
        let frame = bincode::serialize(&Frame::Data {
            from: self.inner.addr,
            payload: payload.to_vec(),
        })
        .map_err(|e| TransportError::Rejected(e.to_string()))?;
        self.inner
            .out_tx
            .send(Outbound {
                dest,
                endpoint,
                frame,
            })
            .map_err(|_| TransportError::Rejected("radio writer is gone".into()))
    }

    fn discover(&self) -> Vec<DiscoveredPeer> {
        let now = Instant::now();
        let mut beacons = lock(&self.inner.beacons);
        beacons.retain(|_, entry| now.duration_since(entry.last_seen) < BEACON_TIMEOUT);
        beacons
            .iter()
            .map(|(addr, entry)| DiscoveredPeer {
                name: entry.name.clone(),
                addr: addr.to_string(),
            })
            .collect()
    }

    fn has_association(&self, addr: MacAddr) -> bool {
        lock(&self.inner.associations).contains(&addr)
    }

    fn add_association(&self, peer: &PeerRecord) -> Result<(), TransportError> {
        if !lock(&self.inner.endpoints).contains_key(&peer.addr) {
            return Err(TransportError::Association(format!(
                "no known endpoint for {}",
                peer.addr
            )));
        }
        lock(&self.inner.associations).insert(peer.addr);
        Ok(())
    }

    fn remove_association(&self, addr: MacAddr) -> Result<(), TransportError> {
        if lock(&self.inner.associations).remove(&addr) {
            Ok(())
        } else {
            Err(TransportError::Association(format!(
                "{addr} is not associated"
            )))
        }
    }

    fn set_send_callback(&self, cb: SendCallback) {
        *lock(&self.inner.send_cb) = Some(cb);
    }

    fn set_recv_callback(&self, cb: RecvCallback) {
        *lock(&self.inner.recv_cb) = Some(cb);
    }
}

async fn beacon_loop(inner: Arc<RadioInner>, frame: Vec<u8>) {
    let dest = SocketAddr::from((Ipv4Addr::BROADCAST, inner.port));
    loop {
        if let Err(err) = inner.socket.send_to(&frame, dest).await {
            log::debug!("beacon send failed: {err}");
        }
        tokio::time::sleep(BEACON_INTERVAL).await;
    }
}

async fn recv_loop(inner: Arc<RadioInner>) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (n, from) = match inner.socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(err) => {
                log::warn!("radio receive failed: {err}");
                return;
            }
        };
        let frame: Frame = match bincode::deserialize(&buf[..n]) {
            Ok(f) => f,
            Err(_) => continue, // not one of ours
        };
        match frame {
            Frame::Beacon { name, addr } => {
                if addr == inner.addr {
                    continue; // our own broadcast
                }
                lock(&inner.endpoints).insert(addr, from);
                lock(&inner.beacons).insert(
                    addr,
                    BeaconEntry {
                        name,
                        last_seen: Instant::now(),
                    },
                );
            }
            Frame::Data { from: sender, payload } => {
                if sender == inner.addr {
                    continue;
                }
                lock(&inner.endpoints).insert(sender, from);
                if let Some(cb) = lock(&inner.recv_cb).as_ref() {
                    cb(sender, &payload);
                }
            }
        }
    }
}

async fn send_loop(inner: Arc<RadioInner>, mut out_rx: mpsc::UnboundedReceiver<Outbound>) {
    while let Some(out) = out_rx.recv().await {
        let status = match inner.socket.send_to(&out.frame, out.endpoint).await {
            Ok(_) => SendStatus::Delivered,
            Err(err) => {
                log::warn!("send to {} failed: {err}", out.dest);
                SendStatus::Failed
            }
        };
        if let Some(cb) = lock(&inner.send_cb).as_ref() {
            cb(out.dest, status);
        }
    }
}
