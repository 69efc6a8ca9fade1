// Airlink node daemon: UDP radio shim, link establishment, steady-state loop.

mod config;
mod radio;

use std::sync::Arc;
use std::time::Duration;

use airlink_core::{Link, MacAddr, Role};
use anyhow::Context;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pause between steady-state iterations (send, receive, health check).
const LOOP_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("airlink-node {}", VERSION);
            return Ok(());
        }
    }

    env_logger::init();
    let cfg = config::load();

    // Role misconfiguration is fatal: exit before the link runs and let
    // systemd restart us once the config is fixed.
    let role: Role = cfg
        .role
        .as_deref()
        .context("role not configured (set `role` or AIRLINK_ROLE)")?
        .parse()?;
    let node_addr = match &cfg.node_addr {
        Some(s) => s.parse::<MacAddr>()?,
        None => generated_addr(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let radio = radio::UdpRadio::bind(cfg.port, node_addr, cfg.node_suffix.clone())
            .await
            .context("binding radio socket")?;
        let link = Arc::new(Link::new(role, cfg.link.clone(), Arc::new(radio)));
        link.initialize().context("initializing link")?;
        log::info!("node {} up as {} on udp port {}", node_addr, role, cfg.port);

        let worker = link.clone();
        std::thread::spawn(move || run_link(worker, role));

        shutdown_signal().await
    })
}

/// Bring the link up, then exchange datagrams: the transmitter pings every
/// interval, both roles log newly received payloads, and a bounded health
/// check before each iteration re-drives recovery after failures.
fn run_link(link: Arc<Link>, role: Role) {
    link.establish();
    let mut last_inbound: Vec<u8> = Vec::new();
    let mut sequence: u64 = 0;
    loop {
        if !link.ensure_connected() {
            log::warn!("link lost, re-establishing");
            std::thread::sleep(LOOP_INTERVAL);
            continue;
        }
        if role == Role::Transmitter {
            sequence += 1;
            link.send(format!("ping {sequence}").as_bytes());
        }
        let inbound = link.receive();
        if !inbound.is_empty() && inbound != last_inbound {
            log::info!("received [{}]", String::from_utf8_lossy(&inbound));
            last_inbound = inbound;
        }
        std::thread::sleep(LOOP_INTERVAL);
    }
}

/// Locally administered unicast address for this process.
fn generated_addr() -> MacAddr {
    let mut octets: [u8; 6] = rand::random();
    octets[0] = (octets[0] | 0x02) & 0xFE;
    MacAddr(octets)
}

/// Wait for Ctrl+C or SIGTERM (Unix). On shutdown, runtime and tasks exit;
/// systemd restarts the daemon if configured.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
