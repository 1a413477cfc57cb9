use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::packet::{HardwareAddr, MagicPacket, SecureOnPassword};
use crate::sender::NetworkError;

/// Ports adapters conventionally listen on for wake frames.
pub const DEFAULT_MONITOR_PORTS: [u16; 2] = [ 7, 9 ];

const RECV_TIMEOUT: Duration = Duration::from_millis(50);

/* larger than any wake frame; oversized datagrams get truncated and
 * fail classification, which is the right outcome anyway */
const RECV_BUF_LEN: usize = 1024;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub listen_addr: IpAddr,
    pub ports: Vec<u16>,
    pub filter: Option<HardwareAddr>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: DEFAULT_MONITOR_PORTS.to_vec(),
            filter: None,
        }
    }
}

/// A received datagram that classified as a magic packet.
#[derive(Debug, Clone)]
pub struct WolEvent {
    pub source: SocketAddr,
    /// Local port the frame arrived on.
    pub port: u16,
    pub addr: HardwareAddr,
    pub password: Option<SecureOnPassword>,
    pub received_at: SystemTime,
    /// True when no filter is set or the extracted address equals it.
    pub matched: bool,
}

pub struct MonitorHandle {
    local_addrs: Vec<SocketAddr>,
    handles: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Addresses actually bound, with kernel-assigned ports resolved.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn join(self) {
        self.handles.into_iter().for_each(|h| { let _ = h.join(); });
    }
}

/// Binds one listener per configured port and spawns a receive thread for
/// each. All binds happen up front, so an occupied port fails the whole
/// session before any datagram is processed. The threads run until `token`
/// is cancelled; a stop request is honored within one receive timeout.
pub fn spawn<F>(cfg: MonitorConfig, token: CancellationToken, on_event: F)
    -> Result<MonitorHandle, NetworkError>
where
    F: Fn(&WolEvent) + Send + Clone + 'static,
{
    if cfg.ports.is_empty() {
        /* a session with nothing bound would look alive while hearing nothing */
        return Err(std::io::Error::new(ErrorKind::InvalidInput, "no ports to monitor").into());
    }

    let mut sockets: Vec<(UdpSocket, SocketAddr)> = Vec::new();
    for port in &cfg.ports {
        let socket = UdpSocket::bind((cfg.listen_addr, *port))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;

        let local = socket.local_addr()?;
        sockets.push((socket, local));
    }

    let mut handles = Vec::new();
    let local_addrs: Vec<SocketAddr> = sockets.iter().map(|(_, a)| *a).collect();

    for (socket, local) in sockets {
        let token = token.clone();
        let filter = cfg.filter;
        let on_event = on_event.clone();

        let h = std::thread::spawn(move || {
            let mut buf = [0u8; RECV_BUF_LEN];

            loop {
                if token.is_cancelled() { log::trace!("[monitor][{local}] exit"); break; }

                let (len, source) = match socket.recv_from(&mut buf) {
                    Ok(r) => r,
                    Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        /* a dead listener must take the whole session down,
                         * not leave it running half-alive */
                        log::error!("[monitor][{local}] receive failed: {e}");
                        token.cancel();
                        break;
                    },
                };

                /* almost everything a broadcast listener sees is unrelated
                 * traffic; discarding it silently is the normal path */
                let Some(pkt) = MagicPacket::parse(&buf[..len]) else { continue; };

                let addr = pkt.hardware_addr();
                let event = WolEvent {
                    source,
                    port: local.port(),
                    addr,
                    password: pkt.password().cloned(),
                    received_at: SystemTime::now(),
                    matched: filter.is_none() || filter == Some(addr),
                };

                log::debug!("[monitor][{local}] magic packet from {source} for {addr}");
                on_event(&event);
            }
        });

        handles.push(h);
    }

    Ok(MonitorHandle { local_addrs, handles })
}
