use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use thiserror::Error;

use crate::packet::MagicPacket;

pub const DEFAULT_WAKE_PORT: u16 = 9;

#[derive(Debug, Error)]
#[error("network error: {0}")]
pub struct NetworkError(#[from] std::io::Error);

/// Where to send a wake frame. Usually the subnet broadcast address
/// (or the all-ones fallback) on port 9, sometimes port 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastTarget {
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Default for BroadcastTarget {
    fn default() -> Self {
        Self { addr: Ipv4Addr::BROADCAST, port: DEFAULT_WAKE_PORT }
    }
}

/// Sends the packet as a single broadcast datagram. One attempt, no
/// retries; "ok" means the local stack accepted it, nothing more --
/// WoL has no acknowledgment.
pub fn send(packet: &MagicPacket, target: &BroadcastTarget) -> Result<(), NetworkError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.set_broadcast(true)?;

    let buf = packet.to_bytes();
    socket.send_to(&buf, SocketAddrV4::new(target.addr, target.port))?;

    log::debug!("sent {} byte magic packet for {} to {}:{}",
        buf.len(), packet.hardware_addr(), target.addr, target.port);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::HardwareAddr;

    #[test]
    fn send_to_loopback_succeeds() {
        // a receiver so the datagram has somewhere to land
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let addr: HardwareAddr = "00:11:22:33:44:55".parse().unwrap();
        let pkt = MagicPacket::new(addr, None);
        let target = BroadcastTarget { addr: Ipv4Addr::LOCALHOST, port };

        send(&pkt, &target).unwrap();

        let mut buf = [0u8; 128];
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &pkt.to_bytes()[..]);
    }

    #[test]
    fn default_target_is_all_ones_port_9() {
        let target = BroadcastTarget::default();
        assert_eq!(target.addr, Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(target.port, 9);
    }
}
