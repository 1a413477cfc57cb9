use std::net::Ipv4Addr;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;

use crate::packet::HardwareAddr;

/// Read-only snapshot of a local adapter, enough to pick a wake source
/// and suggest the subnet broadcast address for its segment.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub hardware_addr: Option<HardwareAddr>,
    pub ipv4: Vec<Ipv4Addr>,
    /// Broadcast address of the first IPv4 network, if any.
    pub broadcast: Option<Ipv4Addr>,
    pub is_up: bool,
    pub is_loopback: bool,
}

pub fn inventory() -> Vec<AdapterInfo> {
    datalink::interfaces()
        .into_iter()
        .map(|iface| {
            let v4_nets: Vec<_> = iface.ips.iter()
                .filter_map(|net| match net {
                    IpNetwork::V4(v4) => Some(*v4),
                    IpNetwork::V6(_) => None,
                })
                .collect();

            AdapterInfo {
                name: iface.name.clone(),
                hardware_addr: iface.mac.map(HardwareAddr::from),
                ipv4: v4_nets.iter().map(|net| net.ip()).collect(),
                broadcast: v4_nets.first().map(|net| net.broadcast()),
                is_up: iface.is_up(),
                is_loopback: iface.is_loopback(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_sees_at_least_loopback() {
        let adapters = inventory();
        assert!(adapters.iter().any(|a| a.is_loopback));
    }
}
