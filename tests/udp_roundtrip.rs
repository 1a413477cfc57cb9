use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::mpsc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use wolman::monitor::{self, MonitorConfig, WolEvent};
use wolman::packet::{HardwareAddr, MagicPacket};
use wolman::sender::{self, BroadcastTarget};

const EVENT_WAIT: Duration = Duration::from_secs(2);

fn loopback_monitor(filter: Option<HardwareAddr>) -> MonitorConfig {
    MonitorConfig {
        listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        /* port 0 lets the kernel pick, so parallel tests never collide */
        ports: vec![ 0 ],
        filter,
    }
}

fn spawn_with_channel(cfg: MonitorConfig, token: CancellationToken)
    -> (monitor::MonitorHandle, mpsc::Receiver<WolEvent>)
{
    let (tx, rx) = mpsc::channel::<WolEvent>();
    let handle = monitor::spawn(cfg, token, move |event| {
        tx.send(event.clone()).ok();
    }).unwrap();
    (handle, rx)
}

#[test]
fn send_is_observed_by_monitor_with_matching_filter() {
    let addr: HardwareAddr = "00:11:22:33:44:55".parse().unwrap();
    let token = CancellationToken::new();

    let (handle, rx) = spawn_with_channel(loopback_monitor(Some(addr)), token.clone());
    let port = handle.local_addrs()[0].port();

    let target = BroadcastTarget { addr: Ipv4Addr::LOCALHOST, port };
    sender::send(&MagicPacket::new(addr, None), &target).unwrap();

    let event = rx.recv_timeout(EVENT_WAIT).unwrap();
    assert!(event.matched);
    assert_eq!(event.addr, addr);
    assert_eq!(event.port, port);

    /* exactly one datagram was sent, so no further events */
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    token.cancel();
    handle.join();
}

#[test]
fn non_matching_filter_still_reports_event_as_unmatched() {
    let sent: HardwareAddr = "00:11:22:33:44:55".parse().unwrap();
    let filter: HardwareAddr = "aa:aa:aa:aa:aa:aa".parse().unwrap();
    let token = CancellationToken::new();

    let (handle, rx) = spawn_with_channel(loopback_monitor(Some(filter)), token.clone());
    let port = handle.local_addrs()[0].port();

    let target = BroadcastTarget { addr: Ipv4Addr::LOCALHOST, port };
    sender::send(&MagicPacket::new(sent, None), &target).unwrap();

    let event = rx.recv_timeout(EVENT_WAIT).unwrap();
    assert!(!event.matched);
    assert_eq!(event.addr, sent);

    token.cancel();
    handle.join();
}

#[test]
fn unrelated_datagrams_are_silently_discarded() {
    let token = CancellationToken::new();

    let (handle, rx) = spawn_with_channel(loopback_monitor(None), token.clone());
    let local = handle.local_addrs()[0];

    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.send_to(b"definitely not a wake frame", local).unwrap();
    sock.send_to(&[ 0xff; 101 ], local).unwrap();

    /* discards must not produce events or kill the loop */
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

    let addr: HardwareAddr = "0a:0b:0c:0d:0e:0f".parse().unwrap();
    sock.send_to(&MagicPacket::new(addr, None).to_bytes(), local).unwrap();

    let event = rx.recv_timeout(EVENT_WAIT).unwrap();
    assert!(event.matched);
    assert_eq!(event.addr, addr);

    token.cancel();
    handle.join();
}

#[test]
fn multi_port_events_carry_their_receiving_port() {
    let addr: HardwareAddr = "00:11:22:33:44:55".parse().unwrap();
    let token = CancellationToken::new();

    let cfg = MonitorConfig {
        listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ports: vec![ 0, 0 ],
        filter: None,
    };
    let (handle, rx) = spawn_with_channel(cfg, token.clone());

    let mut ports: Vec<u16> = handle.local_addrs().iter().map(|a| a.port()).collect();
    assert_eq!(ports.len(), 2);
    assert_ne!(ports[0], ports[1]);

    for &port in &ports {
        let target = BroadcastTarget { addr: Ipv4Addr::LOCALHOST, port };
        sender::send(&MagicPacket::new(addr, None), &target).unwrap();
    }

    let mut seen: Vec<u16> = (0..2)
        .map(|_| {
            let event = rx.recv_timeout(EVENT_WAIT).unwrap();
            assert!(event.matched);
            assert_eq!(event.addr, addr);
            event.port
        })
        .collect();

    seen.sort_unstable();
    ports.sort_unstable();
    assert_eq!(seen, ports);

    token.cancel();
    handle.join();
}

#[test]
fn empty_port_list_is_rejected_at_spawn() {
    let cfg = MonitorConfig {
        listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ports: vec![],
        filter: None,
    };
    let result = monitor::spawn(cfg, CancellationToken::new(), |_event: &WolEvent| {});
    assert!(result.is_err());
}

#[test]
fn cancelling_shared_token_stops_every_listener() {
    let token = CancellationToken::new();

    let cfg = MonitorConfig {
        listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ports: vec![ 0, 0 ],
        filter: None,
    };
    let (handle, _rx) = spawn_with_channel(cfg, token.clone());
    let locals = handle.local_addrs().to_vec();

    /* any clone of the token ends the session; the listener threads rely
     * on this to tear everything down when one of them dies */
    token.clone().cancel();
    handle.join();

    for local in locals {
        UdpSocket::bind(local).unwrap();
    }
}

#[test]
fn second_monitor_on_same_port_fails_to_bind() {
    let token = CancellationToken::new();

    let (first, _rx) = spawn_with_channel(loopback_monitor(None), token.clone());
    let occupied = first.local_addrs()[0].port();

    let cfg = MonitorConfig {
        listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ports: vec![ occupied ],
        filter: None,
    };
    let result = monitor::spawn(cfg, CancellationToken::new(), |_event: &WolEvent| {});
    assert!(result.is_err());

    token.cancel();
    first.join();
}

#[test]
fn cancelled_monitor_releases_its_port() {
    let token = CancellationToken::new();

    let (handle, _rx) = spawn_with_channel(loopback_monitor(None), token.clone());
    let local = handle.local_addrs()[0];

    token.cancel();
    handle.join();

    // join returned, so the socket is dropped and the port rebindable
    UdpSocket::bind(local).unwrap();
}
