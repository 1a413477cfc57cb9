use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use wolman::config::Config;
use wolman::iface;
use wolman::monitor::{self, MonitorConfig};
use wolman::packet::{HardwareAddr, MagicPacket, SecureOnPassword};
use wolman::sender::{self, BroadcastTarget};

#[derive(Parser)]
#[command(name = "wolman", version, about = "Send and monitor Wake-on-LAN magic packets")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a magic packet to a hardware address or a configured host alias
    Wake {
        target: String,

        /// Broadcast address to send to
        #[arg(short, long)]
        broadcast: Option<Ipv4Addr>,

        #[arg(short, long)]
        port: Option<u16>,

        /// SecureOn password, dotted IPv4 or hardware address syntax
        #[arg(long)]
        password: Option<String>,
    },
    /// Listen for incoming magic packets until interrupted
    Monitor {
        /// Port to listen on, may be given multiple times
        #[arg(short, long = "port")]
        ports: Vec<u16>,

        /// Only count packets waking this address as matches
        #[arg(short, long)]
        filter: Option<String>,

        #[arg(short, long)]
        listen_addr: Option<IpAddr>,
    },
    /// List local network adapters and their broadcast addresses
    Interfaces,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new().with_level(level).init()?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Wake { target, broadcast, port, password } =>
            cmd_wake(&config, &target, broadcast, port, password.as_deref()),
        Command::Monitor { ports, filter, listen_addr } =>
            cmd_monitor(&config, ports, filter.as_deref(), listen_addr),
        Command::Interfaces => cmd_interfaces(),
    }
}

fn cmd_wake(
    config: &Config,
    target: &str,
    broadcast: Option<Ipv4Addr>,
    port: Option<u16>,
    password: Option<&str>,
) -> Result<()> {
    let addr_str = config.resolve_host(target).unwrap_or(target);
    let addr = HardwareAddr::from_str(addr_str)
        .with_context(|| format!("invalid hardware address '{addr_str}'"))?;
    let password = password.map(SecureOnPassword::from_str).transpose()
        .context("invalid SecureOn password")?;

    let defaults = config.wake();
    let target = BroadcastTarget {
        addr: broadcast.unwrap_or(defaults.broadcast),
        port: port.unwrap_or(defaults.port),
    };

    sender::send(&MagicPacket::new(addr, password), &target)?;
    log::info!("magic packet for {addr} sent to {}:{}", target.addr, target.port);
    Ok(())
}

fn cmd_monitor(
    config: &Config,
    ports: Vec<u16>,
    filter: Option<&str>,
    listen_addr: Option<IpAddr>,
) -> Result<()> {
    let token = CancellationToken::new();
    let sigint_token = token.clone();

    ctrlc::set_handler(move || {
        log::info!("received SIGINT, stopping");
        sigint_token.cancel();
    }).context("failed to install SIGINT handler")?;

    let filter = filter.map(HardwareAddr::from_str).transpose()
        .context("invalid filter address")?;

    let listen = config.listen();
    let cfg = MonitorConfig {
        listen_addr: listen_addr.unwrap_or(listen.listen_addr),
        ports: if ports.is_empty() { listen.ports } else { ports },
        filter,
    };

    log::info!("monitoring ports {:?} on {}", cfg.ports, cfg.listen_addr);
    if let Some(addr) = filter {
        log::info!("filtering for {addr}");
    }

    let handle = monitor::spawn(cfg, token, |event| {
        if event.matched {
            log::info!("magic packet from {} on port {} waking {}",
                event.source, event.port, event.addr);
        } else {
            log::debug!("magic packet from {} waking {} (no filter match)",
                event.source, event.addr);
        }
    })?;

    handle.join();
    Ok(())
}

fn cmd_interfaces() -> Result<()> {
    for adapter in iface::inventory() {
        let state = match (adapter.is_up, adapter.is_loopback) {
            (_, true) => "loopback",
            (true, false) => "up",
            (false, false) => "down",
        };
        println!("{} ({state})", adapter.name);

        if let Some(addr) = adapter.hardware_addr {
            println!("  hardware address: {addr}");
        }
        for ip in &adapter.ipv4 {
            println!("  ipv4: {ip}");
        }
        if let Some(bcast) = adapter.broadcast {
            println!("  broadcast: {bcast}");
        }
    }
    Ok(())
}
