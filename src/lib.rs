pub mod config;
pub mod iface;
pub mod monitor;
pub mod packet;
pub mod sender;
