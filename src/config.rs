//! Server configuration
//!
//! Built from the command line (`chat_hub [port|host:port]`) and
//! environment. A bare port binds to the detected outbound IPv4
//! interface, falling back to localhost.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::hub::DEFAULT_JOIN_HISTORY;

/// Port used when none is given
pub const DEFAULT_PORT: u16 = 1234;

/// Environment variable overriding the join history length
pub const JOIN_HISTORY_ENV: &str = "CHAT_HUB_JOIN_HISTORY";

/// Ports at or below this are rejected
const MIN_PORT_EXCLUSIVE: u16 = 1000;

/// Resolved server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: SocketAddr,
    /// Room lines returned when joining a room
    pub join_history: usize,
}

impl ServerConfig {
    /// Configuration from the process arguments and environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = env::args().collect();
        let join_history = env::var(JOIN_HISTORY_ENV).ok();
        Self::parse(&args, join_history.as_deref(), local_ip)
    }

    /// Parse `args` (program name first)
    ///
    /// `resolve_ip` is only called when the bind IP has to be discovered.
    pub fn parse(
        args: &[String],
        join_history: Option<&str>,
        resolve_ip: impl FnOnce() -> IpAddr,
    ) -> Result<Self, ConfigError> {
        let program = args.first().map(String::as_str).unwrap_or("chat_hub");
        if args.len() > 2 {
            return Err(ConfigError::Usage(program.to_string()));
        }

        let bind = match args.get(1) {
            Some(arg) if arg.contains(':') => arg
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidAddr(arg.clone(), e))?,
            Some(arg) => SocketAddr::new(resolve_ip(), parse_port(arg)?),
            None => SocketAddr::new(resolve_ip(), DEFAULT_PORT),
        };

        let join_history = match join_history {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(JOIN_HISTORY_ENV, value.to_string()))?,
            None => DEFAULT_JOIN_HISTORY,
        };

        Ok(Self { bind, join_history })
    }
}

fn parse_port(arg: &str) -> Result<u16, ConfigError> {
    match arg.parse::<u16>() {
        Ok(port) if port > MIN_PORT_EXCLUSIVE => Ok(port),
        _ => Err(ConfigError::InvalidPort(arg.to_string())),
    }
}

/// Outbound IPv4 address, or localhost when there is none
fn local_ip() -> IpAddr {
    match detect_interface_ipv4() {
        Some(ip) => IpAddr::V4(ip),
        None => {
            warn!("No IPv4 network detected, using localhost instead");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// IPv4 address of the interface used for outbound traffic
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn detect_interface_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    if let Err(e) = socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)) {
        debug!("Interface discovery failed: {}", e);
        return None;
    }

    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
