//! Binding and serving any number of independent listeners.
//!
//! Every listener runs its own accept loop on its own task and every
//! connection gets a task of its own. The only thing that waits on them
//! is [`serve_all`], which fails fast: the first listener that cannot bind
//! takes the whole process down with it.

use crate::backend::ChaosBackend;
use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

static PORT_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").unwrap());

/// Pause after a failed accept so a persistent error (EMFILE) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// One `host:port` bind target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerSpec {
    pub host: String,
    pub port: u16,
}

impl ListenerSpec {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ListenerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenerSpec {
    type Err = String;

    /// Accepts `host:port` and `[v6]:port`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let (host, port) = input
            .rsplit_once(':')
            .ok_or_else(|| format!("Missing port in listen address: {}", input))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(format!("Missing host in listen address: {}", input));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("Invalid port in listen address {}: {}", input, e))?;
        Ok(Self::new(host, port))
    }
}

#[derive(Debug)]
pub enum ListenerError {
    Bind { target: ListenerSpec, source: io::Error },
    NoTargets,
    Crashed(String),
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Bind { target, source } => {
                write!(f, "Failed to bind listener {}: {}", target, source)
            }
            ListenerError::NoTargets => write!(f, "No valid listen targets"),
            ListenerError::Crashed(reason) => write!(f, "Listener task crashed: {}", reason),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Expand a comma-separated list of ports and inclusive `start-end` ranges.
///
/// Malformed entries are skipped with a warning.
pub fn parse_ports(spec: &str) -> Vec<u16> {
    let mut ports = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if let Some(caps) = PORT_RANGE.captures(entry) {
            match (caps[1].parse::<u16>(), caps[2].parse::<u16>()) {
                (Ok(start), Ok(end)) if start <= end => ports.extend(start..=end),
                _ => warn!("Skipping invalid port range: {}", entry),
            }
            continue;
        }

        match entry.parse::<u16>() {
            Ok(port) => ports.push(port),
            Err(e) => warn!("Skipping invalid port {}: {}", entry, e),
        }
    }

    ports
}

/// Cartesian product of addresses and ports, addresses outermost.
pub fn expand_targets(addresses: &str, ports: &str) -> Vec<ListenerSpec> {
    let ports = parse_ports(ports);
    let ports = ports.as_slice();
    addresses
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .flat_map(move |address| ports.iter().map(move |&port| ListenerSpec::new(address, port)))
        .collect()
}

/// A bound socket together with the backend that answers on it.
pub struct Listener {
    spec: ListenerSpec,
    socket: TcpListener,
    backend: Arc<ChaosBackend>,
}

impl Listener {
    pub async fn bind(spec: ListenerSpec, backend: Arc<ChaosBackend>) -> Result<Self, ListenerError> {
        match TcpListener::bind((spec.host.as_str(), spec.port)).await {
            Ok(socket) => Ok(Self {
                spec,
                socket,
                backend,
            }),
            Err(source) => Err(ListenerError::Bind {
                target: spec,
                source,
            }),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept forever, one task per connection.
    pub async fn run(self) -> Result<(), ListenerError> {
        info!(
            "Listening on {} ({} routes)",
            self.spec,
            self.backend.routes().paths().collect::<Vec<_>>().join(", ")
        );

        loop {
            match self.socket.accept().await {
                Ok((stream, peer)) => {
                    let backend = Arc::clone(&self.backend);
                    tokio::spawn(async move {
                        backend.serve_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!("Accept error on {}: {}", self.spec, e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Bind and serve every target concurrently.
///
/// Returns once all listeners have stopped, or as soon as one fails. In
/// that case the others are aborted.
pub async fn serve_all(targets: Vec<(ListenerSpec, Arc<ChaosBackend>)>) -> Result<(), ListenerError> {
    if targets.is_empty() {
        return Err(ListenerError::NoTargets);
    }

    let mut listeners = JoinSet::new();
    for (spec, backend) in targets {
        listeners.spawn(async move { Listener::bind(spec, backend).await?.run().await });
    }

    while let Some(joined) = listeners.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(ListenerError::Crashed(e.to_string())),
        }
    }

    Ok(())
}
