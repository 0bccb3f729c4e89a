use super::loader::{listen_target, BackendConfig, DEFAULT_FAILOVER_LISTEN, DEFAULT_MAIN_LISTEN};
use crate::backend::{BackendIdentity, ChaosBackend, RouteTable};
use crate::listener::{expand_targets, ListenerSpec};
use log::warn;
use std::sync::Arc;

pub const DEFAULT_ADDRESSES: &str = "127.0.0.1";
pub const DEFAULT_PORTS: &str = "8080";

/// Listener settings given on the command line. `None` defers to the config file.
#[derive(Debug, Clone, Default)]
pub struct ListenOverrides {
    pub listen: Option<String>,
    pub failover_listen: Option<String>,
    pub addresses: Option<String>,
    pub ports: Option<String>,
    pub no_failover: bool,
}

impl ListenOverrides {
    pub fn multi_listener(&self) -> bool {
        self.addresses.is_some() || self.ports.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerRole {
    /// Full route table.
    Main,
    /// Default page only.
    Failover,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedListener {
    pub spec: ListenerSpec,
    pub role: ListenerRole,
    pub identity: BackendIdentity,
}

/// Every listener the process will start, in start order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub listeners: Vec<PlannedListener>,
}

impl RunPlan {
    pub fn build(config: &BackendConfig, overrides: &ListenOverrides) -> Self {
        let mut listeners = Vec::new();

        if overrides.multi_listener() {
            let addresses = overrides.addresses.as_deref().unwrap_or(DEFAULT_ADDRESSES);
            let ports = overrides.ports.as_deref().unwrap_or(DEFAULT_PORTS);
            for spec in expand_targets(addresses, ports) {
                listeners.push(PlannedListener {
                    identity: BackendIdentity::Listener(spec.to_string()),
                    spec,
                    role: ListenerRole::Main,
                });
            }
        } else {
            let spec = match &overrides.listen {
                Some(raw) => listen_target(raw, DEFAULT_MAIN_LISTEN),
                None => config.main_target(),
            };
            listeners.push(PlannedListener {
                spec,
                role: ListenerRole::Main,
                identity: BackendIdentity::Default,
            });
        }

        if !overrides.no_failover {
            let spec = match &overrides.failover_listen {
                Some(raw) => listen_target(raw, DEFAULT_FAILOVER_LISTEN),
                None => config.failover_target(),
            };
            if listeners.iter().any(|planned| planned.spec == spec) {
                warn!("Failover listener {} overlaps a main listener, not starting it", spec);
            } else {
                listeners.push(PlannedListener {
                    spec,
                    role: ListenerRole::Failover,
                    identity: BackendIdentity::Default,
                });
            }
        }

        Self { listeners }
    }

    pub fn count(&self, role: ListenerRole) -> usize {
        self.listeners.iter().filter(|planned| planned.role == role).count()
    }

    /// Pair every planned listener with its backend. Listeners of the same
    /// role share one route table.
    pub fn into_targets(self) -> Vec<(ListenerSpec, Arc<ChaosBackend>)> {
        let full = Arc::new(RouteTable::full());
        let failover = Arc::new(RouteTable::failover());

        self.listeners
            .into_iter()
            .map(|planned| {
                let routes = match planned.role {
                    ListenerRole::Main => Arc::clone(&full),
                    ListenerRole::Failover => Arc::clone(&failover),
                };
                let backend = ChaosBackend::new(routes, planned.identity);
                (planned.spec, Arc::new(backend))
            })
            .collect()
    }
}
