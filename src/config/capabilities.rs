//! Optional capabilities a configuration component can advertise
//!
//! Components implement these traits instead of being probed at runtime;
//! reporting code asks for `&dyn SupportsPoolStatus` and so on.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub component: &'static str,
    pub pool_size: u32,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Connection target summary; `target` never contains credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub component: &'static str,
    pub target: String,
    pub configured: bool,
    pub tls_enabled: bool,
}

pub trait SupportsPoolStatus {
    fn pool_status(&self) -> PoolStatus;
}

pub trait SupportsConnectionStatus {
    fn connection_status(&self) -> ConnectionStatus;
}
