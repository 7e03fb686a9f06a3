//! Core utilities and shared types for the recon pipeline.

use serde::Serialize;
use std::fmt;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A domain or host that one full pipeline run is executed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target(pub String);

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(s.to_string())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of the remote instance pool the scans are dispatched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetName(pub String);

impl Default for FleetName {
    fn default() -> Self {
        FleetName("recon-fleet".to_string())
    }
}

impl From<&str> for FleetName {
    fn from(s: &str) -> Self {
        FleetName(s.to_string())
    }
}

impl fmt::Display for FleetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
