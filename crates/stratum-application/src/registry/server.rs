//! Server engine registry
//!
//! Same auto-registration pattern as the data engines: HTTP engines submit
//! a factory entry at compile time, and the orchestrator resolves one by
//! vendor tag when registering platforms.

use stratum_domain::error::{Error, Result};
use stratum_domain::value_objects::ServerVendor;

use crate::ports::server::PlatformEngine;

/// Registry entry for HTTP server engines
pub struct ServerEngineEntry {
    /// Unique vendor tag (e.g. "axum", "actix")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Factory building a fresh, unconfigured engine
    pub factory: fn() -> std::result::Result<Box<dyn PlatformEngine>, String>,
}

// Auto-collection via linkme distributed slices
#[linkme::distributed_slice]
pub static SERVER_ENGINES: [ServerEngineEntry] = [..];

/// Resolve the server engine matching the vendor tag
///
/// # Errors
/// `ADAPTER_LOAD` when the tag matches no registered engine or the
/// engine's factory fails.
pub fn resolve_server_engine(vendor: ServerVendor) -> Result<Box<dyn PlatformEngine>> {
    let tag = vendor.as_str();

    for entry in SERVER_ENGINES {
        if entry.name == tag {
            return (entry.factory)().map_err(|reason| {
                Error::adapter_load(format!("Failed to load server engine '{tag}': {reason}"))
                    .with_component("engine-loader")
                    .with_operation("resolve_server_engine")
            });
        }
    }

    let available: Vec<&str> = SERVER_ENGINES.iter().map(|e| e.name).collect();

    Err(Error::adapter_load(format!(
        "Unknown server engine '{tag}'. Available engines: {available:?}"
    ))
    .with_component("engine-loader")
    .with_operation("resolve_server_engine"))
}

/// List all registered server engines as (name, description) pairs
pub fn list_server_engines() -> Vec<(&'static str, &'static str)> {
    SERVER_ENGINES.iter().map(|e| (e.name, e.description)).collect()
}
