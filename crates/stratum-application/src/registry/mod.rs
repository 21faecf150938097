//! Engine registries
//!
//! Auto-registration for concrete engines using linkme distributed slices.
//! Engine crates submit entries at compile time via
//! `#[linkme::distributed_slice]`; resolution dispatches on the
//! configuration's vendor tag with no direct knowledge of concrete
//! implementations.

pub mod data;
pub mod server;

pub use data::{list_data_engines, resolve_data_engine, DataEngineEntry, EngineContext, DATA_ENGINES};
pub use server::{list_server_engines, resolve_server_engine, ServerEngineEntry, SERVER_ENGINES};
