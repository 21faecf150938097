//! # Stratum Domain
//!
//! Core types for the Stratum service-composition runtime. This crate holds
//! everything the port boundaries speak in: the error contract, normalized
//! request/response values, lean persistence records, and the configuration
//! tags that select engines.
//!
//! The domain crate is pure: no engine crates, no I/O, no runtime. Engine
//! adapters translate their native shapes into these types and nothing else
//! crosses a port boundary.

pub mod constants;
pub mod error;
pub mod value_objects;

pub use error::{Error, ErrorKind, Result};
