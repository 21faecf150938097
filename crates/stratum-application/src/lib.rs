//! # Stratum Application
//!
//! Port contracts and engine-agnostic composition logic. This crate defines
//! what an engine must provide (the [`ports`] traits), how concrete engines
//! are discovered and selected ([`registry`]), and the request pipeline that
//! lets identical handler code run unmodified on any HTTP engine
//! ([`dispatch`]).
//!
//! Engine crates depend on this one and register themselves into the linkme
//! slices declared under [`registry`]; nothing here knows a concrete engine.

pub mod dispatch;
pub mod lazy;
pub mod ports;
pub mod registry;
pub mod repository;

pub use dispatch::RequestPipeline;
pub use lazy::LazyEngine;
pub use ports::data::{DataAdapter, Filter};
pub use ports::server::{
    ApiPort, CustomRegistration, FnHook, FnRoute, HookHandler, PagePort, PlatformEngine,
    RouteHandler, ServerHandle,
};
pub use registry::data::{resolve_data_engine, EngineContext};
pub use registry::server::resolve_server_engine;
pub use repository::Repository;
