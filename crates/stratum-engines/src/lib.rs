//! # Stratum Engines
//!
//! Concrete engine adapters. Each adapter implements a port defined in
//! `stratum-application` against one backend and registers itself into the
//! matching linkme slice, so the loader can select it by vendor tag without
//! knowing it exists.
//!
//! | Category | Port | Implementations |
//! |----------|------|-----------------|
//! | Data | `DataAdapter` | Memory (default), Postgres (lazy) |
//! | Server | `ApiPort` + `PagePort` | Axum, Actix |

pub mod data;
pub mod server;

pub use data::memory::{MemoryAdapter, MemoryDatabase};
pub use data::postgres::{PostgresAdapter, PostgresDatabase};
pub use server::actix_engine::{ActixEngine, RawActixRoutes};
pub use server::axum_engine::{AxumEngine, RawAxumRouter};
