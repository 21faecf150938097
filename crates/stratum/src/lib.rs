//! # Stratum
//!
//! A pluggable service-composition runtime: a dependency registry, an
//! ordered three-layer bootstrap, and vendor-abstracted ports that let the
//! same handler and repository code run unmodified against interchangeable
//! backend engines (memory/postgres storage, axum/actix HTTP).
//!
//! ## Example
//!
//! ```ignore
//! use stratum::infrastructure::{ServiceConfig, ServiceKernel};
//!
//! let mut kernel = ServiceKernel::new(config);
//! kernel.start().await?;
//! ```
//!
//! ## Architecture
//!
//! - `domain` - error contract and engine-agnostic value objects
//! - `application` - port traits, engine registries, request pipeline
//! - `engines` - concrete adapters (memory, postgres, axum, actix)
//! - `infrastructure` - dependency registry, layer bootstrapper, kernel

/// Domain layer - error contract and value objects
///
/// Re-exports from the domain crate for convenience
pub mod domain {
    pub use stratum_domain::*;
}

/// Application layer - ports, registries, and the request pipeline
///
/// Re-exports from the application crate for convenience
pub mod application {
    pub use stratum_application::*;
}

/// Engine adapters - concrete storage and HTTP backends
///
/// Re-exports from the engines crate for convenience
pub mod engines {
    pub use stratum_engines::*;
}

/// Infrastructure layer - registry, bootstrapper, kernel, config, logging
///
/// Re-exports from the infrastructure crate for convenience
pub mod infrastructure {
    pub use stratum_infrastructure::*;
}

pub use stratum_domain::{Error, ErrorKind, Result};
