//! # Stratum Infrastructure
//!
//! The composition side of the runtime: the dependency registry every
//! constructed unit is wired through, the ordered layer bootstrapper, and
//! the service kernel that drives validate → connect → bootstrap → register
//! → listen. Ambient concerns (configuration loading, logging init) live
//! here too.
//!
//! This crate depends on `stratum-engines` so that linking it completes the
//! linkme engine registration; nothing here names a concrete engine type
//! outside the kernel's database handles.

pub mod config;
pub mod di;
pub mod kernel;
pub mod logging;

pub use config::AppConfig;
pub use di::layers::{bootstrap_layers, ConstructorSpec, Layer, LayerPlan, LayerReport};
pub use di::registry::{Lifecycle, ServiceRegistry};
pub use kernel::{
    DatabaseConfig, DatabaseHandle, KernelState, RepositoryRegistration, ServerPlatformConfig,
    ServiceConfig, ServiceKernel, ServiceType,
};
