//! Dependency injection
//!
//! Explicit, reflection-free wiring: every constructible unit declares its
//! token and its ordered dependency list at registration time, and the
//! registry is the only shared mutable structure in the runtime. All
//! mutation happens during the single-threaded bootstrap phase; request
//! handling only reads.

pub mod layers;
pub mod registry;

pub use layers::{bootstrap_layer, bootstrap_layers, ConstructorSpec, Layer, LayerPlan, LayerReport};
pub use registry::{Lifecycle, ServiceRegistry};
