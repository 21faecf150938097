//! Engine-agnostic value objects
//!
//! Everything port contracts exchange: normalized HTTP request/response
//! values, lean persistence records, handler descriptors, and the tagged
//! configuration types that select engines.

pub mod config;
pub mod handler;
pub mod record;
pub mod request;

pub use config::{CollectionSchema, DataVendor, RepositoryConfig, ServerVendor};
pub use handler::{
    FieldKind, HookPoint, ObjectSchema, ProxyConfig, RouteDescriptor, RouteSchema,
    SpaFallbackConfig, StaticFilesConfig,
};
pub use record::{LeanRecord, NativeShape};
pub use request::{HttpMethod, PortRequest, PortResponse};
