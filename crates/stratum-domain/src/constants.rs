//! Runtime-wide constants

/// Reserved path prefix for API routes; unmatched requests under it get a
/// structured 404 instead of the SPA entry document
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Entry document served for unmatched non-API requests
pub const SPA_INDEX_FILE: &str = "index.html";

/// Default bind host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable read by the logging filter
pub const ENV_LOG_FILTER: &str = "STRATUM_LOG";

/// Environment prefix for configuration overrides
pub const ENV_CONFIG_PREFIX: &str = "STRATUM_";

/// Default configuration file name
pub const CONFIG_FILE: &str = "stratum.toml";

/// Header carrying the request correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
