//! Engine selection tags and repository configuration
//!
//! Vendors are discriminant tags: configuration names an engine, the loader
//! dispatches on the tag, and exactly one adapter is bound per repository
//! for its lifetime.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data-access engine tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataVendor {
    /// Default in-process document store
    Memory,
    /// Optional heavy backend, initialized on first real use
    Postgres,
}

impl DataVendor {
    /// Registry tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for DataVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP server engine tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerVendor {
    Axum,
    Actix,
}

impl ServerVendor {
    /// Registry tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Axum => "axum",
            Self::Actix => "actix",
        }
    }
}

impl fmt::Display for ServerVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared collection shape for the document engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name
    pub name: String,
    /// Declared entity fields, informational
    #[serde(default)]
    pub fields: Vec<String>,
}

impl CollectionSchema {
    /// Schema with a name and no declared fields
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }
}

/// Repository configuration, discriminated by engine tag
///
/// Each variant carries its engine-specific shape. Once a repository is
/// constructed from one of these, its bound adapter never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RepositoryConfig {
    /// In-memory document collection
    Memory {
        /// Collection shape
        schema: CollectionSchema,
    },
    /// Postgres-backed table
    Postgres {
        /// Backing table name
        table: String,
        /// Logical repository name, defaults to the table name
        #[serde(default)]
        name: Option<String>,
    },
}

impl RepositoryConfig {
    /// Engine tag this configuration selects
    pub fn vendor(&self) -> DataVendor {
        match self {
            Self::Memory { .. } => DataVendor::Memory,
            Self::Postgres { .. } => DataVendor::Postgres,
        }
    }

    /// Logical collection name
    pub fn collection(&self) -> &str {
        match self {
            Self::Memory { schema } => &schema.name,
            Self::Postgres { table, name } => name.as_deref().unwrap_or(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_tag_discriminated() {
        let json = r#"{"type": "memory", "schema": {"name": "users"}}"#;
        let config: RepositoryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vendor(), DataVendor::Memory);
        assert_eq!(config.collection(), "users");
    }

    #[test]
    fn postgres_name_defaults_to_table() {
        let json = r#"{"type": "postgres", "table": "accounts"}"#;
        let config: RepositoryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.vendor(), DataVendor::Postgres);
        assert_eq!(config.collection(), "accounts");
    }
}
