//! Error types for bundle and template resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while resolving templates and bundles.
///
/// Every variant is a user-facing configuration error. The messages are meant
/// to be printed as-is.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error validating {config_type} ({location}): {message}")]
    SchemaValidation {
        config_type: String,
        location: String,
        message: String,
    },

    #[error("Unable to read inputs schema for {kind} {name} ({}): {source}", path.display())]
    SchemaFile {
        kind: String,
        name: String,
        path: PathBuf,
        #[source]
        source: SchemaFileCause,
    },

    #[error("Inputs schema for {kind} {name} has type {schema_type}, but should be \"object\".")]
    SchemaType {
        kind: String,
        name: String,
        path: PathBuf,
        schema_type: String,
    },

    #[error(
        "Bundle {bundle} references template {template}, which cannot be found. Available templates: {}",
        available.join(", ")
    )]
    TemplateNotFound {
        bundle: String,
        template: String,
        available: Vec<String>,
    },

    #[error("BundleTemplate {template} returned an invalid module (named {module}) for Bundle {bundle}: {source}")]
    UnitMaterialization {
        template: String,
        module: String,
        bundle: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Invalid template string ({template}): {message}")]
    TemplateString { template: String, message: String },

    #[error("Unable to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate {kind} name {name} in {} and {}", first.display(), second.display())]
    DuplicateName {
        kind: String,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No project config found in {0}")]
    ProjectNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Underlying reason an inputs schema file could not be loaded.
#[derive(Error, Debug)]
pub enum SchemaFileCause {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid JSON schema: {0}")]
    Compile(String),
}

impl ConfigError {
    /// Whether this error comes from validating user configuration against a schema.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::SchemaValidation { .. } | Self::SchemaType { .. } => true,
            Self::UnitMaterialization { source, .. } => source.is_validation(),
            _ => false,
        }
    }
}
