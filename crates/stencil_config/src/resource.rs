//! Raw, user-authored resources.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// A resource document as authored, plus where it was declared.
///
/// Resources are never modified by the resolvers. Every resolution step works
/// on a copy produced by [`Resource::to_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Directory the resource was declared in
    pub path: PathBuf,
    /// File the resource was declared in, if any
    pub config_path: Option<PathBuf>,
    /// The document, without `path` and `configPath`
    pub document: Map<String, Value>,
}

impl Resource {
    pub fn new(path: impl Into<PathBuf>, document: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            config_path: None,
            document,
        }
    }

    pub fn with_config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(config_path.into());
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.document.get("kind").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The document with `path` and `configPath` filled in.
    pub fn to_value(&self) -> Value {
        let mut document = self.document.clone();
        document.insert(
            "path".to_string(),
            Value::String(self.path.to_string_lossy().into_owned()),
        );
        if let Some(config_path) = &self.config_path {
            document.insert(
                "configPath".to_string(),
                Value::String(config_path.to_string_lossy().into_owned()),
            );
        }
        Value::Object(document)
    }
}
