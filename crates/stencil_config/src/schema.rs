//! Schemas for templates, bundles and modules.
//!
//! Schemas are plain JSON Schema documents wrapped in [`Schema`], so they can
//! be composed at runtime. A bundle's `inputs` schema, for instance, depends on
//! the template it references and is attached with [`Schema::with_key`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::{JSONSchema, ValidationError};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{ConfigError, ConfigResult};

/// The only supported `apiVersion`.
pub const API_VERSION: &str = "stencil/v0";

pub const TEMPLATE_KIND: &str = "BundleTemplate";
pub const BUNDLE_KIND: &str = "Bundle";
pub const MODULE_KIND: &str = "Module";

/// Lowercase letters, digits and single dashes; starts with a letter and
/// does not end with a dash.
pub const IDENTIFIER_PATTERN: &str = "^[a-z](-?[a-z0-9])*$";
const IDENTIFIER_MAX_LENGTH: u64 = 63;
const RESERVED_PREFIX: &str = "stencil";

/// A JSON Schema document, optionally with separately compiled schemas
/// attached at some of its top-level keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    value: Value,
    attached: Vec<(String, InputsSchema)>,
}

impl Schema {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            attached: Vec::new(),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Return a copy of this schema where the property `key` is additionally
    /// checked against `schema`.
    ///
    /// The attached schema stays a standalone document, so its local `$ref`s
    /// resolve against its own root.
    pub fn with_key(&self, key: &str, schema: &InputsSchema) -> Schema {
        let mut composed = self.clone();
        composed.attached.retain(|(k, _)| k != key);
        composed.attached.push((key.to_string(), schema.clone()));
        composed
    }

    /// Compile the schema into a validator.
    pub fn compile(&self) -> Result<JSONSchema, String> {
        JSONSchema::compile(&self.value).map_err(|e| e.to_string())
    }
}

/// A compiled inputs schema attached to a template.
#[derive(Clone)]
pub struct InputsSchema {
    schema: Value,
    compiled: Arc<JSONSchema>,
}

impl InputsSchema {
    /// The schema used when a template declares no inputs schema file: an
    /// object that accepts no keys.
    pub fn default_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
        })
    }

    pub fn compile(schema: Value) -> Result<Self, String> {
        let compiled = JSONSchema::compile(&schema).map_err(|e| e.to_string())?;
        Ok(Self {
            schema,
            compiled: Arc::new(compiled),
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.schema
    }

    pub fn is_valid(&self, inputs: &Value) -> bool {
        self.compiled.is_valid(inputs)
    }

    /// Validate the value found at `key`, returning human-readable messages
    /// with key paths prefixed by `key` on failure.
    pub fn validate_at(&self, value: &Value, key: &str) -> Result<(), Vec<String>> {
        match self.compiled.validate(value) {
            Ok(()) => Ok(()),
            Err(errors) => Err(errors.map(|e| describe_error(&e, key)).collect()),
        }
    }
}

impl Default for InputsSchema {
    fn default() -> Self {
        // The default schema is a constant and always compiles.
        let schema = Self::default_schema();
        let compiled = JSONSchema::compile(&schema).expect("default inputs schema compiles");
        Self {
            schema,
            compiled: Arc::new(compiled),
        }
    }
}

impl fmt::Debug for InputsSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputsSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl PartialEq for InputsSchema {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
    }
}

impl Serialize for InputsSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.schema.serialize(serializer)
    }
}

fn api_version_schema() -> Value {
    json!({ "type": "string", "enum": [API_VERSION] })
}

fn identifier_schema() -> Value {
    json!({
        "type": "string",
        "pattern": IDENTIFIER_PATTERN,
        "maxLength": IDENTIFIER_MAX_LENGTH,
    })
}

fn user_identifier_schema() -> Value {
    json!({
        "allOf": [
            identifier_schema(),
            { "not": { "pattern": format!("^{}", RESERVED_PREFIX) } },
        ]
    })
}

/// Schema for `BundleTemplate` resources.
pub fn bundle_template_schema() -> Schema {
    Schema::new(json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["apiVersion", "name"],
        "properties": {
            "apiVersion": api_version_schema(),
            "kind": { "type": "string", "enum": [TEMPLATE_KIND] },
            "name": user_identifier_schema(),
            "path": { "type": "string" },
            "configPath": { "type": "string" },
            "inputsSchemaPath": { "type": "string" },
            "modules": { "type": "array", "items": { "type": "object" } },
        },
    }))
}

/// Schema for `Bundle` resources. `inputs` is only checked to be an object
/// until the referenced template is known.
pub fn bundle_schema() -> Schema {
    Schema::new(json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["apiVersion", "name", "template"],
        "properties": {
            "apiVersion": api_version_schema(),
            "kind": { "type": "string", "enum": [BUNDLE_KIND] },
            "name": user_identifier_schema(),
            "path": { "type": "string" },
            "configPath": { "type": "string" },
            "template": identifier_schema(),
            "inputs": { "type": "object" },
        },
    }))
}

/// Schema for module specs. Module type specific keys are allowed.
pub fn module_schema() -> Schema {
    let string_list = json!({ "type": "array", "items": { "type": "string" } });
    Schema::new(json!({
        "type": "object",
        "required": ["type", "name"],
        "properties": {
            "apiVersion": api_version_schema(),
            "kind": { "type": "string", "enum": [MODULE_KIND] },
            "type": { "type": "string" },
            "name": { "type": "string" },
            "description": { "type": "string" },
            "disabled": { "type": "boolean" },
            "include": string_list,
            "exclude": string_list,
            "path": { "type": "string" },
            "build": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "dependencies": {
                        "type": "array",
                        "items": {
                            "oneOf": [
                                { "type": "string" },
                                {
                                    "type": "object",
                                    "additionalProperties": false,
                                    "required": ["name"],
                                    "properties": {
                                        "name": { "type": "string" },
                                        "copy": {
                                            "type": "array",
                                            "items": {
                                                "type": "object",
                                                "additionalProperties": false,
                                                "required": ["source"],
                                                "properties": {
                                                    "source": { "type": "string" },
                                                    "target": { "type": "string" },
                                                },
                                            },
                                        },
                                    },
                                },
                            ],
                        },
                    },
                },
            },
            "generateFiles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["targetPath"],
                    "properties": {
                        "sourcePath": { "type": "string" },
                        "targetPath": { "type": "string" },
                        "value": { "type": "string" },
                    },
                },
            },
        },
    }))
}

/// What is being validated and where it was declared.
#[derive(Debug, Clone, Copy)]
pub struct ValidationTarget<'a> {
    pub config_type: &'a str,
    pub path: &'a Path,
    pub config_path: Option<&'a Path>,
    pub project_root: &'a Path,
}

impl ValidationTarget<'_> {
    /// Declared location, relative to the project root where possible.
    pub fn location(&self) -> String {
        let location = self.config_path.unwrap_or(self.path);
        match location.strip_prefix(self.project_root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => location.display().to_string(),
        }
    }

    pub fn error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::SchemaValidation {
            config_type: self.config_type.to_string(),
            location: self.location(),
            message: message.into(),
        }
    }
}

/// Validate `value` against `schema` and deserialize it.
pub fn validate_with_path<T: DeserializeOwned>(
    value: &Value,
    schema: &Schema,
    target: &ValidationTarget<'_>,
) -> ConfigResult<T> {
    let compiled = schema
        .compile()
        .map_err(|e| target.error(format!("invalid schema: {}", e)))?;

    let mut messages: Vec<String> = Vec::new();
    if let Err(errors) = compiled.validate(value) {
        for error in errors {
            push_unique(&mut messages, describe_error(&error, ""));
        }
    }
    for (key, attached) in &schema.attached {
        if let Some(sub) = value.get(key) {
            if let Err(errors) = attached.validate_at(sub, key) {
                for message in errors {
                    push_unique(&mut messages, message);
                }
            }
        }
    }
    if !messages.is_empty() {
        return Err(target.error(messages.join("; ")));
    }

    serde_json::from_value(value.clone()).map_err(|e| target.error(e.to_string()))
}

fn push_unique(messages: &mut Vec<String>, message: String) {
    if !messages.contains(&message) {
        messages.push(message);
    }
}

/// Check that `path` is a relative POSIX path that stays below its base.
pub fn validate_relative_sub_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("must not be empty".to_string());
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(format!("must be a relative POSIX-style path, got {}", path));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("must be a sub-path, got {}", path));
    }
    Ok(())
}

/// Dotted key path of a JSON pointer, e.g. `/inputs/foo` becomes `inputs.foo`.
fn key_path(pointer: &str, prefix: &str) -> String {
    let segments = pointer
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"));
    let mut parts: Vec<String> = Vec::new();
    if !prefix.is_empty() {
        parts.push(prefix.to_string());
    }
    parts.extend(segments);
    parts.join(".")
}

fn join_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn subject(key: &str) -> String {
    if key.is_empty() {
        "value".to_string()
    } else {
        format!("key .{}", key)
    }
}

fn with_article(word: &str) -> String {
    match word.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {}", word),
        _ => format!("a {}", word),
    }
}

fn describe_error(error: &ValidationError<'_>, prefix: &str) -> String {
    let key = key_path(&error.instance_path.to_string(), prefix);
    match &error.kind {
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|k| format!("key \"{}\" is not allowed at path [{}]", k, join_key(&key, k)))
            .collect::<Vec<_>>()
            .join("; "),
        ValidationErrorKind::Type {
            kind: TypeKind::Single(t),
        } => format!("{} must be {}", subject(&key), with_article(&t.to_string())),
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map(String::from).unwrap_or_else(|| property.to_string());
            format!("key .{} is required", join_key(&key, &name))
        }
        ValidationErrorKind::Pattern { pattern } if pattern == IDENTIFIER_PATTERN => format!(
            "{} must be a valid identifier (lowercase letters, digits and single dashes, \
             starting with a letter)",
            subject(&key)
        ),
        ValidationErrorKind::MaxLength { limit } => {
            format!("{} must be at most {} characters long", subject(&key), limit)
        }
        ValidationErrorKind::Enum { options } => {
            format!("{} must be one of {}", subject(&key), options)
        }
        _ => format!("{}: {}", subject(&key), error),
    }
}
