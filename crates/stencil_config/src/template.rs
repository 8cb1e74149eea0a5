//! Bundle template resolution.
//!
//! A `BundleTemplate` declares an inputs schema and a list of module specs.
//! Resolving a template resolves and validates every field except `modules`,
//! which may reference `${inputs.*}` and `${bundle.*}` and therefore stays
//! untouched until a bundle instantiates the template.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::context::ProjectConfigContext;
use crate::error::{ConfigError, ConfigResult, SchemaFileCause};
use crate::options::ResolveOptions;
use crate::paths::{config_dir, resolve_posix_path};
use crate::resource::Resource;
use crate::schema::{
    bundle_template_schema, validate_with_path, InputsSchema, ValidationTarget, TEMPLATE_KIND,
};
use crate::template_string::{resolve_template_strings, ResolveMode};

fn default_kind() -> String {
    TEMPLATE_KIND.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleTemplateFields {
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    name: String,
    path: PathBuf,
    config_path: Option<PathBuf>,
    inputs_schema_path: Option<String>,
}

/// A resolved template, ready to be instantiated by bundles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleTemplateConfig {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Directory of the template
    pub path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub inputs_schema_path: Option<String>,
    /// Compiled inputs schema, always object shaped
    pub inputs_schema: InputsSchema,
    /// Module specs exactly as authored
    pub modules: Vec<Value>,
}

impl BundleTemplateConfig {
    /// Directory the template was declared in.
    pub fn config_dir(&self) -> PathBuf {
        config_dir(&self.path, self.config_path.as_deref())
    }
}

/// Resolve and validate a template resource.
pub async fn resolve_bundle_template(
    resource: &Resource,
    context: &ProjectConfigContext,
    options: &ResolveOptions,
) -> ConfigResult<BundleTemplateConfig> {
    let target = ValidationTarget {
        config_type: TEMPLATE_KIND,
        path: &resource.path,
        config_path: resource.config_path(),
        project_root: &options.project_root,
    };

    // Module specs are set aside before resolution and re-attached as-is.
    let modules = match resource.document.get("modules") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(modules)) => modules.clone(),
        Some(_) => return Err(target.error("key .modules must be an array")),
    };

    let mut partial = resource.to_value();
    partial["modules"] = Value::Array(Vec::new());
    let resolved = resolve_template_strings(&partial, context, ResolveMode::Strict)?;

    let fields: BundleTemplateFields =
        validate_with_path(&resolved, &bundle_template_schema(), &target)?;

    if let Some(schema_path) = &fields.inputs_schema_path {
        if schema_path.starts_with('/') || schema_path.contains('\\') {
            return Err(target.error(format!(
                "key .inputsSchemaPath must be a relative POSIX-style path, got {}",
                schema_path
            )));
        }
    }

    let inputs_schema = load_inputs_schema(&fields).await?;

    info!(
        "Resolved {} {} ({} modules)",
        TEMPLATE_KIND,
        fields.name,
        modules.len()
    );

    Ok(BundleTemplateConfig {
        api_version: fields.api_version,
        kind: fields.kind,
        name: fields.name,
        path: fields.path,
        config_path: fields.config_path,
        inputs_schema_path: fields.inputs_schema_path,
        inputs_schema,
        modules,
    })
}

/// Load the declared inputs schema, or the default when none is declared.
async fn load_inputs_schema(fields: &BundleTemplateFields) -> ConfigResult<InputsSchema> {
    let Some(schema_path) = &fields.inputs_schema_path else {
        return Ok(InputsSchema::default());
    };

    let dir = config_dir(&fields.path, fields.config_path.as_deref());
    let path = resolve_posix_path(&dir, schema_path);
    debug!("Reading inputs schema for {} from {:?}", fields.name, path);

    let file_error = |source: SchemaFileCause| ConfigError::SchemaFile {
        kind: TEMPLATE_KIND.to_string(),
        name: fields.name.clone(),
        path: path.clone(),
        source,
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| file_error(e.into()))?;
    let schema: Value = serde_json::from_str(&content).map_err(|e| file_error(e.into()))?;

    match schema.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        other => {
            return Err(ConfigError::SchemaType {
                kind: TEMPLATE_KIND.to_string(),
                name: fields.name.clone(),
                path: path.clone(),
                schema_type: match other {
                    Some(Value::String(t)) => t.clone(),
                    Some(v) => v.to_string(),
                    None => "none".to_string(),
                },
            })
        }
    }

    InputsSchema::compile(schema).map_err(|e| file_error(SchemaFileCause::Compile(e)))
}
