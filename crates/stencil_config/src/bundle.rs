//! Bundle resolution.
//!
//! A `Bundle` instantiates a `BundleTemplate` with a set of inputs. Resolution
//! goes through these stages, and any failure is terminal:
//!
//! 1. Resolve template strings in the bundle against the project context.
//! 2. Validate the bundle, with `inputs` checked only as an object.
//! 3. Look up the referenced template.
//! 4. Validate again with the template's inputs schema attached at `inputs`.
//! 5. Materialize every module spec of the template against the bundle
//!    context, preserving the declared order.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::context::{BundleConfigContext, ProjectConfigContext};
use crate::error::{ConfigError, ConfigResult};
use crate::module::{prepare_module_resource, ModuleConfig};
use crate::options::ResolveOptions;
use crate::paths::{ensure_dir, resolve_posix_path};
use crate::resource::Resource;
use crate::schema::{
    bundle_schema, validate_relative_sub_path, validate_with_path, ValidationTarget, BUNDLE_KIND,
};
use crate::template::BundleTemplateConfig;
use crate::template_string::{resolve_template_strings, ResolveMode};

/// Stages of a bundle resolution, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BundleResolveStage {
    Fetched,
    OuterResolved,
    PartiallyValidated,
    TemplateFound,
    FullyValidated,
    UnitsMaterializing,
    Materialized,
}

impl fmt::Display for BundleResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetched => "fetched",
            Self::OuterResolved => "outer-resolved",
            Self::PartiallyValidated => "validated (partial)",
            Self::TemplateFound => "template-found",
            Self::FullyValidated => "validated (full)",
            Self::UnitsMaterializing => "units-materializing",
            Self::Materialized => "materialized",
        };
        f.write_str(name)
    }
}

fn default_kind() -> String {
    BUNDLE_KIND.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleFields {
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    name: String,
    path: PathBuf,
    config_path: Option<PathBuf>,
    template: String,
    inputs: Option<Map<String, Value>>,
}

/// A resolved bundle with its materialized modules.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfig {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Directory of the bundle
    pub path: PathBuf,
    pub config_path: Option<PathBuf>,
    /// Name of the instantiated template
    pub template: String,
    /// Validated inputs, shared with every module
    pub inputs: Arc<Map<String, Value>>,
    /// Modules in the order the template declares them
    pub modules: Vec<ModuleConfig>,
}

fn trace_stage(bundle: &str, stage: BundleResolveStage) {
    debug!("{} {}: {}", BUNDLE_KIND, bundle, stage);
}

/// Resolve a bundle against the available templates.
pub async fn resolve_bundle(
    resource: &Resource,
    templates: &BTreeMap<String, BundleTemplateConfig>,
    context: &ProjectConfigContext,
    options: &ResolveOptions,
) -> ConfigResult<BundleConfig> {
    let label = resource.name().unwrap_or("<unnamed>").to_string();
    trace_stage(&label, BundleResolveStage::Fetched);

    let resolved = resolve_template_strings(&resource.to_value(), context, ResolveMode::Strict)?;
    trace_stage(&label, BundleResolveStage::OuterResolved);

    let target = ValidationTarget {
        config_type: BUNDLE_KIND,
        path: &resource.path,
        config_path: resource.config_path(),
        project_root: &options.project_root,
    };
    let fields: BundleFields = validate_with_path(&resolved, &bundle_schema(), &target)?;
    trace_stage(&fields.name, BundleResolveStage::PartiallyValidated);

    let template = templates
        .get(&fields.template)
        .ok_or_else(|| ConfigError::TemplateNotFound {
            bundle: fields.name.clone(),
            template: fields.template.clone(),
            available: templates.keys().cloned().collect(),
        })?;
    trace_stage(&fields.name, BundleResolveStage::TemplateFound);

    // The inputs schema depends on the template, so this needs a second pass
    // over the same resolved value.
    let schema = bundle_schema().with_key("inputs", &template.inputs_schema);
    let fields: BundleFields = validate_with_path(&resolved, &schema, &target)?;
    trace_stage(&fields.name, BundleResolveStage::FullyValidated);

    let inputs = Arc::new(fields.inputs.clone().unwrap_or_default());
    let bundle_context = BundleConfigContext::new(&fields.name, &template.name, &inputs);

    trace_stage(&fields.name, BundleResolveStage::UnitsMaterializing);
    let modules: Vec<ModuleConfig> = stream::iter(template.modules.iter())
        .map(|spec| materialize_module(spec, &fields, template, &bundle_context, &inputs, options))
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;
    trace_stage(&fields.name, BundleResolveStage::Materialized);

    info!(
        "Resolved {} {} from template {} ({} modules)",
        BUNDLE_KIND,
        fields.name,
        template.name,
        modules.len()
    );

    Ok(BundleConfig {
        api_version: fields.api_version,
        kind: fields.kind,
        name: fields.name,
        path: fields.path,
        config_path: fields.config_path,
        template: fields.template,
        inputs,
        modules,
    })
}

/// Name of a module spec as written, for error messages.
fn module_name(spec: &Value) -> String {
    match spec.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(other) => other.to_string(),
        None => "<unnamed>".to_string(),
    }
}

async fn materialize_module(
    spec: &Value,
    bundle: &BundleFields,
    template: &BundleTemplateConfig,
    context: &BundleConfigContext,
    inputs: &Arc<Map<String, Value>>,
    options: &ResolveOptions,
) -> ConfigResult<ModuleConfig> {
    let invalid = |spec: &Value, source: ConfigError| ConfigError::UnitMaterialization {
        template: template.name.clone(),
        module: module_name(spec),
        bundle: bundle.name.clone(),
        source: Box::new(source),
    };

    let spec = resolve_template_strings(spec, context, ResolveMode::Partial)
        .map_err(|e| invalid(spec, e))?;

    let mut module = prepare_module_resource(
        &spec,
        &bundle.path,
        bundle.config_path.as_deref(),
        &options.project_root,
    )
    .map_err(|e| invalid(&spec, e))?;

    // Source files live next to the template, wherever the bundle is declared.
    // A leading `/` is relative to the template directory too.
    for file in &mut module.generate_files {
        if let Some(source) = &file.source_path {
            let source = source.to_string_lossy();
            file.source_path = Some(resolve_posix_path(
                &template.path,
                source.trim_start_matches('/'),
            ));
        }
    }

    if let Some(sub_path) = spec.get("path").and_then(Value::as_str) {
        validate_relative_sub_path(sub_path).map_err(|message| {
            let target = ValidationTarget {
                config_type: "module",
                path: &bundle.path,
                config_path: bundle.config_path.as_deref(),
                project_root: &options.project_root,
            };
            invalid(&spec, target.error(format!("key .path {}", message)))
        })?;
        module.path = resolve_posix_path(&bundle.path, sub_path);
        ensure_dir(&module.path).await?;
    }

    debug!(
        "Materialized module {} for {} {}",
        module.name, BUNDLE_KIND, bundle.name
    );
    Ok(module.with_bundle(&bundle.name, &template.name, Arc::clone(inputs)))
}
