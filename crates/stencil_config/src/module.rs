//! Module configs and module spec preparation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigResult;
use crate::schema::{module_schema, validate_with_path, ValidationTarget, API_VERSION, MODULE_KIND};

/// A file to copy from a build dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopySpec {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// A module this module needs built first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildDependency {
    pub name: String,
    #[serde(default)]
    pub copy: Vec<CopySpec>,
}

/// Build dependencies may be given as a bare module name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BuildDependencySpec {
    Name(String),
    Full(BuildDependency),
}

impl From<BuildDependencySpec> for BuildDependency {
    fn from(spec: BuildDependencySpec) -> Self {
        match spec {
            BuildDependencySpec::Name(name) => BuildDependency {
                name,
                copy: Vec::new(),
            },
            BuildDependencySpec::Full(dep) => dep,
        }
    }
}

/// Build configuration of a module.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct BuildConfig {
    pub dependencies: Vec<BuildDependency>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct BuildSpec {
    #[serde(default)]
    dependencies: Vec<BuildDependencySpec>,
}

/// A file generated into the module directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFileSpec {
    /// File to render, relative to the declaring config until resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// Path of the generated file, relative to the module directory
    pub target_path: String,
    /// Inline contents, used when there is no source path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// The fields of a module spec that every module type shares.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModuleSpecFields {
    api_version: Option<String>,
    #[serde(rename = "type")]
    module_type: String,
    name: String,
    description: Option<String>,
    #[serde(default)]
    disabled: bool,
    include: Option<Vec<String>>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    build: BuildSpec,
    #[serde(default)]
    generate_files: Vec<GenerateFileSpec>,
}

/// A normalized, validated module configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(rename = "type")]
    pub module_type: String,
    /// Module root directory
    pub path: PathBuf,
    /// File the module was declared in
    pub config_path: Option<PathBuf>,
    pub description: Option<String>,
    pub disabled: bool,
    pub include: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub build: BuildConfig,
    pub generate_files: Vec<GenerateFileSpec>,
    /// The full module spec, including module type specific keys
    pub spec: Value,
    /// Bundle that generated this module, if any
    pub bundle_name: Option<String>,
    /// Template of that bundle
    pub bundle_template_name: Option<String>,
    /// Inputs of that bundle, shared with every module it generated
    pub inputs: Option<Arc<Map<String, Value>>>,
}

impl ModuleConfig {
    /// Attach the originating bundle's metadata.
    pub fn with_bundle(
        mut self,
        bundle_name: impl Into<String>,
        template_name: impl Into<String>,
        inputs: Arc<Map<String, Value>>,
    ) -> Self {
        self.bundle_name = Some(bundle_name.into());
        self.bundle_template_name = Some(template_name.into());
        self.inputs = Some(inputs);
        self
    }
}

/// Validate a module spec and turn it into a [`ModuleConfig`].
///
/// `path` is the directory the module is declared in and becomes the module
/// root; `config_path` is the declaring file, if known.
pub fn prepare_module_resource(
    spec: &Value,
    path: &Path,
    config_path: Option<&Path>,
    project_root: &Path,
) -> ConfigResult<ModuleConfig> {
    let target = ValidationTarget {
        config_type: "module",
        path,
        config_path,
        project_root,
    };
    let fields: ModuleSpecFields = validate_with_path(spec, &module_schema(), &target)?;

    Ok(ModuleConfig {
        api_version: fields.api_version.unwrap_or_else(|| API_VERSION.to_string()),
        kind: MODULE_KIND.to_string(),
        name: fields.name,
        module_type: fields.module_type,
        path: path.to_path_buf(),
        config_path: config_path.map(Path::to_path_buf),
        description: fields.description,
        disabled: fields.disabled,
        include: fields.include,
        exclude: fields.exclude,
        build: BuildConfig {
            dependencies: fields.build.dependencies.into_iter().map(Into::into).collect(),
        },
        generate_files: fields.generate_files,
        spec: spec.clone(),
        bundle_name: None,
        bundle_template_name: None,
        inputs: None,
    })
}
