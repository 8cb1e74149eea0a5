//! Project loading and whole-project resolution.
//!
//! A project is a directory tree of `*.stencil.yml` files. Each file holds
//! one or more YAML documents, dispatched on their `kind`: exactly one
//! `Project`, any number of `BundleTemplate`s and `Bundle`s.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::bundle::{resolve_bundle, BundleConfig};
use crate::context::ProjectConfigContext;
use crate::error::{ConfigError, ConfigResult};
use crate::module::ModuleConfig;
use crate::options::ResolveOptions;
use crate::resource::Resource;
use crate::schema::{BUNDLE_KIND, TEMPLATE_KIND};
use crate::template::{resolve_bundle_template, BundleTemplateConfig};

pub const PROJECT_KIND: &str = "Project";

/// File name patterns of configuration files.
pub const CONFIG_FILE_PATTERNS: [&str; 2] = ["*.stencil.yml", "*.stencil.yaml"];

/// Project-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub name: String,
    /// Values exposed as `${var.*}`
    #[serde(default)]
    pub variables: Map<String, Value>,
}

/// Everything declared in a project, unresolved.
#[derive(Debug, Clone)]
pub struct ProjectResources {
    pub root: PathBuf,
    pub project: ProjectConfig,
    pub templates: Vec<Resource>,
    pub bundles: Vec<Resource>,
}

impl ProjectResources {
    /// Context for resolving templates and bundles, including the process
    /// environment under `local.env`.
    pub fn context(&self) -> ProjectConfigContext {
        ProjectConfigContext::new(&self.project.name, &self.root)
            .with_variables(self.project.variables.clone())
            .with_env(std::env::vars())
    }
}

/// Loads project resources from a directory tree.
pub struct ProjectLoader {
    root: PathBuf,
    patterns: Vec<Pattern>,
}

impl ProjectLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let patterns = CONFIG_FILE_PATTERNS
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        Self {
            root: root.into(),
            patterns,
        }
    }

    fn is_config_file(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .map_or(false, |name| self.patterns.iter().any(|p| p.matches(name)))
    }

    /// Load every resource under the root.
    pub fn load(&self) -> ConfigResult<ProjectResources> {
        let mut project: Option<(ProjectConfig, PathBuf)> = None;
        let mut templates = Vec::new();
        let mut bundles = Vec::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker.filter_map(|e| e.ok()) {
            if !self.is_config_file(&entry) {
                continue;
            }
            for resource in load_file(entry.path())? {
                let kind = resource.kind().map(str::to_string);
                match kind.as_deref() {
                    Some(PROJECT_KIND) => {
                        let config_path = resource.config_path.clone().unwrap_or_default();
                        if let Some((existing, first)) = &project {
                            return Err(ConfigError::DuplicateName {
                                kind: PROJECT_KIND.to_string(),
                                name: existing.name.clone(),
                                first: first.clone(),
                                second: config_path,
                            });
                        }
                        let mut document = resource.document;
                        document.remove("kind");
                        document.remove("apiVersion");
                        let config: ProjectConfig = serde_json::from_value(Value::Object(document))?;
                        project = Some((config, config_path));
                    }
                    Some(TEMPLATE_KIND) => templates.push(resource),
                    Some(BUNDLE_KIND) => bundles.push(resource),
                    other => warn!(
                        "Skipping document with unknown kind {:?} in {:?}",
                        other,
                        resource.config_path
                    ),
                }
            }
        }

        let (project, _) = project.ok_or_else(|| ConfigError::ProjectNotFound(self.root.clone()))?;
        info!(
            "Loaded project {} ({} templates, {} bundles)",
            project.name,
            templates.len(),
            bundles.len()
        );

        Ok(ProjectResources {
            root: self.root.clone(),
            project,
            templates,
            bundles,
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with('.'))
}

/// Read every YAML document in a config file as a resource.
fn load_file(path: &Path) -> ConfigResult<Vec<Resource>> {
    debug!("Loading config file {:?}", path);
    let content = fs::read_to_string(path)?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        match Value::deserialize(document)? {
            Value::Null => continue,
            Value::Object(map) => {
                resources.push(Resource::new(&dir, map).with_config_path(path));
            }
            _ => warn!("Skipping non-mapping document in {:?}", path),
        }
    }
    Ok(resources)
}

/// A fully resolved project.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProject {
    pub templates: BTreeMap<String, BundleTemplateConfig>,
    pub bundles: Vec<BundleConfig>,
}

impl ResolvedProject {
    pub fn bundle(&self, name: &str) -> Option<&BundleConfig> {
        self.bundles.iter().find(|b| b.name == name)
    }

    /// Every module generated by every bundle.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleConfig> {
        self.bundles.iter().flat_map(|b| b.modules.iter())
    }
}

/// Resolve every template, then every bundle against them.
pub async fn resolve_project(
    resources: &ProjectResources,
    options: &ResolveOptions,
) -> ConfigResult<ResolvedProject> {
    let context = resources.context();

    let mut templates: BTreeMap<String, BundleTemplateConfig> = BTreeMap::new();
    for resource in &resources.templates {
        let template = resolve_bundle_template(resource, &context, options).await?;
        if let Some(existing) = templates.get(&template.name) {
            return Err(duplicate(TEMPLATE_KIND, &template.name, &existing.config_dir(), resource));
        }
        templates.insert(template.name.clone(), template);
    }

    let mut bundles: Vec<BundleConfig> = Vec::with_capacity(resources.bundles.len());
    for resource in &resources.bundles {
        let bundle = resolve_bundle(resource, &templates, &context, options).await?;
        if let Some(existing) = bundles.iter().find(|b| b.name == bundle.name) {
            return Err(duplicate(BUNDLE_KIND, &bundle.name, &existing.path, resource));
        }
        bundles.push(bundle);
    }

    Ok(ResolvedProject { templates, bundles })
}

fn duplicate(kind: &str, name: &str, first: &Path, second: &Resource) -> ConfigError {
    ConfigError::DuplicateName {
        kind: kind.to_string(),
        name: name.to_string(),
        first: first.to_path_buf(),
        second: second
            .config_path
            .clone()
            .unwrap_or_else(|| second.path.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_loader_requires_project() {
        let temp = tempdir().unwrap();
        let err = ProjectLoader::new(temp.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::ProjectNotFound(_)));
    }

    #[test]
    fn test_loader_dispatches_on_kind() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("project.stencil.yml"),
            "kind: Project\nname: demo\nvariables:\n  region: eu\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(
            temp.path().join("sub/all.stencil.yaml"),
            "kind: BundleTemplate\nname: tpl\n---\nkind: Bundle\nname: b\ntemplate: tpl\n---\nkind: Other\n",
        )
        .unwrap();
        fs::create_dir_all(temp.path().join(".stencil")).unwrap();
        fs::write(temp.path().join(".stencil/ignored.stencil.yml"), "kind: Bundle\nname: x\n").unwrap();
        fs::write(temp.path().join("notes.yml"), "kind: Bundle\nname: y\n").unwrap();

        let resources = ProjectLoader::new(temp.path()).load().unwrap();
        assert_eq!(resources.project.name, "demo");
        assert_eq!(resources.project.variables.get("region"), Some(&Value::from("eu")));
        assert_eq!(resources.templates.len(), 1);
        assert_eq!(resources.bundles.len(), 1);

        let bundle = &resources.bundles[0];
        assert_eq!(bundle.path, temp.path().join("sub"));
        assert_eq!(bundle.config_path, Some(temp.path().join("sub/all.stencil.yaml")));
    }

    #[test]
    fn test_loader_rejects_two_projects() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.stencil.yml"), "kind: Project\nname: a\n").unwrap();
        fs::write(temp.path().join("b.stencil.yml"), "kind: Project\nname: b\n").unwrap();

        let err = ProjectLoader::new(temp.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { .. }));
    }
}
