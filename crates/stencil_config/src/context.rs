//! Template string contexts.
//!
//! A context is an immutable tree of values that `${...}` expressions are
//! looked up in. Two contexts exist:
//!
//! - [`ProjectConfigContext`]: project-wide keys (`project.*`, `var.*`,
//!   `local.*`), used for strict resolution of templates and bundles.
//! - [`BundleConfigContext`]: the instantiation keys (`bundle.name`,
//!   `bundle.templateName`, `inputs.*`), used for partial resolution of the
//!   module specs of a template.

use std::path::Path;

use serde_json::{json, Map, Value};

/// A read-only source of values for template string resolution.
pub trait ConfigContext: Send + Sync {
    /// Root of the value tree. Always an object.
    fn values(&self) -> &Value;

    /// Look up a dotted key path, e.g. `["project", "name"]`.
    fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self.values(), |node, key| match node {
            Value::Object(map) => map.get(*key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Sorted top-level keys, for error messages.
    fn available_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values()
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// Project-wide context used when resolving template and bundle fields.
#[derive(Debug, Clone)]
pub struct ProjectConfigContext {
    values: Value,
}

impl ProjectConfigContext {
    /// Create a context for the named project rooted at `project_root`.
    pub fn new(project_name: impl Into<String>, project_root: &Path) -> Self {
        Self {
            values: json!({
                "project": {
                    "name": project_name.into(),
                    "root": project_root.to_string_lossy(),
                },
                "var": {},
                "local": {
                    "env": {},
                    "platform": std::env::consts::OS,
                },
            }),
        }
    }

    /// Expose project variables under `var.*`.
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.values["var"] = Value::Object(variables);
        self
    }

    /// Expose environment variables under `local.env.*`.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: Map<String, Value> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        self.values["local"]["env"] = Value::Object(env);
        self
    }

    pub fn project_name(&self) -> &str {
        self.values["project"]["name"].as_str().unwrap_or_default()
    }
}

impl ConfigContext for ProjectConfigContext {
    fn values(&self) -> &Value {
        &self.values
    }
}

/// Context available to module specs while a bundle is instantiated.
#[derive(Debug, Clone)]
pub struct BundleConfigContext {
    values: Value,
}

impl BundleConfigContext {
    pub fn new(
        bundle_name: impl Into<String>,
        template_name: impl Into<String>,
        inputs: &Map<String, Value>,
    ) -> Self {
        Self {
            values: json!({
                "bundle": {
                    "name": bundle_name.into(),
                    "templateName": template_name.into(),
                },
                "inputs": inputs,
            }),
        }
    }
}

impl ConfigContext for BundleConfigContext {
    fn values(&self) -> &Value {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_project_context_lookup() {
        let mut vars = Map::new();
        vars.insert("region".into(), json!("eu-west-1"));
        let ctx = ProjectConfigContext::new("bundles", &PathBuf::from("/project"))
            .with_variables(vars)
            .with_env([("HOME", "/home/me")]);

        assert_eq!(ctx.project_name(), "bundles");
        assert_eq!(ctx.lookup(&["project", "name"]), Some(&json!("bundles")));
        assert_eq!(ctx.lookup(&["var", "region"]), Some(&json!("eu-west-1")));
        assert_eq!(ctx.lookup(&["local", "env", "HOME"]), Some(&json!("/home/me")));
        assert_eq!(ctx.lookup(&["project", "missing"]), None);
        assert_eq!(ctx.available_keys(), vec!["local", "project", "var"]);
    }

    #[test]
    fn test_bundle_context_only_exposes_instance_keys() {
        let inputs = json!({ "foo": "bar", "list": [1, 2] });
        let ctx = BundleConfigContext::new("my-bundle", "test", inputs.as_object().unwrap());

        assert_eq!(ctx.lookup(&["bundle", "name"]), Some(&json!("my-bundle")));
        assert_eq!(ctx.lookup(&["bundle", "templateName"]), Some(&json!("test")));
        assert_eq!(ctx.lookup(&["inputs", "foo"]), Some(&json!("bar")));
        assert_eq!(ctx.lookup(&["inputs", "list", "1"]), Some(&json!(2)));
        assert_eq!(ctx.lookup(&["project", "name"]), None);
        assert_eq!(ctx.available_keys(), vec!["bundle", "inputs"]);
    }
}
