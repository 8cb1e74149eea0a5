//! # stencil_config
//!
//! Bundle templates and bundles for stencil.
//!
//! A `BundleTemplate` declares a parametric set of modules together with a
//! JSON schema for its inputs. A `Bundle` instantiates a template with
//! concrete inputs and receives a list of fully prepared module configs.
//!
//! Resolution happens in two phases:
//!
//! - [`resolve_bundle_template`] resolves `${...}` strings in every template
//!   field except `modules` against the project context, validates the
//!   template and compiles its inputs schema.
//! - [`resolve_bundle`] resolves and validates the bundle, validates its
//!   inputs against the referenced template's schema and materializes each
//!   module spec, leaving references it cannot resolve yet in place.
//!
//! ## Example
//!
//! ```rust,no_run
//! use stencil_config::{resolve_project, ProjectLoader, ResolveOptions};
//!
//! # async fn run() -> stencil_config::ConfigResult<()> {
//! let resources = ProjectLoader::new("my-project").load()?;
//! let options = ResolveOptions::new("my-project").with_concurrency(8);
//! let project = resolve_project(&resources, &options).await?;
//!
//! for module in project.modules() {
//!     println!("{} ({})", module.name, module.module_type);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod context;
pub mod error;
pub mod module;
pub mod options;
pub mod paths;
pub mod project;
pub mod resource;
pub mod schema;
pub mod template;
pub mod template_string;

pub use bundle::{resolve_bundle, BundleConfig, BundleResolveStage};
pub use context::{BundleConfigContext, ConfigContext, ProjectConfigContext};
pub use error::{ConfigError, ConfigResult, SchemaFileCause};
pub use module::{
    prepare_module_resource, BuildConfig, BuildDependency, CopySpec, GenerateFileSpec,
    ModuleConfig,
};
pub use options::{ResolveOptions, DEFAULT_CONCURRENCY};
pub use project::{
    resolve_project, ProjectConfig, ProjectLoader, ProjectResources, ResolvedProject,
};
pub use resource::Resource;
pub use schema::{InputsSchema, Schema, API_VERSION, BUNDLE_KIND, MODULE_KIND, TEMPLATE_KIND};
pub use template::{resolve_bundle_template, BundleTemplateConfig};
pub use template_string::{resolve_template_string, resolve_template_strings, ResolveMode};
