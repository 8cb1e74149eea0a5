//! CLI command definitions.
//!
//! Every command loads the project under `--root`, resolves it and reports
//! on the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use stencil_config::{
    resolve_project, ProjectLoader, ResolveOptions, ResolvedProject, DEFAULT_CONCURRENCY,
};

pub mod resolve;
pub mod templates;
pub mod validate;

/// stencil - Bundle templates for project configuration
#[derive(Parser)]
#[command(name = "stencil")]
#[command(version, about = "stencil - Bundle templates for project configuration")]
#[command(long_about = r#"
stencil resolves bundle templates and the bundles that instantiate them into
a flat list of module configs.

COMMANDS:
  resolve    → Resolve the project and print bundles with their modules
  templates  → List bundle templates and their inputs schemas
  validate   → Resolve everything and report the first error

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve bundles and print their modules
    Resolve(resolve::ResolveArgs),

    /// List bundle templates
    Templates(templates::TemplatesArgs),

    /// Validate all templates and bundles
    Validate(validate::ValidateArgs),
}

/// Arguments shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(long, default_value = ".", env = "STENCIL_ROOT")]
    pub root: PathBuf,

    /// Maximum number of modules materialized concurrently per bundle
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

/// Errors in how the CLI was invoked.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Bundle {name} not found. Available bundles: {}", available.join(", "))]
    BundleNotFound { name: String, available: Vec<String> },
}

impl ProjectArgs {
    /// Load and resolve the project.
    pub async fn resolve(&self) -> Result<ResolvedProject> {
        resolve_root(&self.root, self.concurrency).await
    }
}

async fn resolve_root(root: &Path, concurrency: usize) -> Result<ResolvedProject> {
    info!("Loading project from {:?}", root);
    let resources = ProjectLoader::new(root)
        .load()
        .with_context(|| format!("Failed to load project from {}", root.display()))?;

    let options = ResolveOptions::new(root).with_concurrency(concurrency);
    let project = resolve_project(&resources, &options)
        .await
        .with_context(|| format!("Failed to resolve project {}", resources.project.name))?;
    Ok(project)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_args() {
        let cli = Cli::try_parse_from([
            "stencil",
            "resolve",
            "--root",
            "proj",
            "--bundle",
            "web",
            "--concurrency",
            "4",
            "--format",
            "yaml",
        ])
        .unwrap();
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.project.root, PathBuf::from("proj"));
                assert_eq!(args.project.concurrency, 4);
                assert_eq!(args.bundle.as_deref(), Some("web"));
                assert_eq!(args.format, resolve::OutputFormat::Yaml);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["stencil", "validate", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(!cli.verbose);

        assert!(Cli::try_parse_from(["stencil", "-v", "-q", "validate"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["stencil", "templates"]).unwrap();
        match cli.command {
            Commands::Templates(args) => {
                assert_eq!(args.project.concurrency, DEFAULT_CONCURRENCY);
            }
            _ => panic!("expected templates"),
        }
    }
}
