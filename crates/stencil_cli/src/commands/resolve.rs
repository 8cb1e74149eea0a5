//! Resolve command - Print resolved bundles and their modules.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;

use stencil_config::{BundleConfig, ResolvedProject};

use super::{CliError, ProjectArgs};

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Only print this bundle
    #[arg(short, long)]
    pub bundle: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

pub async fn execute(args: ResolveArgs) -> Result<()> {
    let project = args.project.resolve().await?;
    println!("{}", render(&project, args.bundle.as_deref(), args.format)?);
    Ok(())
}

fn render(project: &ResolvedProject, bundle: Option<&str>, format: OutputFormat) -> Result<String> {
    match bundle {
        Some(name) => {
            let bundle = project.bundle(name).ok_or_else(|| CliError::BundleNotFound {
                name: name.to_string(),
                available: project.bundles.iter().map(|b| b.name.clone()).collect(),
            })?;
            serialize(bundle, format)
        }
        None => serialize::<[BundleConfig]>(&project.bundles, format),
    }
}

fn serialize<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_project;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_render_all_bundles_as_json() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let project = super::super::resolve_root(temp.path(), 2).await.unwrap();

        let output = render(&project, None, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["name"], "web");
        assert_eq!(value[0]["modules"][0]["name"], "web-app");
        assert_eq!(value[0]["modules"][0]["bundleName"], "web");
    }

    #[tokio::test]
    async fn test_render_single_bundle_as_yaml() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let project = super::super::resolve_root(temp.path(), 2).await.unwrap();

        let output = render(&project, Some("web"), OutputFormat::Yaml).unwrap();
        assert!(output.contains("name: web-app"));
    }

    #[tokio::test]
    async fn test_unknown_bundle() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let project = super::super::resolve_root(temp.path(), 2).await.unwrap();

        let err = render(&project, Some("nope"), OutputFormat::Json).unwrap_err();
        assert_eq!(err.to_string(), "Bundle nope not found. Available bundles: web");
        assert!(err.downcast_ref::<CliError>().is_some());
    }
}
