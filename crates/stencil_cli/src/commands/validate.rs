//! Validate command - Resolve every template and bundle.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::ProjectArgs;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub async fn execute(args: ValidateArgs, quiet: bool) -> Result<()> {
    info!("Validating project in {:?}", args.project.root);
    let project = args.project.resolve().await?;

    if !quiet {
        println!(
            "✅ {} templates, {} bundles, {} modules",
            project.templates.len(),
            project.bundles.len(),
            project.modules().count()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_project;
    use std::fs;
    use stencil_config::ConfigError;
    use tempfile::tempdir;

    fn args(root: &std::path::Path) -> ValidateArgs {
        ValidateArgs {
            project: ProjectArgs {
                root: root.to_path_buf(),
                concurrency: 4,
            },
        }
    }

    #[tokio::test]
    async fn test_valid_project() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        execute(args(temp.path()), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_reports_config_error() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        fs::write(
            temp.path().join("broken.stencil.yml"),
            "apiVersion: stencil/v0\nkind: Bundle\nname: other\n",
        )
        .unwrap();

        let err = execute(args(temp.path()), true).await.unwrap_err();
        let config_error = err.downcast_ref::<ConfigError>().unwrap();
        assert!(config_error.is_validation());
        assert!(format!("{:#}", err).starts_with("Failed to resolve project demo: "));
    }
}
