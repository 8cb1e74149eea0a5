//! Templates command - List bundle templates.

use anyhow::Result;
use clap::Args;

use stencil_config::ResolvedProject;

use super::ProjectArgs;

#[derive(Args)]
pub struct TemplatesArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

pub async fn execute(args: TemplatesArgs) -> Result<()> {
    let project = args.project.resolve().await?;
    print!("{}", render(&project)?);
    Ok(())
}

fn render(project: &ResolvedProject) -> Result<String> {
    if project.templates.is_empty() {
        return Ok("No bundle templates found\n".to_string());
    }

    let mut out = String::new();
    for template in project.templates.values() {
        let location = template
            .config_path
            .as_deref()
            .unwrap_or(template.path.as_path())
            .display();
        out.push_str(&format!(
            "{} ({} modules) - {}\n",
            template.name,
            template.modules.len(),
            location
        ));
        out.push_str(&format!(
            "  inputs: {}\n",
            serde_json::to_string(template.inputs_schema.as_value())?
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_project;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_lists_templates() {
        let temp = tempdir().unwrap();
        write_project(temp.path());
        let project = super::super::resolve_root(temp.path(), 1).await.unwrap();

        let output = render(&project).unwrap();
        assert!(output.starts_with("service (1 modules) - "));
        assert!(output.contains(r#""type":"object""#));
    }
}
