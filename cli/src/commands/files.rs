//! `berth update-files`: replace workspace files of a running agent.

use anyhow::{Context, Result};
use berth_common::FileSpec;
use clap::Args;

use crate::app::AppContext;

/// Arguments for the update-files command.
#[derive(Args)]
pub struct UpdateFilesArgs {
    /// Agent id
    pub agent_id: String,

    /// File to write, as `<path in workspace>=<local file>` (repeatable)
    #[arg(long = "file", value_name = "DEST=LOCAL", required = true)]
    pub files: Vec<String>,
}

/// Run `berth update-files`. The runtime is not restarted.
///
/// # Errors
///
/// Returns an error if a `--file` argument is malformed or unreadable, a
/// destination path is unsafe, or the agent has no workspace.
pub async fn run(app: &AppContext, args: &UpdateFilesArgs) -> Result<()> {
    let files = args
        .files
        .iter()
        .map(|arg| load_file_arg(arg))
        .collect::<Result<Vec<_>>>()?;
    let controller = app.controller()?;
    controller.update_files(&args.agent_id, &files).await?;

    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    app.renderer().render_files_updated(&args.agent_id, &paths)
}

/// Split `dest=local` and read the local file.
///
/// # Errors
///
/// Returns an error if there is no `=`, either side is empty, or the local
/// file cannot be read as UTF-8.
pub fn load_file_arg(arg: &str) -> Result<FileSpec> {
    let (dest, local) = parse_file_arg(arg)?;
    let content = std::fs::read_to_string(local)
        .with_context(|| format!("cannot read {local}"))?;
    Ok(FileSpec::new(dest, content))
}

fn parse_file_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('=') {
        Some((dest, local)) if !dest.is_empty() && !local.is_empty() => Ok((dest, local)),
        _ => anyhow::bail!("invalid --file '{arg}': expected <dest>=<local file>"),
    }
}
