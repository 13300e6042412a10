//! CLI route: dispatches parsed commands to the store and renderers.

use crate::cli::parse::{Commands, ShowFormat};
use crate::error::{ApiError, StoreError};
use crate::render;
use crate::state::{LoadMode, StateAccess, StateStore};
use crate::store::path::NamespacePath;
use std::path::Path;
use tracing::debug;

/// Run one command and return its stdout text.
pub fn execute(command: &Commands, color: bool) -> Result<String, ApiError> {
    match command {
        Commands::Show { file, path, format } => show(file, path.as_deref(), *format, color),
        Commands::Get { file, path, pretty } => get(file, path, *pretty),
        Commands::Keys { file, prefix } => keys(file, prefix.as_deref()),
    }
}

fn open(file: &Path) -> Result<StateStore, ApiError> {
    debug!(file = %file.display(), "Opening state file");
    Ok(StateStore::open(file, LoadMode::Require)?)
}

fn show(file: &Path, path: Option<&str>, format: ShowFormat, color: bool) -> Result<String, ApiError> {
    let mut tree = open(file)?.snapshot()?;
    if let Some(path) = path {
        tree = tree.subtree(&NamespacePath::parse(path)?)?;
    }
    let rendered = match format {
        ShowFormat::Tree => {
            let title = path.map_or_else(|| file.display().to_string(), str::to_string);
            format!(
                "{}\n{}",
                render::format_section_heading(&title, color),
                render::render_tree(&tree, color)
            )
        }
        ShowFormat::Table => render::render_leaf_table(&tree),
        ShowFormat::Json => to_json_text(&render::tree_to_json(&tree), true)?,
    };
    Ok(rendered.trim_end().to_string())
}

fn get(file: &Path, path: &str, pretty: bool) -> Result<String, ApiError> {
    let value = open(file)?.get(path)?;
    to_json_text(&value.to_json(), pretty)
}

fn keys(file: &Path, prefix: Option<&str>) -> Result<String, ApiError> {
    let store = open(file)?;
    let prefix = prefix.map(NamespacePath::parse).transpose()?;
    let keys: Vec<String> = store
        .snapshot()?
        .leaves()
        .into_iter()
        .filter(|(path, _)| prefix.as_ref().map_or(true, |p| path.starts_with(p)))
        .map(|(path, _)| path.to_string())
        .collect();
    Ok(keys.join("\n"))
}

fn to_json_text(json: &serde_json::Value, pretty: bool) -> Result<String, ApiError> {
    let text = if pretty {
        serde_json::to_string_pretty(json)
    } else {
        serde_json::to_string(json)
    };
    text.map_err(|e| ApiError::Store(StoreError::Conversion(e.to_string())))
}
