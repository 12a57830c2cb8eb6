use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::tree_store::TreeStore;
use crate::model::config::GridConfig;

/// Infer a workspace name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if dir.join(CONFIG_FILE).exists() && !args.force {
        return Err(format!("workspace already exists: {}", dir.join(CONFIG_FILE).display()).into());
    }

    // Nested workspaces are allowed, but worth a note
    if let Some(parent) = dir.parent()
        && let Ok(parent_root) = config_io::discover_workspace(parent)
    {
        eprintln!("Note: parent workspace found at {}/", parent_root.display());
    }

    let name = args.name.unwrap_or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .unwrap_or_else(|| "Untitled".to_string())
    });

    let mut config = GridConfig::default();
    config.project.name = name.clone();
    config_io::write_config(dir, &config)?;

    let tree_path = config_io::tree_path(dir, &config);
    if args.force || !tree_path.exists() {
        TreeStore::create(&tree_path)?;
    }

    println!("Initialized treegrid workspace: {}", name);
    Ok(())
}
