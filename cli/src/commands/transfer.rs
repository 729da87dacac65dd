use std::path::Path;
use std::process;

use anyhow::{Context, Result};

use carbs_core::Store;

use super::helpers::json_error;

pub(crate) fn cmd_export(store: &Store, output: Option<&Path>, json: bool) -> Result<()> {
    let document = store.export_all();

    let Some(path) = output else {
        println!("{document}");
        return Ok(());
    };

    std::fs::write(path, format!("{document}\n"))
        .with_context(|| format!("Failed to write file: {}", path.display()))?;
    let days = store.load_all().len();
    if json {
        println!(
            "{}",
            serde_json::json!({ "exported": days, "path": path.display().to_string() })
        );
    } else {
        println!("Exported {days} day(s) to {}", path.display());
    }
    Ok(())
}

pub(crate) fn cmd_import(store: &Store, path: &Path, json: bool) -> Result<()> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    if !store.import_all(&document) {
        let message = format!(
            "Could not import {}: expected a JSON object with `days` and/or `settings`",
            path.display()
        );
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    let days = store.load_all().len();
    if json {
        println!("{}", serde_json::json!({ "imported": true, "days": days }));
    } else {
        println!("Import complete.\n");
        println!("  Days stored: {days}");
    }
    Ok(())
}

pub(crate) fn cmd_backups(store: &Store, json: bool) -> Result<()> {
    let backups = store.backups();
    if json {
        println!("{}", serde_json::json!({ "backups": backups }));
    } else if backups.is_empty() {
        println!("No backups of unreadable data.");
    } else {
        for key in &backups {
            println!("{key}");
        }
    }
    Ok(())
}
