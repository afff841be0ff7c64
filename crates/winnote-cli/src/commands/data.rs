//! Whole-store command handlers: export, import, clean, migrate, clear

use std::path::Path;

use anyhow::{bail, Context, Result};

use winnote_core::{ImportBundle, Store};

use crate::commands::confirm;
use crate::output::{Output, OutputFormat};

/// Export the document and every note
pub async fn export(store: &Store, path: Option<&Path>, output: &Output) -> Result<()> {
    let bundle = store.export().await?;
    let json = serde_json::to_string_pretty(&bundle).context("Failed to serialize export")?;

    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write export file: {:?}", path))?;
            output.success(&format!(
                "Exported {} note(s) to {}",
                bundle.notes.len(),
                path.display()
            ));
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Import an export bundle or a bare document
pub async fn import(store: &Store, path: &Path, output: &Output) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {:?}", path))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {:?}", path))?;

    let bundle = ImportBundle::from_value(value)?;
    let note_count = bundle.notes.len();
    store.import(bundle).await?;

    output.success(&format!(
        "Imported {} from {}",
        if note_count == 1 {
            "1 note".to_string()
        } else {
            format!("{} notes", note_count)
        },
        path.display()
    ));
    Ok(())
}

/// Repair invalid records and dangling references
pub async fn clean(store: &Store, output: &Output) -> Result<()> {
    let report = store.clean().await?;

    match output.format {
        OutputFormat::Json => output.print_json(&report),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if !report.cleaned() {
                println!("No problems found.");
                return Ok(());
            }
            output.print_list("Issues", &report.issues);
            output.print_list("Fixed", &report.fixed);
        }
    }

    Ok(())
}

/// Move legacy notes out of the document
pub async fn migrate(store: &Store, output: &Output) -> Result<()> {
    let report = store.migrate_legacy_notes().await?;

    match output.format {
        OutputFormat::Json => output.print_json(&report),
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            if report.moved.is_empty() && report.duplicates.is_empty() && report.unreadable.is_empty()
            {
                println!("Nothing to migrate.");
                return Ok(());
            }
            output.success(&format!("Moved {} note(s)", report.moved.len()));
            output.print_list("Dropped (already migrated)", &report.duplicates);
            output.print_list("Left in place (unreadable)", &report.unreadable);
        }
    }

    Ok(())
}

/// Remove all stored data
pub async fn clear(store: &Store, yes: bool, output: &Output) -> Result<()> {
    if !yes {
        if !output.should_prompt() {
            bail!("Refusing to clear storage without --yes");
        }
        println!(
            "This removes every note and all application data from {}.",
            store.config().data_dir.display()
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.clear().await?;
    output.success("Cleared all stored data");
    Ok(())
}
