//! Status command handler

use anyhow::Result;
use chrono::{DateTime, Local};

use winnote_core::Store;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let document = store.manager().export_data();
    let notes = store.list_notes();
    let starred = notes.iter().filter(|n| n.starred()).count();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": store.backend(),
                    "data_dir": config.data_dir,
                    "prefix": config.prefix,
                    "data_version": document.version,
                    "auto_save": config.auto_save,
                    "counts": {
                        "notes": notes.len(),
                        "starred": starred,
                        "legacy_notes": document.notes.len(),
                        "folders": document.folders.len(),
                        "tags": document.tags.len()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", store.backend());
        }
        OutputFormat::Human => {
            println!("WinNote Status");
            println!("==============");
            println!();
            println!("Storage:");
            println!("  Backend:      {}", store.backend());
            println!("  Data dir:     {}", config.data_dir.display());
            println!("  Prefix:       {}", config.prefix);
            println!(
                "  Auto-save:    {}",
                if config.auto_save { "on" } else { "off" }
            );
            println!();
            println!("Document:");
            println!("  Version:      {}", document.version.version);
            println!(
                "  Last saved:   {}",
                format_timestamp(document.version.timestamp)
            );
            println!();
            println!("Contents:");
            println!("  Notes:        {} ({} starred)", notes.len(), starred);
            println!("  Folders:      {}", document.folders.len());
            println!("  Tags:         {}", document.tags.len());
            if !document.notes.is_empty() {
                println!();
                println!(
                    "{} note(s) are still stored inside the document. Run `winnote migrate` to move them.",
                    document.notes.len()
                );
            }
        }
    }

    Ok(())
}

/// Format epoch milliseconds in local time
fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "(unknown)".to_string())
}
