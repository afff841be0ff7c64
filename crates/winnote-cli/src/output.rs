//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;

use winnote_core::{Note, NoteMetadata};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        matches!(self.format, OutputFormat::Human)
    }

    /// Print any serializable value as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to format output: {}", e),
        }
    }

    /// Print a single note with its content
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:      {}", note.id);
                println!("Title:   {}", note.title);
                if let Some(ref updated) = note.updated_at {
                    println!("Updated: {}", updated);
                }
                if let Some(ref folder) = note.folder_id {
                    println!("Folder:  {}", folder);
                }
                if let Some(ref tags) = note.tags {
                    if !tags.is_empty() {
                        println!("Tags:    {}", tags.join(", "));
                    }
                }
                if note.is_starred.unwrap_or(false) {
                    println!("Starred: yes");
                }

                let content = note.content.as_deref().unwrap_or("");
                if !content.is_empty() {
                    println!();
                    println!("{}", content);
                }
            }
            OutputFormat::Json => self.print_json(note),
            OutputFormat::Quiet => {
                println!("{}", note.id);
            }
        }
    }

    /// Print a list of note metadata
    pub fn print_notes(&self, notes: &[NoteMetadata]) {
        match self.format {
            OutputFormat::Human => {
                if notes.is_empty() {
                    println!("No notes found.");
                    return;
                }
                for meta in notes {
                    let star = if meta.starred() { "*" } else { " " };
                    println!(
                        "{} {} | {} | {}",
                        star,
                        meta.id,
                        meta.updated_at,
                        truncate(&meta.title, 50)
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => self.print_json(notes),
            OutputFormat::Quiet => {
                for meta in notes {
                    println!("{}", meta.id);
                }
            }
        }
    }

    /// Print a list of findings under a heading
    pub fn print_list(&self, heading: &str, items: &[String]) {
        if self.format != OutputFormat::Human || items.is_empty() {
            return;
        }
        println!("{}:", heading);
        for item in items {
            println!("  - {}", item);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Truncate a string to max characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
