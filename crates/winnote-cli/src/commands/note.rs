//! Note command handlers

use anyhow::{anyhow, bail, Context, Result};

use winnote_core::text::{derive_snippet, derive_title};
use winnote_core::{generate_id, IdKind, Note, NoteMetadata, Store};

use crate::commands::confirm;
use crate::output::Output;

/// Create a new note
pub async fn create(
    store: &Store,
    title: Option<String>,
    content: Option<String>,
    tags: Vec<String>,
    folder: Option<String>,
    output: &Output,
) -> Result<()> {
    let content = content.unwrap_or_default();
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            if content.trim().is_empty() {
                bail!("A note needs a title or some content");
            }
            derive_title(&content)
        }
    };

    let mut note = Note::new(generate_id(IdKind::Note), title);
    if !content.is_empty() {
        note.snippet = Some(derive_snippet(&content));
        note.content = Some(content);
    }
    if !tags.is_empty() {
        note.tags = Some(tags);
    }
    note.folder_id = folder;

    store.save_note(&note).await?;

    if output.is_quiet() {
        println!("{}", note.id);
    } else if output.is_json() {
        output.print_note(&note);
    } else {
        output.success(&format!("Created note: {} ({})", note.title, note.id));
    }

    Ok(())
}

/// List notes, optionally filtered
pub fn list(
    store: &Store,
    tag: Option<String>,
    folder: Option<String>,
    starred: bool,
    output: &Output,
) -> Result<()> {
    let notes = filter_notes(store.list_notes(), tag.as_deref(), folder.as_deref(), starred);
    output.print_notes(&notes);
    Ok(())
}

/// Show a note with its content
pub async fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id)?;
    let note = store
        .get_note(&id)
        .await?
        .ok_or_else(|| anyhow!("Note not found: {}", id))?;

    output.print_note(&note);
    Ok(())
}

/// Edit a note's title, content or star
pub async fn edit(
    store: &Store,
    id: String,
    title: Option<String>,
    content: Option<String>,
    starred: Option<bool>,
    output: &Output,
) -> Result<()> {
    if title.is_none() && content.is_none() && starred.is_none() {
        bail!("Nothing to change. Pass --title, --content, --star or --unstar.");
    }

    let id = resolve_id(store, &id)?;
    let mut meta = store
        .notes()
        .get_metadata(&id)
        .ok_or_else(|| anyhow!("Note not found: {}", id))?;

    if let Some(title) = title {
        meta.title = title;
    }
    if let Some(ref content) = content {
        meta.snippet = (!content.is_empty()).then(|| derive_snippet(content));
    }
    if let Some(starred) = starred {
        meta.is_starred = Some(starred);
    }
    meta.touch();

    store
        .notes()
        .save_note_metadata(meta)
        .await
        .context("Failed to save note")?;
    // Written even when empty so clearing a body sticks
    if let Some(content) = content {
        store
            .notes()
            .save_note_content(&id, &content)
            .await
            .context("Failed to save note content")?;
    }

    output.success(&format!("Updated note: {}", id));
    Ok(())
}

/// Delete a note
pub async fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let id = resolve_id(store, &id)?;
    let meta = store
        .notes()
        .get_metadata(&id)
        .ok_or_else(|| anyhow!("Note not found: {}", id))?;

    if output.should_prompt() {
        println!("Delete note: {} - {}", meta.id, meta.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete_note(&id).await?;
    output.success(&format!("Deleted note: {}", id));
    Ok(())
}

fn filter_notes(
    notes: Vec<NoteMetadata>,
    tag: Option<&str>,
    folder: Option<&str>,
    starred: bool,
) -> Vec<NoteMetadata> {
    notes
        .into_iter()
        .filter(|n| tag.map_or(true, |t| n.has_tag(t)))
        .filter(|n| folder.map_or(true, |f| n.folder_id.as_deref() == Some(f)))
        .filter(|n| !starred || n.starred())
        .collect()
}

/// Resolve a full note ID or a unique prefix of one
fn resolve_id(store: &Store, id: &str) -> Result<String> {
    let ids: Vec<String> = store.list_notes().into_iter().map(|n| n.id).collect();
    match_id(&ids, id)
}

fn match_id(ids: &[String], id: &str) -> Result<String> {
    if ids.iter().any(|known| known == id) {
        return Ok(id.to_string());
    }

    let matches: Vec<&String> = ids.iter().filter(|known| known.starts_with(id)).collect();
    match matches.as_slice() {
        [] => bail!("Note not found: {}", id),
        [only] => Ok((*only).clone()),
        _ => bail!(
            "Ambiguous note ID '{}' matches {} notes. Use more characters.",
            id,
            matches.len()
        ),
    }
}
