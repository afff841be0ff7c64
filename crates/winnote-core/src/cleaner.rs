//! Repair of drifted or invalid stored data
//!
//! Records in the document sections are untyped JSON, so over time they can
//! lose required fields, disagree with their map key, or point at folders
//! and tags that no longer exist. The cleaner fixes what it can and drops
//! what it cannot, reporting both.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::manager::StorageManager;
use crate::models::{today, NoteMetadata, Section, StoredDocument};
use crate::storage::StorageResult;

/// What a cleaning pass found and changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub issues: Vec<String>,
    pub fixed: Vec<String>,
}

impl CleanReport {
    /// Whether any problem was found
    pub fn cleaned(&self) -> bool {
        !self.issues.is_empty()
    }

    fn found(&mut self, issue: String, fix: String) {
        self.issues.push(issue);
        self.fixed.push(fix);
    }

    fn merge(&mut self, other: CleanReport) {
        self.issues.extend(other.issues);
        self.fixed.extend(other.fixed);
    }
}

/// Clean the manager's document and save it when anything was fixed
pub async fn clean_storage(manager: &StorageManager) -> StorageResult<CleanReport> {
    let mut report = manager.mutate(clean_document);

    if !report.fixed.is_empty() {
        manager.save().await?;
        report.fixed.push("Saved cleaned data".to_string());
        info!("Cleaned stored data ({} issue(s))", report.issues.len());
    }
    Ok(report)
}

/// Repair a document in place
pub fn clean_document(doc: &mut StoredDocument) -> CleanReport {
    let mut report = CleanReport::default();
    report.merge(clean_notes(&mut doc.notes));
    report.merge(clean_folders(&mut doc.folders));
    report.merge(clean_tags(&mut doc.tags));
    report.merge(clean_orphans(&mut doc.notes, &doc.folders, &doc.tags));
    report
}

/// Repair split-path note metadata against the document's folders and tags
pub fn clean_metadata(
    metadata: &mut BTreeMap<String, NoteMetadata>,
    folders: &Section,
    tags: &Section,
) -> CleanReport {
    let mut report = CleanReport::default();

    for (id, meta) in metadata.iter_mut() {
        if meta.id != *id {
            report.found(
                format!("Note {} has mismatched id", id),
                format!("Fixed note id: {}", id),
            );
            meta.id = id.clone();
        }

        if !is_valid_date(&meta.updated_at) {
            report.found(
                format!("Note {} has an invalid date", id),
                format!("Fixed note date: {}", id),
            );
            meta.updated_at = today();
        }

        if let Some(note_tags) = meta.tags.as_mut() {
            let before = note_tags.len();
            note_tags.retain(|tag| tags.contains_key(tag));
            if note_tags.len() != before {
                report.found(
                    format!("Note {} references missing tags", id),
                    format!("Removed missing tag references from note {}", id),
                );
            }
        }

        if let Some(folder) = meta.folder_id.as_deref() {
            if !folders.contains_key(folder) {
                report.found(
                    format!("Note {} references missing folder {}", id, folder),
                    format!("Removed missing folder reference from note {}", id),
                );
                meta.folder_id = None;
            }
        }
    }

    report
}

fn clean_notes(notes: &mut Section) -> CleanReport {
    let mut report = CleanReport::default();

    let ids: Vec<String> = notes.keys().cloned().collect();
    for id in ids {
        let Some(record) = notes.get_mut(&id).and_then(Value::as_object_mut) else {
            drop_invalid(notes, &id, "Note", &mut report);
            continue;
        };
        if !has_text(record, "id") || !has_text(record, "title") {
            drop_invalid(notes, &id, "Note", &mut report);
            continue;
        }

        fix_id(record, &id, "note", &mut report);

        let bad_date = record
            .get("updatedAt")
            .is_some_and(|v| !v.as_str().is_some_and(is_valid_date));
        if bad_date {
            report.found(
                format!("Note {} has an invalid date", id),
                format!("Fixed note date: {}", id),
            );
            record.insert("updatedAt".into(), Value::String(today()));
        }

        let bad_tags = record.get("tags").is_some_and(|v| !v.is_array());
        if bad_tags {
            report.found(
                format!("Note {} has malformed tags", id),
                format!("Fixed note tags: {}", id),
            );
            record.insert("tags".into(), Value::Array(Vec::new()));
        }
    }

    report
}

fn clean_folders(folders: &mut Section) -> CleanReport {
    let mut report = CleanReport::default();

    let ids: Vec<String> = folders.keys().cloned().collect();
    for id in ids {
        let Some(record) = folders.get_mut(&id).and_then(Value::as_object_mut) else {
            drop_invalid(folders, &id, "Folder", &mut report);
            continue;
        };
        if !has_text(record, "id") || !has_text(record, "label") {
            drop_invalid(folders, &id, "Folder", &mut report);
            continue;
        }

        fix_id(record, &id, "folder", &mut report);

        if let Some(children) = record.get_mut("children") {
            let before = children.as_array().map_or(0, Vec::len);
            let valid: Vec<Value> = children
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter(|child| {
                            child
                                .as_object()
                                .is_some_and(|c| has_text(c, "id") && has_text(c, "label"))
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if !children.is_array() || valid.len() != before {
                report.found(
                    format!("Folder {} has invalid children", id),
                    format!("Removed invalid children of folder {}", id),
                );
                *children = Value::Array(valid);
            }
        }
    }

    report
}

fn clean_tags(tags: &mut Section) -> CleanReport {
    let mut report = CleanReport::default();

    let ids: Vec<String> = tags.keys().cloned().collect();
    for id in ids {
        let Some(record) = tags.get_mut(&id).and_then(Value::as_object_mut) else {
            drop_invalid(tags, &id, "Tag", &mut report);
            continue;
        };
        if !has_text(record, "id") || !has_text(record, "label") {
            drop_invalid(tags, &id, "Tag", &mut report);
            continue;
        }

        fix_id(record, &id, "tag", &mut report);

        let bad_count = record
            .get("count")
            .is_some_and(|v| !v.as_f64().is_some_and(|n| n >= 0.0));
        if bad_count {
            report.found(
                format!("Tag {} has an invalid count", id),
                format!("Fixed tag count: {}", id),
            );
            record.insert("count".into(), Value::from(0));
        }
    }

    report
}

/// Drop note references to tags and folders that do not exist
fn clean_orphans(notes: &mut Section, folders: &Section, tags: &Section) -> CleanReport {
    let mut report = CleanReport::default();
    let tag_ids: HashSet<&str> = tags.keys().map(String::as_str).collect();

    for (id, note) in notes.iter_mut() {
        let Some(record) = note.as_object_mut() else {
            continue;
        };

        if let Some(Value::Array(note_tags)) = record.get_mut("tags") {
            let before = note_tags.len();
            note_tags.retain(|tag| tag.as_str().is_some_and(|t| tag_ids.contains(t)));
            if note_tags.len() != before {
                report.found(
                    format!("Note {} references missing tags", id),
                    format!("Removed missing tag references from note {}", id),
                );
            }
        }

        let missing_folder = match record.get("folderId") {
            Some(Value::String(folder)) => !folder.is_empty() && !folders.contains_key(folder),
            _ => false,
        };
        if missing_folder {
            report.found(
                format!("Note {} references a missing folder", id),
                format!("Removed missing folder reference from note {}", id),
            );
            record.remove("folderId");
        }
    }

    report
}

fn drop_invalid(section: &mut Section, id: &str, label: &str, report: &mut CleanReport) {
    section.remove(id);
    report.found(
        format!("{} {} is missing required fields", label, id),
        format!("Removed invalid {}: {}", label.to_lowercase(), id),
    );
}

fn fix_id(record: &mut Map<String, Value>, id: &str, label: &str, report: &mut CleanReport) {
    if record.get("id").and_then(Value::as_str) != Some(id) {
        report.found(
            format!("{} {} has mismatched id", label, id),
            format!("Fixed {} id: {}", label, id),
        );
        record.insert("id".into(), Value::String(id.to_string()));
    }
}

fn has_text(record: &Map<String, Value>, field: &str) -> bool {
    record
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

/// `YYYY-MM-DD` and a real calendar date
fn is_valid_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit())
        && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::StorageConfig;
    use crate::test_support::CountingAdapter;
    use serde_json::json;

    fn section(entries: Value) -> Section {
        entries.as_object().cloned().unwrap()
    }

    fn document() -> StoredDocument {
        let mut doc = StoredDocument::new("1.0.0");
        doc.folders = section(json!({
            "f1": {"id": "f1", "label": "Work"}
        }));
        doc.tags = section(json!({
            "t1": {"id": "t1", "label": "urgent", "count": 2}
        }));
        doc.notes = section(json!({
            "n1": {"id": "n1", "title": "Fine", "updatedAt": "2025-03-01", "tags": ["t1"], "folderId": "f1"}
        }));
        doc
    }

    #[test]
    fn test_clean_document_is_untouched() {
        let mut doc = document();
        let before = doc.clone();

        let report = clean_document(&mut doc);

        assert!(!report.cleaned());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_drops_records_missing_fields() {
        let mut doc = document();
        doc.notes.insert("n2".into(), json!({"id": "n2"}));
        doc.folders.insert("f2".into(), json!("not an object"));
        doc.tags.insert("t2".into(), json!({"id": "t2", "label": ""}));

        let report = clean_document(&mut doc);

        assert!(!doc.notes.contains_key("n2"));
        assert!(!doc.folders.contains_key("f2"));
        assert!(!doc.tags.contains_key("t2"));
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_fixes_id_drift_and_bad_fields() {
        let mut doc = document();
        doc.notes.insert(
            "n3".into(),
            json!({"id": "other", "title": "Drifted", "updatedAt": "March 1st", "tags": "t1"}),
        );
        doc.tags.insert("t3".into(), json!({"id": "t3", "label": "x", "count": -4}));

        let report = clean_document(&mut doc);

        let note = &doc.notes["n3"];
        assert_eq!(note["id"], "n3");
        assert_eq!(note["updatedAt"], today());
        assert_eq!(note["tags"], json!([]));
        assert_eq!(doc.tags["t3"]["count"], 0);
        assert_eq!(report.fixed.len(), report.issues.len());
    }

    #[test]
    fn test_removes_dangling_references() {
        let mut doc = document();
        doc.notes.insert(
            "n4".into(),
            json!({"id": "n4", "title": "Orphan", "tags": ["t1", "gone", 7], "folderId": "nowhere"}),
        );

        clean_document(&mut doc);

        let note = &doc.notes["n4"];
        assert_eq!(note["tags"], json!(["t1"]));
        assert!(note.get("folderId").is_none());
    }

    #[test]
    fn test_filters_invalid_children() {
        let mut doc = document();
        doc.folders.insert(
            "f2".into(),
            json!({"id": "f2", "label": "Parent", "children": [
                {"id": "c1", "label": "Child"},
                {"id": "c2"},
                "junk"
            ]}),
        );

        let report = clean_document(&mut doc);

        assert_eq!(doc.folders["f2"]["children"].as_array().unwrap().len(), 1);
        assert!(report.cleaned());
    }

    #[test]
    fn test_clean_metadata() {
        let doc = document();
        let mut meta = NoteMetadata::new("n1", "Split");
        meta.updated_at = "2025-02-30".into();
        meta.tags = Some(vec!["t1".into(), "gone".into()]);
        meta.folder_id = Some("nowhere".into());
        let mut metadata = BTreeMap::from([("n1".to_string(), meta)]);

        let report = clean_metadata(&mut metadata, &doc.folders, &doc.tags);

        let meta = &metadata["n1"];
        assert_eq!(meta.updated_at, today());
        assert_eq!(meta.tags.as_deref(), Some(&["t1".to_string()][..]));
        assert!(meta.folder_id.is_none());
        assert_eq!(report.issues.len(), 3);
    }

    #[test]
    fn test_date_validation() {
        assert!(is_valid_date("2024-02-29"));
        assert!(!is_valid_date("2023-02-29"));
        assert!(!is_valid_date("2024-2-29"));
        assert!(!is_valid_date("2024-02-29T10:00:00Z"));
    }

    #[tokio::test]
    async fn test_clean_storage_saves_only_when_fixed() {
        let adapter = CountingAdapter::in_memory();
        let manager = StorageManager::new(StorageConfig::new(adapter.clone()));
        manager.mutate(|doc| *doc = document());

        let report = clean_storage(&manager).await.unwrap();
        assert!(report.fixed.is_empty());
        assert_eq!(adapter.writes(), 0);

        manager.mutate(|doc| doc.notes.insert("bad".into(), json!({})));
        let report = clean_storage(&manager).await.unwrap();
        assert_eq!(adapter.writes(), 1);
        assert_eq!(report.fixed.last().map(String::as_str), Some("Saved cleaned data"));
    }
}
