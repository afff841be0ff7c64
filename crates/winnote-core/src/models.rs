//! Data models for WinNote
//!
//! - `StoredDocument`: the single persisted root holding every section
//! - `NoteMetadata`: the small, always-resident part of a note
//! - `Note`: metadata plus the optional body, as callers handle it
//!
//! Field names serialize in camelCase so stored documents keep the layout
//! the application has always written.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default data version stamped on new documents
pub const DEFAULT_DATA_VERSION: &str = "1.0.0";

/// One section of the document: record id to arbitrary JSON record
pub type Section = Map<String, Value>;

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's date as `YYYY-MM-DD`
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Version stamp of a stored document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataVersion {
    /// Data format version (stored, not used for migration)
    pub version: String,
    /// Last save time, epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl DataVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            timestamp: now_millis(),
            checksum: None,
        }
    }
}

/// The sections of a document that hold records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Notes,
    Folders,
    Tags,
    Settings,
    State,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Notes,
        SectionKind::Folders,
        SectionKind::Tags,
        SectionKind::Settings,
        SectionKind::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Notes => "notes",
            SectionKind::Folders => "folders",
            SectionKind::Tags => "tags",
            SectionKind::Settings => "settings",
            SectionKind::State => "state",
        }
    }
}

/// The persisted application document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub version: DataVersion,
    #[serde(default)]
    pub notes: Section,
    #[serde(default)]
    pub folders: Section,
    #[serde(default)]
    pub tags: Section,
    #[serde(default)]
    pub settings: Section,
    #[serde(default)]
    pub state: Section,
}

impl Default for StoredDocument {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_VERSION)
    }
}

impl StoredDocument {
    /// Create an empty document stamped with `version`
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: DataVersion::new(version),
            notes: Section::new(),
            folders: Section::new(),
            tags: Section::new(),
            settings: Section::new(),
            state: Section::new(),
        }
    }

    /// Borrow a section
    pub fn section(&self, kind: SectionKind) -> &Section {
        match kind {
            SectionKind::Notes => &self.notes,
            SectionKind::Folders => &self.folders,
            SectionKind::Tags => &self.tags,
            SectionKind::Settings => &self.settings,
            SectionKind::State => &self.state,
        }
    }

    /// Mutably borrow a section
    pub fn section_mut(&mut self, kind: SectionKind) -> &mut Section {
        match kind {
            SectionKind::Notes => &mut self.notes,
            SectionKind::Folders => &mut self.folders,
            SectionKind::Tags => &mut self.tags,
            SectionKind::Settings => &mut self.settings,
            SectionKind::State => &mut self.state,
        }
    }

    /// Shallow top-level merge
    ///
    /// Sections present in `other` replace ours wholesale; missing sections
    /// keep their current value.
    pub fn merge(&mut self, other: PartialDocument) {
        let PartialDocument {
            version,
            notes,
            folders,
            tags,
            settings,
            state,
        } = other;

        if let Some(version) = version {
            self.version = version;
        }
        if let Some(notes) = notes {
            self.notes = notes;
        }
        if let Some(folders) = folders {
            self.folders = folders;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(settings) = settings {
            self.settings = settings;
        }
        if let Some(state) = state {
            self.state = state;
        }
    }

    /// Total number of records across all sections
    pub fn record_count(&self) -> usize {
        SectionKind::ALL
            .iter()
            .map(|kind| self.section(*kind).len())
            .sum()
    }
}

/// A document as read back from storage, where any section may be missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialDocument {
    #[serde(default)]
    pub version: Option<DataVersion>,
    #[serde(default)]
    pub notes: Option<Section>,
    #[serde(default)]
    pub folders: Option<Section>,
    #[serde(default)]
    pub tags: Option<Section>,
    #[serde(default)]
    pub settings: Option<Section>,
    #[serde(default)]
    pub state: Option<Section>,
}

impl From<StoredDocument> for PartialDocument {
    fn from(doc: StoredDocument) -> Self {
        Self {
            version: Some(doc.version),
            notes: Some(doc.notes),
            folders: Some(doc.folders),
            tags: Some(doc.tags),
            settings: Some(doc.settings),
            state: Some(doc.state),
        }
    }
}

/// The always-resident part of a note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Last edit date, `YYYY-MM-DD`
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_starred: Option<bool>,
}

impl NoteMetadata {
    /// Create metadata dated today
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            snippet: None,
            updated_at: today(),
            tags: None,
            folder_id: None,
            icon: None,
            is_starred: None,
        }
    }

    /// Set the edit date to today
    pub fn touch(&mut self) {
        self.updated_at = today();
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    pub fn starred(&self) -> bool {
        self.is_starred.unwrap_or(false)
    }
}

/// A full note: metadata fields plus optional body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_starred: Option<bool>,
}

impl Note {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Project to metadata, dating it today when no date is set
    pub fn metadata(&self) -> NoteMetadata {
        NoteMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            snippet: self.snippet.clone(),
            updated_at: self.updated_at.clone().unwrap_or_else(today),
            tags: self.tags.clone(),
            folder_id: self.folder_id.clone(),
            icon: self.icon.clone(),
            is_starred: self.is_starred,
        }
    }

    /// Rebuild a full note from its two stored halves
    pub fn from_parts(meta: NoteMetadata, content: String) -> Self {
        Self {
            id: meta.id,
            title: meta.title,
            snippet: meta.snippet,
            updated_at: Some(meta.updated_at),
            tags: meta.tags,
            content: Some(content),
            folder_id: meta.folder_id,
            icon: meta.icon,
            is_starred: meta.is_starred,
        }
    }
}
