//! Record identifiers
//!
//! Ids look like `note_m5x2k9a0_Q7fZ2bXc`: a kind prefix, the creation time
//! in base-36 epoch milliseconds, and a random alphanumeric suffix, joined
//! by underscores. Plain v4 UUIDs are also accepted as ids, though they
//! carry no kind.

use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::{Uuid, Variant, Version};

use crate::models::now_millis;

/// Kind of record an id names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Note,
    Folder,
    Tag,
    User,
    Comment,
    Attachment,
}

impl IdKind {
    pub const ALL: [IdKind; 6] = [
        IdKind::Note,
        IdKind::Folder,
        IdKind::Tag,
        IdKind::User,
        IdKind::Comment,
        IdKind::Attachment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Note => "note",
            IdKind::Folder => "folder",
            IdKind::Tag => "tag",
            IdKind::User => "user",
            IdKind::Comment => "comment",
            IdKind::Attachment => "attachment",
        }
    }

    /// One-letter prefix used by short ids
    pub fn short_prefix(&self) -> char {
        match self {
            IdKind::Note => 'n',
            IdKind::Folder => 'f',
            IdKind::Tag => 't',
            IdKind::User => 'u',
            IdKind::Comment => 'c',
            IdKind::Attachment => 'a',
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown id kind '{}'", s))
    }
}

/// How to build an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdOptions {
    pub kind: IdKind,
    /// Replaces the kind prefix when set
    pub prefix: Option<String>,
    pub include_timestamp: bool,
    /// Length of the random suffix; 0 omits it
    pub random_length: usize,
    /// Produce a bare v4 UUID instead
    pub use_uuid: bool,
}

impl IdOptions {
    pub fn new(kind: IdKind) -> Self {
        Self {
            kind,
            prefix: None,
            include_timestamp: true,
            random_length: 8,
            use_uuid: false,
        }
    }
}

/// Generate an id from explicit options
pub fn generate_id_with(options: &IdOptions) -> String {
    if options.use_uuid {
        return Uuid::new_v4().to_string();
    }

    let mut parts = vec![options
        .prefix
        .clone()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| options.kind.as_str().to_string())];

    if options.include_timestamp {
        parts.push(timestamp());
    }
    if options.random_length > 0 {
        parts.push(random_string(options.random_length));
    }

    parts.join("_")
}

/// Generate a standard id: `<kind>_<timestamp>_<8 random chars>`
pub fn generate_id(kind: IdKind) -> String {
    generate_id_with(&IdOptions::new(kind))
}

/// Generate a compact id for display: `<letter>_<timestamp>_<4 random chars>`
pub fn generate_short_id(kind: IdKind) -> String {
    format!("{}_{}_{}", kind.short_prefix(), timestamp(), random_string(4))
}

/// Generate a time-sortable id with a shorter random suffix
pub fn generate_timestamped_id(kind: IdKind) -> String {
    generate_id_with(&IdOptions {
        random_length: 6,
        ..IdOptions::new(kind)
    })
}

pub fn generate_batch_ids(kind: IdKind, count: usize) -> Vec<String> {
    (0..count).map(|_| generate_id(kind)).collect()
}

/// Check that `id` is a v4 UUID or an underscore-separated id
///
/// With `kind` given, a non-UUID id must also carry that kind's prefix.
pub fn validate_id(id: &str, kind: Option<IdKind>) -> bool {
    if id.is_empty() {
        return false;
    }
    if is_uuid_v4(id) {
        return true;
    }

    let mut parts = id.split('_');
    let Some(first) = parts.next() else {
        return false;
    };
    if parts.next().is_none() {
        return false;
    }

    kind.map_or(true, |kind| first == kind.as_str())
}

/// Kind named by an id's prefix; `None` for UUIDs and unknown prefixes
pub fn extract_id_kind(id: &str) -> Option<IdKind> {
    if id.is_empty() || is_uuid_v4(id) {
        return None;
    }
    id.split('_').next()?.parse().ok()
}

fn is_uuid_v4(id: &str) -> bool {
    id.len() == 36
        && Uuid::parse_str(id).is_ok_and(|uuid| {
            uuid.get_version() == Some(Version::Random) && uuid.get_variant() == Variant::RFC4122
        })
}

fn timestamp() -> String {
    to_base36(now_millis().max(0) as u64)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
