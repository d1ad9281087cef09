//! Core data models for vitrine.
//!
//! These types are shared across all vitrine crates and represent the
//! gallery's domain entities and the units tracked by the upload pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::id::EntityId;

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Kind of a gallery entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    File,
    Folder,
    Mission,
    Note,
}

/// Denormalized location attribute of an entity.
///
/// Folder and mission membership are mutually exclusive; an entity with
/// neither is "unfiled". The wire shape is the pair of optional
/// `folder_id`/`mission_id` fields, so a single `Location` value always
/// sets one facet and clears the other in the same write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "LocationRepr", into = "LocationRepr")]
pub enum Location {
    Unfiled,
    Folder(EntityId),
    Mission(EntityId),
}

/// Wire representation of [`Location`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocationRepr {
    #[serde(skip_serializing_if = "Option::is_none")]
    folder_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mission_id: Option<EntityId>,
}

impl From<LocationRepr> for Location {
    fn from(repr: LocationRepr) -> Self {
        // Folder wins if a malformed record carries both.
        match (repr.folder_id, repr.mission_id) {
            (Some(folder), _) => Location::Folder(folder),
            (None, Some(mission)) => Location::Mission(mission),
            (None, None) => Location::Unfiled,
        }
    }
}

impl From<Location> for LocationRepr {
    fn from(location: Location) -> Self {
        match location {
            Location::Unfiled => LocationRepr {
                folder_id: None,
                mission_id: None,
            },
            Location::Folder(id) => LocationRepr {
                folder_id: Some(id),
                mission_id: None,
            },
            Location::Mission(id) => LocationRepr {
                folder_id: None,
                mission_id: Some(id),
            },
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unfiled => write!(f, "unfiled"),
            Location::Folder(id) => write!(f, "folder:{id}"),
            Location::Mission(id) => write!(f, "mission:{id}"),
        }
    }
}

/// Summary of an entity as held by cached views and list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    #[serde(flatten)]
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub created_at_utc: DateTime<Utc>,
}

// =============================================================================
// VIEW KEYS
// =============================================================================

/// Names one independently cached collection of entity summaries.
///
/// Each key corresponds to one query the UI renders. Multiple views may
/// hold overlapping copies of the same entity; the backend is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKey {
    /// Files/notes with no folder or mission.
    Unfiled,
    /// Contents of one folder.
    Folder(EntityId),
    /// Contents of one mission.
    Mission(EntityId),
    /// The folder list itself.
    Folders,
}

impl ViewKey {
    /// The view that renders entities at the given location.
    pub fn for_location(location: Location) -> Self {
        match location {
            Location::Unfiled => ViewKey::Unfiled,
            Location::Folder(id) => ViewKey::Folder(id),
            Location::Mission(id) => ViewKey::Mission(id),
        }
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKey::Unfiled => write!(f, "unfiled"),
            ViewKey::Folder(id) => write!(f, "folder:{id}"),
            ViewKey::Mission(id) => write!(f, "mission:{id}"),
            ViewKey::Folders => write!(f, "folders"),
        }
    }
}

// =============================================================================
// UPLOAD TYPES
// =============================================================================

/// Originating payload reference for one pending ingestion unit.
///
/// Serializable so the durable upload queue can persist it across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadRef {
    /// A local file handle.
    File { path: PathBuf, size_bytes: u64 },
    /// A link to remote content.
    Link { url: String },
    /// Inline note text.
    Note { text: String },
}

impl PayloadRef {
    /// Kind of entity this payload produces.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            PayloadRef::File { .. } => EntityKind::File,
            PayloadRef::Link { .. } | PayloadRef::Note { .. } => EntityKind::Note,
        }
    }

    /// Byte size, where known up front (files only).
    pub fn size_bytes(&self) -> Option<u64> {
        match self {
            PayloadRef::File { size_bytes, .. } => Some(*size_bytes),
            _ => None,
        }
    }

    /// Display name derived from the payload.
    pub fn display_name(&self) -> String {
        match self {
            PayloadRef::File { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            PayloadRef::Link { url } => url.clone(),
            PayloadRef::Note { text } => {
                let mut name: String = text.chars().take(40).collect();
                if text.chars().count() > 40 {
                    name.push('…');
                }
                name
            }
        }
    }
}

/// Terminal or pending outcome of an upload item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Pending,
    Succeeded,
    Failed,
}

impl UploadOutcome {
    /// Whether the item has settled (success or failure).
    pub fn is_terminal(self) -> bool {
        !matches!(self, UploadOutcome::Pending)
    }
}
