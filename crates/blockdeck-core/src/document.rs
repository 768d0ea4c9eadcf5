//! Document model.
//!
//! ## Learning: Newtypes
//!
//! `DocumentId` wraps the id the storage collaborator hands out. It stays a
//! string because the store, not the editor, decides what ids look like.

use blockdeck_blocks::{BlockList, Family};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a new random document ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
    Disabled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Published => "published",
            DocumentStatus::Disabled => "disabled",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(DocumentStatus::Draft),
            "published" => Ok(DocumentStatus::Published),
            "disabled" => Ok(DocumentStatus::Disabled),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Lesson-only metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LessonMeta {
    pub duration_minutes: u32,
    /// Position of the lesson within its chapter
    pub order: i64,
    pub hidden: bool,
}

/// Exercise-only metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExerciseMeta {
    /// Last known exercise type, used while the exercise has no blocks
    pub exercise_type: Option<String>,
}

/// Kind-specific document metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMeta {
    Lesson(LessonMeta),
    Exercise(ExerciseMeta),
}

impl DocumentMeta {
    /// Returns the block family this document accepts.
    pub fn family(&self) -> Family {
        match self {
            DocumentMeta::Lesson(_) => Family::Lesson,
            DocumentMeta::Exercise(_) => Family::Exercise,
        }
    }
}

/// A lesson or exercise: metadata plus an ordered list of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// `None` until the store has created the document
    pub id: Option<DocumentId>,
    pub title: String,
    pub status: DocumentStatus,
    pub meta: DocumentMeta,
    pub blocks: BlockList,
}

impl Document {
    /// Creates an empty, unsaved lesson.
    pub fn lesson(title: impl Into<String>) -> Self {
        Self::empty(title, DocumentMeta::Lesson(LessonMeta::default()))
    }

    /// Creates an empty, unsaved exercise.
    pub fn exercise(title: impl Into<String>) -> Self {
        Self::empty(title, DocumentMeta::Exercise(ExerciseMeta::default()))
    }

    fn empty(title: impl Into<String>, meta: DocumentMeta) -> Self {
        Self {
            id: None,
            title: title.into(),
            status: DocumentStatus::default(),
            meta,
            blocks: BlockList::new(),
        }
    }

    /// Returns the block family this document accepts.
    pub fn family(&self) -> Family {
        self.meta.family()
    }
}
