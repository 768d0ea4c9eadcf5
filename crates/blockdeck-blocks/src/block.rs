//! Block identity and kinds.
//!
//! `BlockId` is a newtype over the persisted string id. Ids minted here are
//! UUIDs, but ids read back from storage are kept as-is: the only thing the
//! editor relies on is that they are unique within one document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::payload::BlockPayload;
use crate::{BlockError, BlockResult};

/// Opaque, stable identifier of a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Creates a new unique block ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The document family a kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Instructional, narrative blocks
    Lesson,
    /// Scored assessment blocks
    Exercise,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Lesson => f.write_str("lesson"),
            Family::Exercise => f.write_str("exercise"),
        }
    }
}

/// Every block kind the editor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    // Lesson kinds
    NarrativeText,
    InformationCallout,
    Image,
    CollapsibleSection,
    Timeline,
    Separator,
    EmbeddedVideo,
    CrossDocumentLink,

    // Exercise kinds
    Flashcard,
    TrueFalse,
    SingleChoice,
    MultiChoice,
    ReorderSequence,
    DragToTarget,
    PairMatching,
}

impl BlockKind {
    /// All kinds, lesson kinds first, in catalog order.
    pub const ALL: [BlockKind; 15] = [
        BlockKind::NarrativeText,
        BlockKind::InformationCallout,
        BlockKind::Image,
        BlockKind::CollapsibleSection,
        BlockKind::Timeline,
        BlockKind::Separator,
        BlockKind::EmbeddedVideo,
        BlockKind::CrossDocumentLink,
        BlockKind::Flashcard,
        BlockKind::TrueFalse,
        BlockKind::SingleChoice,
        BlockKind::MultiChoice,
        BlockKind::ReorderSequence,
        BlockKind::DragToTarget,
        BlockKind::PairMatching,
    ];

    /// Returns the persisted type tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::NarrativeText => "narrative-text",
            BlockKind::InformationCallout => "information-callout",
            BlockKind::Image => "image",
            BlockKind::CollapsibleSection => "collapsible-section",
            BlockKind::Timeline => "timeline",
            BlockKind::Separator => "separator",
            BlockKind::EmbeddedVideo => "embedded-video",
            BlockKind::CrossDocumentLink => "cross-document-link",
            BlockKind::Flashcard => "flashcard",
            BlockKind::TrueFalse => "true-false",
            BlockKind::SingleChoice => "single-choice",
            BlockKind::MultiChoice => "multi-choice",
            BlockKind::ReorderSequence => "reorder-sequence",
            BlockKind::DragToTarget => "drag-to-target",
            BlockKind::PairMatching => "pair-matching",
        }
    }

    /// Returns a human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            BlockKind::NarrativeText => "Text",
            BlockKind::InformationCallout => "Callout",
            BlockKind::Image => "Image",
            BlockKind::CollapsibleSection => "Collapsible Section",
            BlockKind::Timeline => "Timeline",
            BlockKind::Separator => "Separator",
            BlockKind::EmbeddedVideo => "Video",
            BlockKind::CrossDocumentLink => "Document Link",
            BlockKind::Flashcard => "Flashcard",
            BlockKind::TrueFalse => "True / False",
            BlockKind::SingleChoice => "Single Choice",
            BlockKind::MultiChoice => "Multiple Choice",
            BlockKind::ReorderSequence => "Put in Order",
            BlockKind::DragToTarget => "Drag to Target",
            BlockKind::PairMatching => "Match Pairs",
        }
    }

    /// Returns the family this kind belongs to.
    pub fn family(&self) -> Family {
        match self {
            BlockKind::NarrativeText
            | BlockKind::InformationCallout
            | BlockKind::Image
            | BlockKind::CollapsibleSection
            | BlockKind::Timeline
            | BlockKind::Separator
            | BlockKind::EmbeddedVideo
            | BlockKind::CrossDocumentLink => Family::Lesson,
            BlockKind::Flashcard
            | BlockKind::TrueFalse
            | BlockKind::SingleChoice
            | BlockKind::MultiChoice
            | BlockKind::ReorderSequence
            | BlockKind::DragToTarget
            | BlockKind::PairMatching => Family::Exercise,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BlockError::UnknownKind(s.to_string()))
    }
}

/// A single unit of document content.
///
/// Exercise blocks carry a point value; lesson blocks never do. Opaque
/// blocks keep whatever points they were loaded with.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    id: BlockId,
    payload: BlockPayload,
    points: Option<u32>,
}

impl Block {
    /// Creates a block from its parts.
    pub fn new(id: BlockId, payload: BlockPayload, points: Option<u32>) -> Self {
        Self {
            id,
            payload,
            points,
        }
    }

    /// Returns the block ID.
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Returns the block payload.
    pub fn payload(&self) -> &BlockPayload {
        &self.payload
    }

    /// Returns a mutable reference to the payload.
    pub fn payload_mut(&mut self) -> &mut BlockPayload {
        &mut self.payload
    }

    /// Returns the kind, or `None` for opaque blocks.
    pub fn kind(&self) -> Option<BlockKind> {
        self.payload.kind()
    }

    /// Returns the persisted type tag.
    pub fn type_tag(&self) -> &str {
        self.payload.type_tag()
    }

    /// Returns the point value (exercise blocks only).
    pub fn points(&self) -> Option<u32> {
        self.points
    }

    /// Sets the point value.
    pub fn set_points(&mut self, points: u32) -> BlockResult<()> {
        if self.points.is_none() {
            return Err(BlockError::NotAnExercise(self.type_tag().to_string()));
        }
        self.points = Some(points);
        Ok(())
    }

    /// Returns the same block under a different id.
    pub fn with_id(mut self, id: BlockId) -> Self {
        self.id = id;
        self
    }

    /// Returns a one-line plain-text preview, at most `max` graphemes long.
    pub fn preview(&self, max: usize) -> String {
        let text = strip_tags(self.payload.summary_text());
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

        let mut graphemes = text.graphemes(true);
        let head: String = graphemes.by_ref().take(max).collect();
        if graphemes.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}

/// Drops anything between `<` and `>`; enough for a preview line.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::NarrativeText;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "video-quiz".parse::<BlockKind>().unwrap_err();
        assert!(matches!(err, BlockError::UnknownKind(tag) if tag == "video-quiz"));
    }

    #[test]
    fn test_families() {
        assert_eq!(BlockKind::Timeline.family(), Family::Lesson);
        assert_eq!(BlockKind::TrueFalse.family(), Family::Exercise);
    }

    #[test]
    fn test_lesson_block_rejects_points() {
        let payload = BlockPayload::NarrativeText(NarrativeText::default());
        let mut block = Block::new(BlockId::from("a"), payload, None);
        assert!(block.set_points(3).is_err());
    }

    #[test]
    fn test_preview_strips_markup_and_truncates() {
        let payload = BlockPayload::NarrativeText(NarrativeText {
            html: "<p>Hello <b>brave</b> new world</p>".to_string(),
        });
        let block = Block::new(BlockId::from("a"), payload, None);

        assert_eq!(block.preview(100), "Hello brave new world");
        assert_eq!(block.preview(5), "Hello…");
    }
}
