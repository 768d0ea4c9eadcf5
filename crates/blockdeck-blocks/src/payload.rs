//! Kind-specific block payloads.
//!
//! Every payload struct rejects unknown fields. A persisted payload that
//! carries anything this build does not model is kept as
//! [`BlockPayload::Opaque`] instead, so saving never drops data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use uuid::Uuid;

use crate::block::BlockKind;
use crate::validation::{MIN_CHOICE_OPTIONS, MIN_MATCH_PAIRS, MIN_SEQUENCE_ITEMS};
use crate::{BlockError, BlockResult};

// ==================== Lesson payloads ====================

/// Free-form rich text, stored as HTML.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrativeText {
    pub html: String,
}

/// Visual tone of a callout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutVariant {
    #[default]
    Info,
    Tip,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InformationCallout {
    pub variant: CalloutVariant,
    pub title: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Image {
    pub url: String,
    pub alt: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollapsibleSection {
    pub title: String,
    pub html: String,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineStep {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeline {
    pub steps: Vec<TimelineStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorStyle {
    #[default]
    Line,
    Dots,
    Space,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Separator {
    pub style: SeparatorStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddedVideo {
    pub url: String,
    pub caption: String,
}

/// A link to another document in the same store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrossDocumentLink {
    pub target_id: String,
    pub title: String,
}

// ==================== Exercise payloads ====================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Flashcard {
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrueFalse {
    pub prompt: String,
    pub answer: bool,
    pub explanation: String,
}

impl Default for TrueFalse {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            answer: true,
            explanation: String::new(),
        }
    }
}

/// Options plus the indices of the correct ones.
///
/// Shared by single- and multi-choice; the two differ only in how many
/// correct indices they accept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Choice {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: Vec<usize>,
}

impl Choice {
    /// Creates a choice with `n` blank options and no answer.
    pub fn with_blank_options(n: usize) -> Self {
        Self {
            prompt: String::new(),
            options: vec![String::new(); n],
            correct: Vec::new(),
        }
    }

    /// Removes an option and re-indexes the correct answers.
    fn remove_option(&mut self, index: usize, min: usize, kind: BlockKind) -> BlockResult<()> {
        remove_checked(&mut self.options, index, min, kind, EntryList::Options)?;
        self.correct.retain(|&i| i != index);
        for i in &mut self.correct {
            if *i > index {
                *i -= 1;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SingleChoice(pub Choice);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiChoice(pub Choice);

impl Deref for SingleChoice {
    type Target = Choice;
    fn deref(&self) -> &Choice {
        &self.0
    }
}

impl DerefMut for SingleChoice {
    fn deref_mut(&mut self) -> &mut Choice {
        &mut self.0
    }
}

impl Deref for MultiChoice {
    type Target = Choice;
    fn deref(&self) -> &Choice {
        &self.0
    }
}

impl DerefMut for MultiChoice {
    fn deref_mut(&mut self) -> &mut Choice {
        &mut self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReorderSequence {
    pub prompt: String,
    /// Items in their correct order
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropTarget {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DragItem {
    pub label: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DragToTarget {
    pub prompt: String,
    pub targets: Vec<DropTarget>,
    pub items: Vec<DragItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairMatching {
    pub prompt: String,
    pub pairs: Vec<MatchPair>,
}

// ==================== Entry lists ====================

/// A repeatable list inside a payload that can grow or shrink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryList {
    Options,
    Items,
    Pairs,
    Steps,
    Targets,
}

impl EntryList {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryList::Options => "options",
            EntryList::Items => "items",
            EntryList::Pairs => "pairs",
            EntryList::Steps => "steps",
            EntryList::Targets => "targets",
        }
    }
}

impl fmt::Display for EntryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "options" | "option" => Ok(EntryList::Options),
            "items" | "item" => Ok(EntryList::Items),
            "pairs" | "pair" => Ok(EntryList::Pairs),
            "steps" | "step" => Ok(EntryList::Steps),
            "targets" | "target" => Ok(EntryList::Targets),
            other => Err(format!("unknown entry list '{other}'")),
        }
    }
}

/// Removes `entries[index]` unless that would go below `min`.
fn remove_checked<T>(
    entries: &mut Vec<T>,
    index: usize,
    min: usize,
    kind: BlockKind,
    list: EntryList,
) -> BlockResult<T> {
    if index >= entries.len() {
        return Err(BlockError::EntryOutOfRange { list, index });
    }
    if entries.len() <= min {
        return Err(BlockError::ConstraintViolation { kind, list, min });
    }
    Ok(entries.remove(index))
}

// ==================== The tagged union ====================

/// A block's payload: one variant per kind, plus an opaque passthrough.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockPayload {
    NarrativeText(NarrativeText),
    InformationCallout(InformationCallout),
    Image(Image),
    CollapsibleSection(CollapsibleSection),
    Timeline(Timeline),
    Separator(Separator),
    EmbeddedVideo(EmbeddedVideo),
    CrossDocumentLink(CrossDocumentLink),
    Flashcard(Flashcard),
    TrueFalse(TrueFalse),
    SingleChoice(SingleChoice),
    MultiChoice(MultiChoice),
    ReorderSequence(ReorderSequence),
    DragToTarget(DragToTarget),
    PairMatching(PairMatching),
    /// Loaded data with an unknown type tag or a shape this build can't decode
    Opaque { type_tag: String, data: Value },
}

fn decode_as<T: DeserializeOwned>(data: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(data)
}

impl BlockPayload {
    /// Decodes persisted data for a known kind.
    pub fn decode(kind: BlockKind, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            BlockKind::NarrativeText => Self::NarrativeText(decode_as(data)?),
            BlockKind::InformationCallout => Self::InformationCallout(decode_as(data)?),
            BlockKind::Image => Self::Image(decode_as(data)?),
            BlockKind::CollapsibleSection => Self::CollapsibleSection(decode_as(data)?),
            BlockKind::Timeline => Self::Timeline(decode_as(data)?),
            BlockKind::Separator => Self::Separator(decode_as(data)?),
            BlockKind::EmbeddedVideo => Self::EmbeddedVideo(decode_as(data)?),
            BlockKind::CrossDocumentLink => Self::CrossDocumentLink(decode_as(data)?),
            BlockKind::Flashcard => Self::Flashcard(decode_as(data)?),
            BlockKind::TrueFalse => Self::TrueFalse(decode_as(data)?),
            BlockKind::SingleChoice => Self::SingleChoice(decode_as(data)?),
            BlockKind::MultiChoice => Self::MultiChoice(decode_as(data)?),
            BlockKind::ReorderSequence => Self::ReorderSequence(decode_as(data)?),
            BlockKind::DragToTarget => Self::DragToTarget(decode_as(data)?),
            BlockKind::PairMatching => Self::PairMatching(decode_as(data)?),
        })
    }

    /// Decodes persisted data by type tag, degrading to `Opaque` on failure.
    pub fn from_data(type_tag: &str, data: Value) -> Self {
        match type_tag.parse::<BlockKind>() {
            Ok(kind) => match Self::decode(kind, data.clone()) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Keeping undecodable {} payload as-is: {}", type_tag, e);
                    Self::Opaque {
                        type_tag: type_tag.to_string(),
                        data,
                    }
                }
            },
            Err(_) => {
                tracing::warn!("Keeping block of unknown type '{}' as-is", type_tag);
                Self::Opaque {
                    type_tag: type_tag.to_string(),
                    data,
                }
            }
        }
    }

    /// Encodes the payload to its persisted JSON shape.
    pub fn to_data(&self) -> BlockResult<Value> {
        let value = match self {
            Self::NarrativeText(p) => serde_json::to_value(p)?,
            Self::InformationCallout(p) => serde_json::to_value(p)?,
            Self::Image(p) => serde_json::to_value(p)?,
            Self::CollapsibleSection(p) => serde_json::to_value(p)?,
            Self::Timeline(p) => serde_json::to_value(p)?,
            Self::Separator(p) => serde_json::to_value(p)?,
            Self::EmbeddedVideo(p) => serde_json::to_value(p)?,
            Self::CrossDocumentLink(p) => serde_json::to_value(p)?,
            Self::Flashcard(p) => serde_json::to_value(p)?,
            Self::TrueFalse(p) => serde_json::to_value(p)?,
            Self::SingleChoice(p) => serde_json::to_value(p)?,
            Self::MultiChoice(p) => serde_json::to_value(p)?,
            Self::ReorderSequence(p) => serde_json::to_value(p)?,
            Self::DragToTarget(p) => serde_json::to_value(p)?,
            Self::PairMatching(p) => serde_json::to_value(p)?,
            Self::Opaque { data, .. } => data.clone(),
        };
        Ok(value)
    }

    /// Returns the kind, or `None` for opaque payloads.
    pub fn kind(&self) -> Option<BlockKind> {
        Some(match self {
            Self::NarrativeText(_) => BlockKind::NarrativeText,
            Self::InformationCallout(_) => BlockKind::InformationCallout,
            Self::Image(_) => BlockKind::Image,
            Self::CollapsibleSection(_) => BlockKind::CollapsibleSection,
            Self::Timeline(_) => BlockKind::Timeline,
            Self::Separator(_) => BlockKind::Separator,
            Self::EmbeddedVideo(_) => BlockKind::EmbeddedVideo,
            Self::CrossDocumentLink(_) => BlockKind::CrossDocumentLink,
            Self::Flashcard(_) => BlockKind::Flashcard,
            Self::TrueFalse(_) => BlockKind::TrueFalse,
            Self::SingleChoice(_) => BlockKind::SingleChoice,
            Self::MultiChoice(_) => BlockKind::MultiChoice,
            Self::ReorderSequence(_) => BlockKind::ReorderSequence,
            Self::DragToTarget(_) => BlockKind::DragToTarget,
            Self::PairMatching(_) => BlockKind::PairMatching,
            Self::Opaque { .. } => return None,
        })
    }

    /// Returns the persisted type tag.
    pub fn type_tag(&self) -> &str {
        match self {
            Self::Opaque { type_tag, .. } => type_tag,
            other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    /// Returns true for passthrough payloads.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque { .. })
    }

    /// The text a preview line is built from.
    pub fn summary_text(&self) -> &str {
        match self {
            Self::NarrativeText(p) => &p.html,
            Self::InformationCallout(p) => &p.title,
            Self::Image(p) if !p.caption.is_empty() => &p.caption,
            Self::Image(p) => &p.url,
            Self::CollapsibleSection(p) => &p.title,
            Self::Timeline(p) => p.steps.first().map(|s| s.title.as_str()).unwrap_or(""),
            Self::Separator(_) => "",
            Self::EmbeddedVideo(p) => &p.url,
            Self::CrossDocumentLink(p) => &p.title,
            Self::Flashcard(p) => &p.prompt,
            Self::TrueFalse(p) => &p.prompt,
            Self::SingleChoice(p) => &p.prompt,
            Self::MultiChoice(p) => &p.prompt,
            Self::ReorderSequence(p) => &p.prompt,
            Self::DragToTarget(p) => &p.prompt,
            Self::PairMatching(p) => &p.prompt,
            Self::Opaque { .. } => "",
        }
    }

    // ==================== Editing ====================

    /// Merges a partial payload (JSON merge patch) into this one.
    ///
    /// `null` members remove a field, which resets it to its default. The
    /// payload is left untouched if the result doesn't fit the kind.
    pub fn merge(&mut self, patch: &Value) -> BlockResult<()> {
        if !patch.is_object() {
            return Err(BlockError::PatchNotObject);
        }

        let mut data = self.to_data()?;
        merge_patch(&mut data, patch);

        match self {
            Self::Opaque { data: current, .. } => *current = data,
            other => {
                let kind = other.kind().ok_or(BlockError::PatchNotObject)?;
                *other = Self::decode(kind, data).map_err(|source| BlockError::InvalidPatch {
                    kind: kind.as_str().to_string(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Minimum length of an entry list for this payload.
    pub fn min_entries(&self, list: EntryList) -> usize {
        match (self, list) {
            (Self::SingleChoice(_) | Self::MultiChoice(_), EntryList::Options) => {
                MIN_CHOICE_OPTIONS
            }
            (Self::ReorderSequence(_), EntryList::Items) => MIN_SEQUENCE_ITEMS,
            (Self::PairMatching(_), EntryList::Pairs) => MIN_MATCH_PAIRS,
            _ => 0,
        }
    }

    /// Returns the length of an entry list, if this payload has it.
    pub fn entry_count(&self, list: EntryList) -> Option<usize> {
        match (self, list) {
            (Self::SingleChoice(SingleChoice(c)), EntryList::Options)
            | (Self::MultiChoice(MultiChoice(c)), EntryList::Options) => Some(c.options.len()),
            (Self::ReorderSequence(p), EntryList::Items) => Some(p.items.len()),
            (Self::DragToTarget(p), EntryList::Items) => Some(p.items.len()),
            (Self::DragToTarget(p), EntryList::Targets) => Some(p.targets.len()),
            (Self::PairMatching(p), EntryList::Pairs) => Some(p.pairs.len()),
            (Self::Timeline(p), EntryList::Steps) => Some(p.steps.len()),
            _ => None,
        }
    }

    /// Appends a blank entry and returns its index.
    pub fn add_entry(&mut self, list: EntryList) -> BlockResult<usize> {
        let len = match (&mut *self, list) {
            (Self::SingleChoice(SingleChoice(c)), EntryList::Options)
            | (Self::MultiChoice(MultiChoice(c)), EntryList::Options) => {
                c.options.push(String::new());
                c.options.len()
            }
            (Self::ReorderSequence(p), EntryList::Items) => {
                p.items.push(String::new());
                p.items.len()
            }
            (Self::DragToTarget(p), EntryList::Items) => {
                p.items.push(DragItem::default());
                p.items.len()
            }
            (Self::DragToTarget(p), EntryList::Targets) => {
                p.targets.push(DropTarget {
                    id: Uuid::new_v4().simple().to_string(),
                    label: String::new(),
                });
                p.targets.len()
            }
            (Self::PairMatching(p), EntryList::Pairs) => {
                p.pairs.push(MatchPair::default());
                p.pairs.len()
            }
            (Self::Timeline(p), EntryList::Steps) => {
                p.steps.push(TimelineStep::default());
                p.steps.len()
            }
            (other, list) => {
                return Err(BlockError::UnsupportedList {
                    kind: other.type_tag().to_string(),
                    list,
                });
            }
        };
        Ok(len - 1)
    }

    /// Removes an entry, refusing to go below the list's floor.
    pub fn remove_entry(&mut self, list: EntryList, index: usize) -> BlockResult<()> {
        let min = self.min_entries(list);
        match (&mut *self, list) {
            (Self::SingleChoice(SingleChoice(c)), EntryList::Options) => {
                c.remove_option(index, min, BlockKind::SingleChoice)?;
            }
            (Self::MultiChoice(MultiChoice(c)), EntryList::Options) => {
                c.remove_option(index, min, BlockKind::MultiChoice)?;
            }
            (Self::ReorderSequence(p), EntryList::Items) => {
                remove_checked(&mut p.items, index, min, BlockKind::ReorderSequence, list)?;
            }
            (Self::DragToTarget(p), EntryList::Items) => {
                remove_checked(&mut p.items, index, min, BlockKind::DragToTarget, list)?;
            }
            (Self::DragToTarget(p), EntryList::Targets) => {
                let target =
                    remove_checked(&mut p.targets, index, min, BlockKind::DragToTarget, list)?;
                for item in p.items.iter_mut().filter(|i| i.target_id == target.id) {
                    item.target_id.clear();
                }
            }
            (Self::PairMatching(p), EntryList::Pairs) => {
                remove_checked(&mut p.pairs, index, min, BlockKind::PairMatching, list)?;
            }
            (Self::Timeline(p), EntryList::Steps) => {
                remove_checked(&mut p.steps, index, min, BlockKind::Timeline, list)?;
            }
            (other, list) => {
                return Err(BlockError::UnsupportedList {
                    kind: other.type_tag().to_string(),
                    list,
                });
            }
        }
        Ok(())
    }
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
