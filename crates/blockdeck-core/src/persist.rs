//! Persisted document shapes and the save/load mapping.
//!
//! Lessons persist their blocks as `editor_data`, a list of
//! `{id, type, data}` records in document order. Exercises persist
//! `exercise_data.blocks`, a list of `{id, type, order, points, content}`
//! records where `order` is the 0-based position.
//!
//! Saving drops every block that fails its kind's non-empty rule. Loading
//! never fails on block data: unknown tags and undecodable payloads are
//! kept as opaque blocks and written back unchanged. A record that does not
//! decode at all (no `type`, a non-string `id`) is salvaged field by field.

use std::collections::HashSet;

use blockdeck_blocks::{Block, BlockId, BlockList, BlockPayload, BlockRegistry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::document::{Document, DocumentId, DocumentMeta, DocumentStatus, ExerciseMeta, LessonMeta};
use crate::CoreResult;

/// Exercise type recorded for an exercise that has never had a block.
pub const DEFAULT_EXERCISE_TYPE: &str = "single-choice";

// ==================== Records ====================

/// One lesson block as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonBlockRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// A persisted lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_records")]
    pub editor_data: Vec<LessonBlockRecord>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub hidden: bool,
}

/// One exercise block as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseBlockRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub content: Value,
}

/// The `exercise_data` member of a persisted exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_records")]
    pub blocks: Vec<ExerciseBlockRecord>,
}

/// A persisted exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub title: String,
    pub exercise_type: String,
    pub exercise_data: ExerciseData,
}

/// Persisted content of either document family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "lowercase")]
pub enum DocumentContent {
    Lesson(LessonRecord),
    Exercise(ExerciseRecord),
}

impl DocumentContent {
    /// Returns the document title.
    pub fn title(&self) -> &str {
        match self {
            DocumentContent::Lesson(r) => &r.title,
            DocumentContent::Exercise(r) => &r.title,
        }
    }

    /// Returns the number of persisted blocks.
    pub fn block_count(&self) -> usize {
        match self {
            DocumentContent::Lesson(r) => r.editor_data.len(),
            DocumentContent::Exercise(r) => r.exercise_data.blocks.len(),
        }
    }
}

// ==================== Salvage ====================

/// Rebuilds a record from whatever fields of a malformed one are usable.
trait Salvage {
    fn salvage(raw: &Value) -> Self;
}

impl Salvage for LessonBlockRecord {
    fn salvage(raw: &Value) -> Self {
        Self {
            id: string_field(raw, "id"),
            kind: tag_field(raw),
            data: raw.get("data").cloned().unwrap_or_default(),
        }
    }
}

impl Salvage for ExerciseBlockRecord {
    fn salvage(raw: &Value) -> Self {
        let number = |key: &str| raw.get(key).and_then(Value::as_u64);
        Self {
            id: string_field(raw, "id"),
            kind: tag_field(raw),
            order: number("order")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
            points: number("points")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            content: raw.get("content").cloned().unwrap_or_default(),
        }
    }
}

fn string_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// A string `type` as is; any other JSON value as its JSON text.
fn tag_field(raw: &Value) -> String {
    match raw.get("type") {
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Decodes a record list element by element, salvaging the ones that fail.
fn lenient_records<'de, D, R>(deserializer: D) -> Result<Vec<R>, D::Error>
where
    D: Deserializer<'de>,
    R: DeserializeOwned + Salvage,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let records = raw
        .into_iter()
        .map(|value| match R::deserialize(&value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Salvaging malformed block record: {}", e);
                R::salvage(&value)
            }
        })
        .collect();
    Ok(records)
}

// ==================== Save ====================

/// Builds the persisted content of `document`.
///
/// Blocks failing their non-empty rule are left out, and the document itself
/// is not modified.
pub fn serialize_document(document: &Document, registry: &BlockRegistry) -> CoreResult<DocumentContent> {
    let kept = document.blocks.filtered(|b| registry.has_content(b));
    let pruned = document.blocks.len() - kept.len();
    if pruned > 0 {
        tracing::debug!("Pruning {} empty block(s) from '{}'", pruned, document.title);
    }

    let content = match &document.meta {
        DocumentMeta::Lesson(meta) => {
            let editor_data = kept
                .iter()
                .map(|block| {
                    Ok(LessonBlockRecord {
                        id: block.id().to_string(),
                        kind: block.type_tag().to_string(),
                        data: block.payload().to_data()?,
                    })
                })
                .collect::<CoreResult<Vec<_>>>()?;

            DocumentContent::Lesson(LessonRecord {
                title: document.title.clone(),
                editor_data,
                duration_minutes: meta.duration_minutes,
                order: meta.order,
                hidden: meta.hidden,
            })
        }
        DocumentMeta::Exercise(meta) => {
            let blocks = kept
                .iter()
                .enumerate()
                .map(|(order, block)| {
                    Ok(ExerciseBlockRecord {
                        id: block.id().to_string(),
                        kind: block.type_tag().to_string(),
                        order,
                        points: block.points().unwrap_or(0),
                        content: block.payload().to_data()?,
                    })
                })
                .collect::<CoreResult<Vec<_>>>()?;

            let exercise_type = blocks
                .first()
                .map(|b| b.kind.clone())
                .or_else(|| meta.exercise_type.clone())
                .unwrap_or_else(|| DEFAULT_EXERCISE_TYPE.to_string());

            DocumentContent::Exercise(ExerciseRecord {
                title: document.title.clone(),
                exercise_type: exercise_type.clone(),
                exercise_data: ExerciseData {
                    kind: exercise_type,
                    blocks,
                },
            })
        }
    };

    Ok(content)
}

// ==================== Load ====================

/// Rebuilds a document from persisted content.
///
/// Exercise blocks are stably sorted by `order`. A block id seen twice is
/// replaced with a fresh one so ids stay unique within the document.
pub fn deserialize_document(id: Option<DocumentId>, status: DocumentStatus, content: DocumentContent) -> Document {
    let mut ids = UniqueIds::default();

    match content {
        DocumentContent::Lesson(record) => {
            let blocks: BlockList = record
                .editor_data
                .into_iter()
                .map(|r| {
                    Block::new(
                        ids.claim(r.id),
                        BlockPayload::from_data(&r.kind, r.data),
                        None,
                    )
                })
                .collect();

            Document {
                id,
                title: record.title,
                status,
                meta: DocumentMeta::Lesson(LessonMeta {
                    duration_minutes: record.duration_minutes,
                    order: record.order,
                    hidden: record.hidden,
                }),
                blocks,
            }
        }
        DocumentContent::Exercise(record) => {
            let mut records = record.exercise_data.blocks;
            records.sort_by_key(|r| r.order);

            let blocks: BlockList = records
                .into_iter()
                .map(|r| {
                    Block::new(
                        ids.claim(r.id),
                        BlockPayload::from_data(&r.kind, r.content),
                        Some(r.points),
                    )
                })
                .collect();

            Document {
                id,
                title: record.title,
                status,
                meta: DocumentMeta::Exercise(ExerciseMeta {
                    exercise_type: Some(record.exercise_type),
                }),
                blocks,
            }
        }
    }
}

#[derive(Default)]
struct UniqueIds {
    seen: HashSet<String>,
}

impl UniqueIds {
    fn claim(&mut self, id: String) -> BlockId {
        if !id.is_empty() && self.seen.insert(id.clone()) {
            return BlockId::from(id);
        }
        let fresh = BlockId::new();
        tracing::warn!("Block id '{}' is missing or repeated, using {}", id, fresh);
        self.seen.insert(fresh.to_string());
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoredDocument;
    use blockdeck_blocks::BlockKind;
    use serde_json::json;

    fn registry() -> BlockRegistry {
        BlockRegistry::standard()
    }

    fn lesson_json() -> Value {
        json!({
            "title": "Photosynthesis",
            "editor_data": [
                {"id": "b1", "type": "narrative-text", "data": {"html": "<p>Plants eat light</p>"}},
                {"id": "b2", "type": "separator", "data": {"style": "dots"}},
                {"id": "b3", "type": "chart", "data": {"series": [1, 2, 3]}}
            ],
            "duration_minutes": 15,
            "order": 3,
            "hidden": false
        })
    }

    fn exercise_json() -> Value {
        json!({
            "title": "Quiz",
            "exercise_type": "single-choice",
            "exercise_data": {
                "type": "single-choice",
                "blocks": [
                    {"id": "q1", "type": "single-choice", "order": 0, "points": 5,
                     "content": {"prompt": "2+2?", "options": ["3", "4"], "correct": [1]}},
                    {"id": "q2", "type": "flashcard", "order": 1, "points": 5,
                     "content": {"prompt": "H2O", "answer": "Water"}}
                ]
            }
        })
    }

    #[test]
    fn test_lesson_round_trip_is_identity() {
        let record: LessonRecord = serde_json::from_value(lesson_json()).unwrap();
        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Lesson(record.clone()));

        assert_eq!(doc.blocks.len(), 3);
        assert!(doc.blocks.get(2).unwrap().payload().is_opaque());

        let saved = serialize_document(&doc, &registry()).unwrap();
        assert_eq!(saved, DocumentContent::Lesson(record));
    }

    #[test]
    fn test_exercise_round_trip_is_identity() {
        let record: ExerciseRecord = serde_json::from_value(exercise_json()).unwrap();
        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Exercise(record.clone()));

        assert_eq!(doc.blocks.get(0).unwrap().points(), Some(5));
        let saved = serialize_document(&doc, &registry()).unwrap();
        assert_eq!(saved, DocumentContent::Exercise(record));
    }

    #[test]
    fn test_exercise_blocks_are_sorted_by_order() {
        let mut value = exercise_json();
        value["exercise_data"]["blocks"][0]["order"] = json!(1);
        value["exercise_data"]["blocks"][1]["order"] = json!(0);
        let record: ExerciseRecord = serde_json::from_value(value).unwrap();

        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Exercise(record));
        assert_eq!(doc.blocks.get(0).unwrap().id().as_str(), "q2");

        let DocumentContent::Exercise(saved) = serialize_document(&doc, &registry()).unwrap() else {
            panic!("expected an exercise");
        };
        assert_eq!(saved.exercise_type, "flashcard");
        assert_eq!(saved.exercise_data.blocks[0].order, 0);
        assert_eq!(saved.exercise_data.blocks[1].id, "q1");
    }

    #[test]
    fn test_empty_blocks_are_pruned() {
        let reg = registry();
        let mut doc = Document::lesson("Draft");
        doc.blocks = BlockList::from(vec![
            reg.create(BlockKind::NarrativeText).unwrap(),
            reg.create(BlockKind::Separator).unwrap(),
            reg.create(BlockKind::Image).unwrap(),
        ]);

        let DocumentContent::Lesson(saved) = serialize_document(&doc, &reg).unwrap() else {
            panic!("expected a lesson");
        };
        assert_eq!(saved.editor_data.len(), 1);
        assert_eq!(saved.editor_data[0].kind, "separator");
        // The document keeps its blocks
        assert_eq!(doc.blocks.len(), 3);
    }

    #[test]
    fn test_empty_exercise_keeps_known_type() {
        let mut doc = Document::exercise("Nothing yet");
        let DocumentContent::Exercise(saved) = serialize_document(&doc, &registry()).unwrap() else {
            panic!("expected an exercise");
        };
        assert_eq!(saved.exercise_type, DEFAULT_EXERCISE_TYPE);

        doc.meta = DocumentMeta::Exercise(ExerciseMeta {
            exercise_type: Some("pair-matching".to_string()),
        });
        let DocumentContent::Exercise(saved) = serialize_document(&doc, &registry()).unwrap() else {
            panic!("expected an exercise");
        };
        assert_eq!(saved.exercise_data.kind, "pair-matching");
    }

    #[test]
    fn test_duplicate_ids_are_replaced() {
        let mut value = lesson_json();
        value["editor_data"][1]["id"] = json!("b1");
        let record: LessonRecord = serde_json::from_value(value).unwrap();

        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Lesson(record));
        let ids = doc.blocks.ids();
        assert_eq!(ids[0].as_str(), "b1");
        assert_ne!(ids[1].as_str(), "b1");
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn test_malformed_records_do_not_sink_the_document() {
        let stored: StoredDocument = serde_json::from_value(json!({
            "status": "published",
            "content": {"kind": "lesson", "body": {
                "title": "Mixed",
                "editor_data": [
                    {"id": "m1", "data": {"html": "no type"}},
                    {"id": "m2", "type": 7, "data": {"x": 1}},
                    {"type": "separator", "data": {"style": "line"}},
                    {"id": "ok", "type": "narrative-text", "data": {"html": "Fine"}}
                ]
            }}
        }))
        .unwrap();

        let doc = deserialize_document(None, stored.status, stored.content);
        assert_eq!(doc.blocks.len(), 4);

        let no_type = doc.blocks.get(0).unwrap();
        assert!(no_type.payload().is_opaque());
        assert_eq!(no_type.payload().to_data().unwrap(), json!({"html": "no type"}));

        let numeric = doc.blocks.get(1).unwrap();
        assert_eq!(numeric.id().as_str(), "m2");
        assert_eq!(numeric.type_tag(), "7");
        assert!(numeric.payload().is_opaque());

        let missing_id = doc.blocks.get(2).unwrap();
        assert!(!missing_id.id().as_str().is_empty());
        assert_eq!(missing_id.kind(), Some(BlockKind::Separator));

        let sibling = doc.blocks.get(3).unwrap();
        assert_eq!(sibling.id().as_str(), "ok");
        assert_eq!(sibling.kind(), Some(BlockKind::NarrativeText));
        assert_eq!(sibling.payload().summary_text(), "Fine");
    }

    #[test]
    fn test_malformed_exercise_records_are_salvaged() {
        let mut value = exercise_json();
        value["exercise_data"]["blocks"][0]["id"] = json!(99);
        value["exercise_data"]["blocks"][1]["points"] = json!("many");
        let record: ExerciseRecord = serde_json::from_value(value).unwrap();

        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Exercise(record));
        let ids = doc.blocks.ids();
        assert_eq!(ids.len(), 2);
        assert!(!ids[0].as_str().is_empty());
        assert_eq!(ids[1].as_str(), "q2");
        assert_eq!(doc.blocks.get(0).unwrap().kind(), Some(BlockKind::SingleChoice));
        assert_eq!(doc.blocks.get(1).unwrap().points(), Some(0));
    }

    #[test]
    fn test_large_order_values_are_not_truncated() {
        let mut value = exercise_json();
        value["exercise_data"]["blocks"][0]["order"] = json!(u64::from(u32::MAX) + 1);
        let record: ExerciseRecord = serde_json::from_value(value).unwrap();
        assert_eq!(u64::try_from(record.exercise_data.blocks[0].order).unwrap(), 1 << 32);

        let doc = deserialize_document(None, DocumentStatus::Draft, DocumentContent::Exercise(record));
        assert_eq!(doc.blocks.get(0).unwrap().id().as_str(), "q2");

        let DocumentContent::Exercise(saved) = serialize_document(&doc, &registry()).unwrap() else {
            panic!("expected an exercise");
        };
        let orders: Vec<_> = saved.exercise_data.blocks.iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1]);
    }

    #[test]
    fn test_content_tagging() {
        let record: LessonRecord = serde_json::from_value(lesson_json()).unwrap();
        let value = serde_json::to_value(DocumentContent::Lesson(record)).unwrap();
        assert_eq!(value["kind"], "lesson");
        assert_eq!(value["body"]["title"], "Photosynthesis");
    }
}
