//! # Blockdeck Blocks
//!
//! The data structures behind a block document: the closed set of block
//! kinds, their payloads, the registry that creates and validates them,
//! the reorder engine and the undo history.
//!
//! ## Layers
//!
//! - [`BlockKind`] / [`BlockPayload`]: a closed tagged union, one variant per kind,
//!   plus an opaque passthrough for data this build does not understand
//! - [`BlockRegistry`]: kind → default payload, validator, non-empty rule, points
//! - [`reorder`]: pure index permutations
//! - [`History`]: linear undo/redo over whole snapshots
//! - [`BlockList`]: a structurally shared snapshot of a document's blocks
//!
//! Nothing in this crate performs I/O.

mod block;
mod history;
mod list;
mod payload;
pub mod registry;
pub mod reorder;
pub mod validation;

pub use block::{Block, BlockId, BlockKind, Family};
pub use history::{History, DEFAULT_HISTORY_LIMIT};
pub use list::BlockList;
pub use payload::{
    BlockPayload, CalloutVariant, Choice, CollapsibleSection, CrossDocumentLink, DragItem,
    DragToTarget, DropTarget, EmbeddedVideo, EntryList, Flashcard, Image, InformationCallout,
    MatchPair, MultiChoice, NarrativeText, PairMatching, ReorderSequence, Separator,
    SeparatorStyle, SingleChoice, Timeline, TimelineStep, TrueFalse,
};
pub use registry::{BlockRegistry, KindSpec};
pub use validation::{Rules, ValidationResult};

/// Result type for block operations
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors that can occur while creating or editing blocks
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("Unknown block kind: {0}")]
    UnknownKind(String),

    #[error("{kind} blocks need at least {min} {list}")]
    ConstraintViolation {
        kind: BlockKind,
        list: EntryList,
        min: usize,
    },

    #[error("{kind} blocks have no {list}")]
    UnsupportedList { kind: String, list: EntryList },

    #[error("No {list} entry at index {index}")]
    EntryOutOfRange { list: EntryList, index: usize },

    #[error("Patch must be a JSON object")]
    PatchNotObject,

    #[error("Patch does not fit a {kind} payload: {source}")]
    InvalidPatch {
        kind: String,
        source: serde_json::Error,
    },

    #[error("{0} blocks do not carry points")]
    NotAnExercise(String),

    #[error("Payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BlockError {
    /// Returns true if the error is a rejected structural floor.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, BlockError::ConstraintViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creates_fresh_blocks() {
        let registry = BlockRegistry::standard();
        let a = registry.create(BlockKind::NarrativeText).unwrap();
        let b = registry.create(BlockKind::NarrativeText).unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(a.type_tag(), "narrative-text");
        assert!(a.points().is_none());
    }

    #[test]
    fn test_exercise_blocks_carry_points() {
        let registry = BlockRegistry::standard();
        let block = registry.create(BlockKind::DragToTarget).unwrap();
        assert_eq!(block.points(), Some(15));
    }

    #[test]
    fn test_default_blocks_are_empty() {
        let registry = BlockRegistry::standard();
        for kind in BlockKind::ALL {
            let block = registry.create(kind).unwrap();
            let expected = kind == BlockKind::Separator;
            assert_eq!(registry.has_content(&block), expected, "{kind}");
        }
    }

    #[test]
    fn test_constraint_violation_flag() {
        let err = BlockError::ConstraintViolation {
            kind: BlockKind::SingleChoice,
            list: EntryList::Options,
            min: 2,
        };
        assert!(err.is_constraint_violation());
        assert_eq!(err.to_string(), "single-choice blocks need at least 2 options");
    }
}
