//! The block variant registry.
//!
//! Maps each [`BlockKind`] to a [`KindSpec`]: how to build a default
//! payload, how to validate it, and how many points it is worth. Nothing
//! else in the editor switches on kinds, so adding a kind means adding a
//! payload variant and one entry here.

use std::collections::HashMap;

use crate::block::{Block, BlockId, BlockKind, Family};
use crate::payload::{
    BlockPayload, Choice, CollapsibleSection, CrossDocumentLink, DragToTarget, EmbeddedVideo,
    Flashcard, Image, InformationCallout, MatchPair, MultiChoice, NarrativeText, PairMatching,
    ReorderSequence, Separator, SingleChoice, Timeline, TrueFalse,
};
use crate::validation::{
    Rules, ValidationResult, MIN_CHOICE_OPTIONS, MIN_MATCH_PAIRS, MIN_SEQUENCE_ITEMS,
};
use crate::{BlockError, BlockResult};

/// Builds a kind's default payload.
pub type PayloadFactory = fn() -> BlockPayload;

/// Full confirm-time validation.
pub type Validator = fn(&BlockPayload) -> ValidationResult;

/// The non-empty rule used when pruning at save time.
pub type ContentCheck = fn(&BlockPayload) -> bool;

/// Everything the editor needs to know about one kind.
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub kind: BlockKind,
    pub default_payload: PayloadFactory,
    pub validator: Validator,
    pub has_content: ContentCheck,
    /// `Some` for exercise kinds
    pub default_points: Option<u32>,
}

/// Builds a `KindSpec` whose payload variant shares the kind's name.
macro_rules! kind_spec {
    ($kind:ident, $default:expr, $points:expr) => {
        KindSpec {
            kind: BlockKind::$kind,
            default_payload: || BlockPayload::$kind($default),
            validator: |payload| match payload {
                BlockPayload::$kind(p) => p.validate(),
                other => ValidationResult::mismatch(BlockKind::$kind, other),
            },
            has_content: |payload| match payload {
                BlockPayload::$kind(p) => p.required_content().ok,
                _ => false,
            },
            default_points: $points,
        }
    };
}

/// Catalog of block kinds.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    specs: HashMap<BlockKind, KindSpec>,
}

impl BlockRegistry {
    /// Creates a registry with no kinds.
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    /// Creates the registry with every built-in kind.
    pub fn standard() -> Self {
        let mut registry = Self::empty();

        // Lesson kinds
        registry.register(kind_spec!(NarrativeText, NarrativeText::default(), None));
        registry.register(kind_spec!(InformationCallout, InformationCallout::default(), None));
        registry.register(kind_spec!(Image, Image::default(), None));
        registry.register(kind_spec!(CollapsibleSection, CollapsibleSection::default(), None));
        registry.register(kind_spec!(Timeline, Timeline::default(), None));
        registry.register(kind_spec!(Separator, Separator::default(), None));
        registry.register(kind_spec!(EmbeddedVideo, EmbeddedVideo::default(), None));
        registry.register(kind_spec!(CrossDocumentLink, CrossDocumentLink::default(), None));

        // Exercise kinds
        registry.register(kind_spec!(Flashcard, Flashcard::default(), Some(5)));
        registry.register(kind_spec!(TrueFalse, TrueFalse::default(), Some(3)));
        registry.register(kind_spec!(
            SingleChoice,
            SingleChoice(Choice::with_blank_options(MIN_CHOICE_OPTIONS)),
            Some(5)
        ));
        registry.register(kind_spec!(
            MultiChoice,
            MultiChoice(Choice::with_blank_options(MIN_CHOICE_OPTIONS)),
            Some(10)
        ));
        registry.register(kind_spec!(
            ReorderSequence,
            ReorderSequence {
                prompt: String::new(),
                items: vec![String::new(); MIN_SEQUENCE_ITEMS],
            },
            Some(10)
        ));
        registry.register(kind_spec!(DragToTarget, DragToTarget::default(), Some(15)));
        registry.register(kind_spec!(
            PairMatching,
            PairMatching {
                prompt: String::new(),
                pairs: vec![MatchPair::default(); MIN_MATCH_PAIRS],
            },
            Some(10)
        ));

        registry
    }

    /// Registers (or replaces) a kind.
    pub fn register(&mut self, spec: KindSpec) -> Option<KindSpec> {
        tracing::trace!("Registering block kind {}", spec.kind);
        self.specs.insert(spec.kind, spec)
    }

    /// Returns the spec for a kind.
    pub fn spec(&self, kind: BlockKind) -> BlockResult<&KindSpec> {
        self.specs
            .get(&kind)
            .ok_or_else(|| BlockError::UnknownKind(kind.as_str().to_string()))
    }

    /// Looks up a kind by its persisted tag.
    pub fn lookup(&self, tag: &str) -> BlockResult<&KindSpec> {
        self.spec(tag.parse()?)
    }

    /// Returns true if the kind is registered.
    pub fn contains(&self, kind: BlockKind) -> bool {
        self.specs.contains_key(&kind)
    }

    /// Creates a block with a fresh id and the kind's default payload.
    pub fn create(&self, kind: BlockKind) -> BlockResult<Block> {
        let spec = self.spec(kind)?;
        Ok(Block::new(
            BlockId::new(),
            (spec.default_payload)(),
            spec.default_points,
        ))
    }

    /// Runs the kind's full validator. Opaque blocks always pass.
    pub fn validate(&self, block: &Block) -> ValidationResult {
        let Some(kind) = block.kind() else {
            return ValidationResult::pass();
        };
        match self.spec(kind) {
            Ok(spec) => (spec.validator)(block.payload()),
            Err(e) => ValidationResult::fail(e.to_string()),
        }
    }

    /// Runs the kind's non-empty rule. Opaque blocks always pass.
    pub fn has_content(&self, block: &Block) -> bool {
        match block.kind() {
            None => true,
            Some(kind) => self
                .spec(kind)
                .map(|spec| (spec.has_content)(block.payload()))
                .unwrap_or(false),
        }
    }

    /// Returns the default points for a kind (exercise kinds only).
    pub fn default_points(&self, kind: BlockKind) -> Option<u32> {
        self.specs.get(&kind).and_then(|s| s.default_points)
    }

    /// Overrides the default points of an exercise kind.
    pub fn set_default_points(&mut self, kind: BlockKind, points: u32) -> BlockResult<()> {
        let spec = self
            .specs
            .get_mut(&kind)
            .ok_or_else(|| BlockError::UnknownKind(kind.as_str().to_string()))?;
        if spec.default_points.is_none() {
            return Err(BlockError::NotAnExercise(kind.as_str().to_string()));
        }
        spec.default_points = Some(points);
        Ok(())
    }

    /// Returns the registered kinds of a family, in catalog order.
    pub fn kinds(&self, family: Family) -> Vec<BlockKind> {
        BlockKind::ALL
            .into_iter()
            .filter(|k| k.family() == family && self.contains(*k))
            .collect()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::EntryList;

    #[test]
    fn test_default_points() {
        let registry = BlockRegistry::standard();
        let expected = [
            (BlockKind::Flashcard, 5),
            (BlockKind::TrueFalse, 3),
            (BlockKind::SingleChoice, 5),
            (BlockKind::MultiChoice, 10),
            (BlockKind::ReorderSequence, 10),
            (BlockKind::DragToTarget, 15),
            (BlockKind::PairMatching, 10),
        ];
        for (kind, points) in expected {
            assert_eq!(registry.default_points(kind), Some(points), "{kind}");
        }
        assert_eq!(registry.default_points(BlockKind::Image), None);
    }

    #[test]
    fn test_point_override() {
        let mut registry = BlockRegistry::standard();
        registry.set_default_points(BlockKind::Flashcard, 8).unwrap();
        assert_eq!(registry.create(BlockKind::Flashcard).unwrap().points(), Some(8));
        assert!(registry.set_default_points(BlockKind::Image, 8).is_err());
    }

    #[test]
    fn test_lookup_by_tag() {
        let registry = BlockRegistry::standard();
        assert_eq!(registry.lookup("pair-matching").unwrap().kind, BlockKind::PairMatching);
        assert!(matches!(
            registry.lookup("slideshow"),
            Err(BlockError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_choice_defaults_sit_at_the_floor() {
        let registry = BlockRegistry::standard();
        let block = registry.create(BlockKind::SingleChoice).unwrap();
        assert_eq!(block.payload().entry_count(EntryList::Options), Some(2));
    }

    #[test]
    fn test_validate_dispatches_by_kind() {
        let registry = BlockRegistry::standard();
        let mut block = registry.create(BlockKind::NarrativeText).unwrap();
        assert!(!registry.validate(&block).ok);

        block
            .payload_mut()
            .merge(&serde_json::json!({ "html": "Hello" }))
            .unwrap();
        assert!(registry.validate(&block).ok);
        assert!(registry.has_content(&block));
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let registry = BlockRegistry::empty();
        assert!(registry.create(BlockKind::Image).is_err());
        assert!(registry.kinds(Family::Lesson).is_empty());
    }

    #[test]
    fn test_kinds_by_family() {
        let registry = BlockRegistry::standard();
        assert_eq!(registry.kinds(Family::Lesson).len(), 8);
        assert_eq!(registry.kinds(Family::Exercise).len(), 7);
        assert_eq!(registry.kinds(Family::Exercise)[0], BlockKind::Flashcard);
    }

    #[test]
    fn test_opaque_blocks_pass() {
        let registry = BlockRegistry::standard();
        let payload = BlockPayload::from_data("quiz-v2", serde_json::json!({ "q": 1 }));
        let block = Block::new(BlockId::from("x"), payload, Some(4));
        assert!(registry.validate(&block).ok);
        assert!(registry.has_content(&block));
    }
}
