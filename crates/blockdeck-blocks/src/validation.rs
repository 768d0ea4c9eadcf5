//! Per-kind validation rules.
//!
//! Each payload type implements [`Rules`] with two parts:
//!
//! - `required_content`: the non-empty rule. Save-time pruning uses only this.
//! - `structure`: everything else (option counts, correct answers, links).
//!
//! A confirm runs both. Rules are pure and never touch I/O.

use serde::Serialize;

use crate::block::BlockKind;
use crate::payload::{
    BlockPayload, CollapsibleSection, CrossDocumentLink, DragToTarget, EmbeddedVideo, Flashcard,
    Image, InformationCallout, MultiChoice, NarrativeText, PairMatching, ReorderSequence,
    Separator, SingleChoice, Timeline, TrueFalse,
};

/// Single- and multi-choice blocks need this many options.
pub const MIN_CHOICE_OPTIONS: usize = 2;
/// Reorder-sequence blocks need this many items.
pub const MIN_SEQUENCE_ITEMS: usize = 2;
/// Pair-matching blocks need this many pairs.
pub const MIN_MATCH_PAIRS: usize = 2;

/// What an editor leaves behind after clearing a rich-text field.
pub const EMPTY_PARAGRAPH_SENTINELS: [&str; 4] =
    ["<p></p>", "<p><br></p>", "<p><br/></p>", "<p><br /></p>"];

/// Outcome of validating one block. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn pass() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    /// A failing result with a user-facing message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }

    /// Failure for a payload handed to the wrong kind's validator.
    pub fn mismatch(expected: BlockKind, payload: &BlockPayload) -> Self {
        Self::fail(format!(
            "A {} payload cannot be checked as {}",
            payload.type_tag(),
            expected
        ))
    }

    /// Returns `self` if it failed, otherwise evaluates `next`.
    pub fn and_then(self, next: impl FnOnce() -> ValidationResult) -> Self {
        if self.ok { next() } else { self }
    }
}

/// Returns true for whitespace-only text.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Returns true for blank HTML, including empty-paragraph sentinels.
pub fn is_blank_html(html: &str) -> bool {
    let trimmed = html.trim();
    trimmed.is_empty()
        || EMPTY_PARAGRAPH_SENTINELS
            .iter()
            .any(|s| trimmed.eq_ignore_ascii_case(s))
}

fn require(text: &str, message: &str) -> ValidationResult {
    if is_blank(text) {
        ValidationResult::fail(message)
    } else {
        ValidationResult::pass()
    }
}

fn require_prompt(prompt: &str) -> ValidationResult {
    require(prompt, "A question prompt is required")
}

fn require_at_least(count: usize, min: usize, what: &str) -> ValidationResult {
    if count < min {
        ValidationResult::fail(format!("At least {min} {what} are required"))
    } else {
        ValidationResult::pass()
    }
}

/// Validation rules for one payload type.
pub trait Rules {
    /// The non-empty rule: is there anything worth saving?
    fn required_content(&self) -> ValidationResult;

    /// Structural rules checked at confirm time.
    fn structure(&self) -> ValidationResult {
        ValidationResult::pass()
    }

    /// Full validation: required content, then structure.
    fn validate(&self) -> ValidationResult {
        self.required_content().and_then(|| self.structure())
    }
}

// ==================== Lesson rules ====================

impl Rules for NarrativeText {
    fn required_content(&self) -> ValidationResult {
        if is_blank_html(&self.html) {
            ValidationResult::fail("Text content is required")
        } else {
            ValidationResult::pass()
        }
    }
}

impl Rules for InformationCallout {
    fn required_content(&self) -> ValidationResult {
        require(&self.title, "A callout title is required")
    }
}

impl Rules for Image {
    fn required_content(&self) -> ValidationResult {
        require(&self.url, "An image URL is required")
    }
}

impl Rules for CollapsibleSection {
    fn required_content(&self) -> ValidationResult {
        require(&self.title, "A section title is required")
    }
}

impl Rules for Timeline {
    fn required_content(&self) -> ValidationResult {
        if self.steps.is_empty() {
            ValidationResult::fail("A timeline needs at least one step")
        } else {
            ValidationResult::pass()
        }
    }
}

impl Rules for Separator {
    fn required_content(&self) -> ValidationResult {
        ValidationResult::pass()
    }
}

impl Rules for EmbeddedVideo {
    fn required_content(&self) -> ValidationResult {
        require(&self.url, "A video URL is required")
    }
}

impl Rules for CrossDocumentLink {
    fn required_content(&self) -> ValidationResult {
        require(&self.target_id, "A linked document is required")
            .and_then(|| require(&self.title, "A link title is required"))
    }
}

// ==================== Exercise rules ====================

impl Rules for Flashcard {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }
}

impl Rules for TrueFalse {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }
}

fn correct_indices_in_range(correct: &[usize], options: usize) -> ValidationResult {
    match correct.iter().find(|&&i| i >= options) {
        Some(i) => ValidationResult::fail(format!("Correct answer {i} is not an option")),
        None => ValidationResult::pass(),
    }
}

impl Rules for SingleChoice {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }

    fn structure(&self) -> ValidationResult {
        require_at_least(self.options.len(), MIN_CHOICE_OPTIONS, "options")
            .and_then(|| correct_indices_in_range(&self.correct, self.options.len()))
            .and_then(|| {
                if self.correct.len() == 1 {
                    ValidationResult::pass()
                } else {
                    ValidationResult::fail("Exactly one correct answer must be marked")
                }
            })
    }
}

impl Rules for MultiChoice {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }

    fn structure(&self) -> ValidationResult {
        require_at_least(self.options.len(), MIN_CHOICE_OPTIONS, "options")
            .and_then(|| correct_indices_in_range(&self.correct, self.options.len()))
            .and_then(|| {
                if self.correct.is_empty() {
                    ValidationResult::fail("At least one correct answer must be marked")
                } else {
                    ValidationResult::pass()
                }
            })
    }
}

impl Rules for ReorderSequence {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }

    fn structure(&self) -> ValidationResult {
        require_at_least(self.items.len(), MIN_SEQUENCE_ITEMS, "items")
    }
}

impl Rules for DragToTarget {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }

    fn structure(&self) -> ValidationResult {
        let dangling = self
            .items
            .iter()
            .find(|item| !self.targets.iter().any(|t| t.id == item.target_id));
        match dangling {
            Some(item) => ValidationResult::fail(format!(
                "Item '{}' is not assigned to a target",
                item.label
            )),
            None => ValidationResult::pass(),
        }
    }
}

impl Rules for PairMatching {
    fn required_content(&self) -> ValidationResult {
        require_prompt(&self.prompt)
    }

    fn structure(&self) -> ValidationResult {
        require_at_least(self.pairs.len(), MIN_MATCH_PAIRS, "pairs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Choice, DragItem, DropTarget, MatchPair, TimelineStep};

    fn choice(options: usize, correct: &[usize]) -> Choice {
        Choice {
            prompt: "Which one?".to_string(),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            correct: correct.to_vec(),
        }
    }

    #[test]
    fn test_empty_paragraph_counts_as_empty() {
        for html in ["", "   ", "<p></p>", "<P><BR></P>", " <p><br /></p>\n"] {
            let text = NarrativeText {
                html: html.to_string(),
            };
            assert!(!text.validate().ok, "{html:?}");
        }
        let text = NarrativeText {
            html: "<p>Hi</p>".to_string(),
        };
        assert!(text.validate().ok);
    }

    #[test]
    fn test_failures_carry_messages() {
        let result = Image::default().validate();
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("An image URL is required"));
    }

    #[test]
    fn test_timeline_needs_a_step() {
        let mut timeline = Timeline::default();
        assert!(!timeline.validate().ok);
        timeline.steps.push(TimelineStep::default());
        assert!(timeline.validate().ok);
    }

    #[test]
    fn test_link_needs_target_and_title() {
        let mut link = CrossDocumentLink {
            target_id: "doc-7".to_string(),
            title: String::new(),
        };
        assert!(!link.validate().ok);
        link.title = "Next chapter".to_string();
        assert!(link.validate().ok);
    }

    #[test]
    fn test_separator_always_passes() {
        assert!(Separator::default().validate().ok);
    }

    #[test]
    fn test_single_choice_needs_exactly_one_answer() {
        assert!(!SingleChoice(choice(3, &[])).validate().ok);
        assert!(!SingleChoice(choice(3, &[0, 1])).validate().ok);
        assert!(!SingleChoice(choice(1, &[0])).validate().ok);
        assert!(!SingleChoice(choice(3, &[5])).validate().ok);
        assert!(SingleChoice(choice(2, &[1])).validate().ok);
    }

    #[test]
    fn test_multi_choice_needs_an_answer() {
        assert!(!MultiChoice(choice(3, &[])).validate().ok);
        assert!(MultiChoice(choice(3, &[0, 2])).validate().ok);
    }

    #[test]
    fn test_prompt_is_the_non_empty_rule() {
        let mut c = choice(3, &[]);
        c.prompt = "  ".to_string();
        let single = SingleChoice(c);
        assert!(!single.required_content().ok);
        assert_eq!(
            single.validate().message.as_deref(),
            Some("A question prompt is required")
        );
    }

    #[test]
    fn test_pairs_and_items_floor() {
        let mut pairs = PairMatching {
            prompt: "Match".to_string(),
            pairs: vec![MatchPair::default()],
        };
        assert!(!pairs.validate().ok);
        pairs.pairs.push(MatchPair::default());
        assert!(pairs.validate().ok);

        let sequence = ReorderSequence {
            prompt: "Order".to_string(),
            items: vec!["one".to_string()],
        };
        assert!(!sequence.validate().ok);
    }

    #[test]
    fn test_drag_items_must_hit_a_target() {
        let mut drag = DragToTarget {
            prompt: "Sort the animals".to_string(),
            targets: vec![DropTarget {
                id: "t1".to_string(),
                label: "Mammals".to_string(),
            }],
            items: vec![DragItem {
                label: "Whale".to_string(),
                target_id: String::new(),
            }],
        };
        assert!(!drag.validate().ok);
        drag.items[0].target_id = "t1".to_string();
        assert!(drag.validate().ok);
    }
}
