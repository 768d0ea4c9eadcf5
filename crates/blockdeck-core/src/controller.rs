//! The document controller.
//!
//! ## Learning: The Facade Pattern
//!
//! `DocumentController` is the only thing a view talks to. It owns the
//! undo history, the edit state and the event bus, and every user action is
//! one method call that runs to completion before the next.
//!
//! ## Drafts and history
//!
//! History only ever holds committed block lists. The open block's
//! in-progress payload lives in [`EditState::Editing`] as a draft and is
//! overlaid on the committed list when the live document is read. Confirm
//! writes the draft into a new commit; cancel or auto-close drops it.

use std::collections::HashSet;
use std::sync::Arc;

use blockdeck_blocks::{
    Block, BlockId, BlockKind, BlockList, BlockRegistry, EntryList, Family, History,
    ValidationResult,
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::EditorConfig;
use crate::document::{Document, DocumentId, DocumentMeta, DocumentStatus, LessonMeta};
use crate::event::{DocumentEvent, EventBus};
use crate::persist::{self, DocumentContent};
use crate::storage::{DocumentStore, StoreResult, StoredDocument};
use crate::{CoreError, CoreResult};

/// At most one block is open for editing at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditState {
    #[default]
    Idle,
    Editing {
        block_id: BlockId,
        /// Committed block at selection time; `None` if it was never confirmed
        original: Option<Block>,
        /// Uncommitted payload being edited
        draft: Block,
    },
}

impl EditState {
    /// Returns the open block's id.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            EditState::Idle => None,
            EditState::Editing { block_id, .. } => Some(block_id),
        }
    }
}

/// An owned snapshot of a document, ready to hand to a store.
///
/// Nothing in here borrows from the controller, so the controller stays
/// editable while the request is awaited.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    id: Option<DocumentId>,
    record: StoredDocument,
}

impl SaveRequest {
    /// Writes the snapshot: update if the document exists, create otherwise.
    pub async fn send(&self, store: &dyn DocumentStore) -> StoreResult<DocumentId> {
        match &self.id {
            Some(id) => {
                store.update_document(id, &self.record).await?;
                Ok(id.clone())
            }
            None => store.create_document(&self.record).await,
        }
    }
}

/// Editing session for one document.
pub struct DocumentController {
    /// Block kinds, validators and defaults
    registry: Arc<BlockRegistry>,

    /// Store id, once the document has been created
    id: Option<DocumentId>,

    title: String,
    status: DocumentStatus,
    meta: DocumentMeta,

    /// Committed block lists
    history: History<BlockList>,

    /// Open block, if any
    edit: EditState,

    /// Blocks that have been confirmed (or loaded) at least once
    saved: HashSet<BlockId>,

    /// Block added by the most recent commit
    last_added: Option<BlockId>,

    /// Whether `add_block` opens the new block
    open_new_blocks: bool,

    /// Event bus for notifications
    event_bus: EventBus,
}

impl DocumentController {
    /// Starts a session on `document`. Its blocks count as saved.
    pub fn new(document: Document, registry: Arc<BlockRegistry>) -> Self {
        let Document {
            id,
            title,
            status,
            meta,
            blocks,
        } = document;

        Self {
            registry,
            id,
            title,
            status,
            meta,
            saved: blocks.ids().into_iter().collect(),
            history: History::new(blocks),
            edit: EditState::Idle,
            last_added: None,
            open_new_blocks: true,
            event_bus: EventBus::new(),
        }
    }

    /// Applies editor settings. Clears the undo history.
    pub fn with_config(mut self, config: &EditorConfig) -> Self {
        let present = self.history.present().clone();
        self.history = History::with_limit(present, config.history_limit);
        self.open_new_blocks = config.open_new_blocks;
        self
    }

    /// Loads a stored document and starts a session on it.
    pub async fn load(
        store: &dyn DocumentStore,
        id: &DocumentId,
        registry: Arc<BlockRegistry>,
    ) -> CoreResult<Self> {
        let stored = store.load_document(id).await?;
        let document = persist::deserialize_document(Some(id.clone()), stored.status, stored.content);
        tracing::info!(
            "Loaded document {} ({} blocks)",
            id,
            document.blocks.len()
        );
        Ok(Self::new(document, registry))
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn family(&self) -> Family {
        self.meta.family()
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Returns the committed blocks, without the open draft.
    pub fn committed_blocks(&self) -> &BlockList {
        self.history.present()
    }

    /// Returns the live blocks: committed blocks with the open draft overlaid.
    pub fn blocks(&self) -> BlockList {
        let present = self.history.present();
        match &self.edit {
            EditState::Editing { draft, .. } => present
                .replaced(draft.clone())
                .unwrap_or_else(|| present.clone()),
            EditState::Idle => present.clone(),
        }
    }

    /// Returns the live document.
    pub fn document(&self) -> Document {
        Document {
            id: self.id.clone(),
            title: self.title.clone(),
            status: self.status,
            meta: self.meta.clone(),
            blocks: self.blocks(),
        }
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// Returns the id of the open block.
    pub fn open_block_id(&self) -> Option<&BlockId> {
        self.edit.block_id()
    }

    /// Returns the open block's draft.
    pub fn open_draft(&self) -> Option<&Block> {
        match &self.edit {
            EditState::Editing { draft, .. } => Some(draft),
            EditState::Idle => None,
        }
    }

    /// Returns true if the open draft differs from the committed block.
    pub fn is_dirty(&self) -> bool {
        match &self.edit {
            EditState::Editing { block_id, draft, .. } => {
                self.history.present().find(block_id) != Some(draft)
            }
            EditState::Idle => false,
        }
    }

    /// Returns true if the block has been confirmed or loaded.
    pub fn is_saved(&self, id: &BlockId) -> bool {
        self.saved.contains(id)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    /// Subscribes to document events.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentEvent> {
        self.event_bus.subscribe()
    }

    // ==================== Block Operations ====================

    /// Appends a new block of `kind` and commits. Opens it unless disabled.
    pub fn add_block(&mut self, kind: BlockKind) -> CoreResult<BlockId> {
        let family = self.family();
        if kind.family() != family {
            return Err(CoreError::WrongFamily { kind, family });
        }

        let block = self.registry.create(kind)?;
        let id = block.id().clone();

        self.close_edit();
        let next = self.history.present().pushed(block.clone());
        self.commit(next);
        self.last_added = Some(id.clone());

        if self.open_new_blocks {
            self.edit = EditState::Editing {
                block_id: id.clone(),
                original: None,
                draft: block,
            };
        }

        tracing::debug!("Added {} block {}", kind, id);
        self.emit(DocumentEvent::BlockAdded(id.clone()));
        Ok(id)
    }

    /// Opens a block for editing, closing any other open block.
    pub fn open_block(&mut self, id: &BlockId) -> CoreResult<()> {
        if self.open_block_id() == Some(id) {
            return Ok(());
        }

        let block = self
            .history
            .present()
            .find(id)
            .cloned()
            .ok_or_else(|| CoreError::BlockNotFound(id.clone()))?;

        self.close_edit();
        let original = self.saved.contains(id).then(|| block.clone());
        self.edit = EditState::Editing {
            block_id: id.clone(),
            original,
            draft: block,
        };

        tracing::debug!("Opened block {}", id);
        self.emit(DocumentEvent::BlockOpened(id.clone()));
        Ok(())
    }

    /// Merges a partial payload into the open block's draft.
    pub fn update_open_block(&mut self, patch: &Value) -> CoreResult<()> {
        let draft = self.draft_mut()?;
        draft.payload_mut().merge(patch)?;
        let id = draft.id().clone();
        self.emit(DocumentEvent::BlockUpdated(id));
        Ok(())
    }

    /// Sets the open exercise block's points.
    pub fn set_open_block_points(&mut self, points: u32) -> CoreResult<()> {
        let draft = self.draft_mut()?;
        draft.set_points(points)?;
        let id = draft.id().clone();
        self.emit(DocumentEvent::BlockUpdated(id));
        Ok(())
    }

    /// Appends a blank entry to one of the open block's lists.
    pub fn add_open_block_entry(&mut self, list: EntryList) -> CoreResult<usize> {
        let draft = self.draft_mut()?;
        let index = draft.payload_mut().add_entry(list)?;
        let id = draft.id().clone();
        self.emit(DocumentEvent::BlockUpdated(id));
        Ok(index)
    }

    /// Removes an entry from one of the open block's lists.
    ///
    /// Removing below the kind's floor is rejected and the draft is unchanged.
    pub fn remove_open_block_entry(&mut self, list: EntryList, index: usize) -> CoreResult<()> {
        let draft = self.draft_mut()?;
        draft.payload_mut().remove_entry(list, index)?;
        let id = draft.id().clone();
        self.emit(DocumentEvent::BlockUpdated(id));
        Ok(())
    }

    /// Validates the open block and commits it if it passes.
    ///
    /// A failing block stays open with its draft intact; the result carries
    /// the message to show.
    pub fn confirm_open_block(&mut self) -> CoreResult<ValidationResult> {
        let EditState::Editing { block_id, draft, .. } = &self.edit else {
            return Err(CoreError::NoOpenBlock);
        };

        let result = self.registry.validate(draft);
        if !result.ok {
            let message = result.message.clone().unwrap_or_default();
            tracing::debug!("Block {} failed validation: {}", block_id, message);
            let block_id = block_id.clone();
            self.emit(DocumentEvent::ValidationFailed { block_id, message });
            return Ok(result);
        }

        let next = self
            .history
            .present()
            .replaced(draft.clone())
            .ok_or_else(|| CoreError::BlockNotFound(block_id.clone()))?;
        let block_id = block_id.clone();

        self.commit(next);
        self.saved.insert(block_id.clone());
        self.edit = EditState::Idle;

        tracing::debug!("Confirmed block {}", block_id);
        self.emit(DocumentEvent::BlockConfirmed(block_id));
        Ok(result)
    }

    /// Abandons the open edit.
    ///
    /// A block that was never confirmed is removed entirely. If it was added
    /// by the latest commit, that commit is retracted so no history entry is
    /// left behind.
    pub fn cancel_open_block(&mut self) -> CoreResult<()> {
        let EditState::Editing {
            block_id, original, ..
        } = std::mem::take(&mut self.edit)
        else {
            return Err(CoreError::NoOpenBlock);
        };

        if original.is_none() {
            if self.last_added.as_ref() == Some(&block_id) && self.history.retract() {
                self.last_added = None;
            } else if let Some(next) = self.history.present().removed(&block_id) {
                self.history.amend(next);
            }
            self.remember_exercise_type();
        }

        tracing::debug!("Cancelled edit of block {}", block_id);
        self.emit(DocumentEvent::BlockCancelled(block_id));
        Ok(())
    }

    /// Removes a block and commits. Closes it if it was open.
    pub fn delete_block(&mut self, id: &BlockId) -> CoreResult<()> {
        let next = self
            .history
            .present()
            .removed(id)
            .ok_or_else(|| CoreError::BlockNotFound(id.clone()))?;

        if self.open_block_id() == Some(id) {
            self.edit = EditState::Idle;
        }
        self.commit(next);

        tracing::debug!("Deleted block {}", id);
        self.emit(DocumentEvent::BlockDeleted(id.clone()));
        Ok(())
    }

    // ==================== Reordering ====================

    /// Moves block `from` to the position of block `to` and commits.
    ///
    /// Returns false without committing if either id is unknown or both are
    /// the same block.
    pub fn reorder(&mut self, from: &BlockId, to: &BlockId) -> bool {
        let present = self.history.present();
        match (present.position(from), present.position(to)) {
            (Some(from), Some(to)) => self.move_block(from, to),
            _ => {
                tracing::debug!("Ignoring reorder of unknown block {} -> {}", from, to);
                false
            }
        }
    }

    /// Moves the block at index `from` to index `to` and commits.
    ///
    /// Out-of-range indices are ignored.
    pub fn move_block(&mut self, from: usize, to: usize) -> bool {
        let present = self.history.present();
        if from == to || from >= present.len() || to >= present.len() {
            return false;
        }

        let next = present.moved(from, to);
        self.commit(next);

        tracing::debug!("Moved block {} -> {}", from, to);
        self.emit(DocumentEvent::BlocksReordered);
        true
    }

    /// Moves a block one place up. Returns false at the top.
    pub fn move_up(&mut self, id: &BlockId) -> CoreResult<bool> {
        let index = self.position_of(id)?;
        Ok(index > 0 && self.move_block(index, index - 1))
    }

    /// Moves a block one place down. Returns false at the bottom.
    pub fn move_down(&mut self, id: &BlockId) -> CoreResult<bool> {
        let index = self.position_of(id)?;
        Ok(self.move_block(index, index + 1))
    }

    fn position_of(&self, id: &BlockId) -> CoreResult<usize> {
        self.history
            .present()
            .position(id)
            .ok_or_else(|| CoreError::BlockNotFound(id.clone()))
    }

    // ==================== History ====================

    /// Steps back one commit, closing any open block.
    pub fn undo(&mut self) -> bool {
        self.close_edit();
        if !self.history.undo() {
            return false;
        }
        self.last_added = None;
        self.remember_exercise_type();
        self.emit(DocumentEvent::Undone);
        true
    }

    /// Steps forward one undone commit, closing any open block.
    pub fn redo(&mut self) -> bool {
        self.close_edit();
        if !self.history.redo() {
            return false;
        }
        self.last_added = None;
        self.remember_exercise_type();
        self.emit(DocumentEvent::Redone);
        true
    }

    // ==================== Metadata ====================

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.emit(DocumentEvent::MetadataChanged);
    }

    pub fn set_status(&mut self, status: DocumentStatus) {
        self.status = status;
        self.emit(DocumentEvent::MetadataChanged);
    }

    /// Returns lesson metadata, or `None` for an exercise.
    pub fn lesson_meta(&self) -> Option<&LessonMeta> {
        match &self.meta {
            DocumentMeta::Lesson(meta) => Some(meta),
            DocumentMeta::Exercise(_) => None,
        }
    }

    /// Replaces lesson metadata. Returns false for an exercise.
    pub fn set_lesson_meta(&mut self, meta: LessonMeta) -> bool {
        let DocumentMeta::Lesson(current) = &mut self.meta else {
            return false;
        };
        *current = meta;
        self.emit(DocumentEvent::MetadataChanged);
        true
    }

    // ==================== Saving ====================

    /// Builds the persisted content of the live document.
    pub fn serialize_for_save(&self) -> CoreResult<DocumentContent> {
        persist::serialize_document(&self.document(), &self.registry)
    }

    /// Takes an owned snapshot to send to a store.
    pub fn prepare_save(&self) -> CoreResult<SaveRequest> {
        Ok(SaveRequest {
            id: self.id.clone(),
            record: StoredDocument {
                status: self.status,
                content: self.serialize_for_save()?,
            },
        })
    }

    /// Records the outcome of a sent [`SaveRequest`].
    ///
    /// On failure nothing but the event bus is touched, so the save can simply
    /// be retried.
    pub fn finish_save(&mut self, outcome: StoreResult<DocumentId>) -> CoreResult<DocumentId> {
        match outcome {
            Ok(id) => {
                tracing::info!("Saved document {}", id);
                self.id = Some(id.clone());
                self.emit(DocumentEvent::Saved(id.clone()));
                Ok(id)
            }
            Err(e) => {
                tracing::warn!("Save failed: {}", e);
                self.emit(DocumentEvent::SaveFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Prepares, sends and finishes a save.
    pub async fn save(&mut self, store: &dyn DocumentStore) -> CoreResult<DocumentId> {
        let request = self.prepare_save()?;
        let outcome = request.send(store).await;
        self.finish_save(outcome)
    }

    // ==================== Internals ====================

    fn draft_mut(&mut self) -> CoreResult<&mut Block> {
        match &mut self.edit {
            EditState::Editing { draft, .. } => Ok(draft),
            EditState::Idle => Err(CoreError::NoOpenBlock),
        }
    }

    fn commit(&mut self, next: BlockList) {
        self.history.commit(next);
        self.last_added = None;
        self.remember_exercise_type();
    }

    /// Drops the open draft. A never-confirmed block stays in the list.
    fn close_edit(&mut self) {
        if let EditState::Editing { block_id, .. } = std::mem::take(&mut self.edit) {
            tracing::debug!("Closed block {} without confirming", block_id);
        }
    }

    fn remember_exercise_type(&mut self) {
        if let DocumentMeta::Exercise(meta) = &mut self.meta {
            if let Some(first) = self.history.present().get(0) {
                meta.exercise_type = Some(first.type_tag().to_string());
            }
        }
    }

    fn emit(&self, event: DocumentEvent) {
        self.event_bus.emit(event);
    }
}
