//! # Blockdeck Core
//!
//! Editing sessions for block documents: lessons and exercises.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   DocumentController                     │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────────┐  │
//! │  │ EditState    │ │ History      │ │ EventBus         │  │
//! │  │ Idle/Editing │ │ of BlockList │ │ DocumentEvent    │  │
//! │  └──────────────┘ └──────────────┘ └──────────────────┘  │
//! │          │ BlockRegistry (create, validate, prune)       │
//! └──────────┼───────────────────────────────────────────────┘
//!            │ serialize / deserialize (persist)
//!            ▼
//!      DocumentStore (load / create / update)
//! ```
//!
//! The controller never blocks: storage calls are awaited at the save and
//! load boundary only, and a save works on an owned snapshot so editing can
//! continue while it is in flight.

pub mod command;
pub mod config;
pub mod controller;
pub mod document;
pub mod event;
pub mod persist;
pub mod storage;

pub use command::{BlockRef, Command, CommandDispatcher, CommandOutcome, ScriptReport};
pub use config::Config;
pub use controller::{DocumentController, EditState, SaveRequest};
pub use document::{Document, DocumentId, DocumentMeta, DocumentStatus, ExerciseMeta, LessonMeta};
pub use event::{DocumentEvent, EventBus, EventHandler};
pub use persist::DocumentContent;
pub use storage::{DocumentStore, FileStore, MemoryStore, StoreError, StoreResult, StoredDocument};

use blockdeck_blocks::{BlockError, BlockId, BlockKind, Family};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No block is open for editing")]
    NoOpenBlock,

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("{kind} blocks cannot be added to a {family} document")]
    WrongFamily { kind: BlockKind, family: Family },

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl CoreError {
    /// Returns true for operations rejected because they would break a
    /// structural rule. The document is unchanged when this is returned.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            CoreError::Block(e) => e.is_constraint_violation(),
            CoreError::WrongFamily { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the error came from the storage collaborator.
    pub fn is_persistence(&self) -> bool {
        matches!(self, CoreError::Persistence(_))
    }
}
