//! A line-oriented command language for driving a controller.
//!
//! ## Learning: The Command Pattern
//!
//! Each user action is a `Command` value. Values can be parsed from text,
//! queued in a script and replayed, which is how the CLI edits documents
//! without a UI.
//!
//! ```text
//! add narrative-text
//! set {"html": "<p>Hello</p>"}
//! confirm
//! reorder #1 #3
//! save
//! ```
//!
//! Blocks are referenced by id or by `#N`, their 1-based position. Entry
//! indices in `remove-entry` are 1-based as well. Blank lines and lines
//! starting with `#` are ignored.

use std::fmt;
use std::str::FromStr;

use blockdeck_blocks::{BlockId, BlockKind, EntryList, ValidationResult};
use serde_json::Value;

use crate::controller::DocumentController;
use crate::document::{DocumentId, DocumentStatus};
use crate::storage::DocumentStore;
use crate::{CoreError, CoreResult};

/// Width of block previews in `list` output.
const PREVIEW_WIDTH: usize = 40;

/// A block reference: an id or a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    Id(BlockId),
    Position(usize),
}

impl BlockRef {
    /// Resolves the reference against the committed block order.
    pub fn resolve(&self, controller: &DocumentController) -> CoreResult<BlockId> {
        let blocks = controller.committed_blocks();
        match self {
            BlockRef::Id(id) if blocks.contains(id) => Ok(id.clone()),
            BlockRef::Position(n) if *n >= 1 => blocks
                .get(n - 1)
                .map(|b| b.id().clone())
                .ok_or_else(|| CoreError::BlockNotFound(BlockId::from(self.to_string()))),
            _ => Err(CoreError::BlockNotFound(BlockId::from(self.to_string()))),
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRef::Id(id) => write!(f, "{id}"),
            BlockRef::Position(n) => write!(f, "#{n}"),
        }
    }
}

impl FromStr for BlockRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('#') {
            Some(n) => n
                .parse()
                .map(BlockRef::Position)
                .map_err(|_| CoreError::InvalidCommand(format!("bad block position '{s}'"))),
            None if !s.is_empty() => Ok(BlockRef::Id(BlockId::from(s))),
            None => Err(CoreError::InvalidCommand("missing block reference".to_string())),
        }
    }
}

/// Editing commands.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Command {
    // Block commands
    Add { kind: BlockKind },
    Open { block: BlockRef },
    Set { patch: Value },
    Points { points: u32 },
    AddEntry { list: EntryList },
    RemoveEntry { list: EntryList, index: usize },
    Confirm,
    Cancel,
    Delete { block: BlockRef },

    // Ordering
    Reorder { from: BlockRef, to: BlockRef },
    MoveUp { block: BlockRef },
    MoveDown { block: BlockRef },

    // History
    Undo,
    Redo,

    // Document
    Title { title: String },
    Status { status: DocumentStatus },
    List,
    Save,
}

impl Command {
    /// Parses one script line. Returns `None` for blank lines and comments.
    pub fn parse(line: &str) -> CoreResult<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();
        let mut next = |what: &str| {
            args.next()
                .ok_or_else(|| CoreError::InvalidCommand(format!("{verb}: missing {what}")))
        };

        let command = match verb {
            "add" => Command::Add {
                kind: next("block kind")?.parse()?,
            },
            "open" => Command::Open {
                block: next("block")?.parse()?,
            },
            "set" => Command::Set {
                patch: serde_json::from_str(rest)
                    .map_err(|e| CoreError::InvalidCommand(format!("set: {e}")))?,
            },
            "points" => Command::Points {
                points: parse_number(next("points")?, verb)?,
            },
            "add-entry" => Command::AddEntry {
                list: parse_list(next("list")?)?,
            },
            "remove-entry" => {
                let list = parse_list(next("list")?)?;
                let position: usize = parse_number(next("index")?, verb)?;
                let index = position
                    .checked_sub(1)
                    .ok_or_else(|| CoreError::InvalidCommand("entry indices start at 1".to_string()))?;
                Command::RemoveEntry { list, index }
            }
            "confirm" => Command::Confirm,
            "cancel" => Command::Cancel,
            "delete" => Command::Delete {
                block: next("block")?.parse()?,
            },
            "reorder" => Command::Reorder {
                from: next("source block")?.parse()?,
                to: next("target block")?.parse()?,
            },
            "up" => Command::MoveUp {
                block: next("block")?.parse()?,
            },
            "down" => Command::MoveDown {
                block: next("block")?.parse()?,
            },
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "title" if !rest.is_empty() => Command::Title {
                title: rest.to_string(),
            },
            "title" => return Err(CoreError::InvalidCommand("title: missing text".to_string())),
            "status" => Command::Status {
                status: next("status")?
                    .parse()
                    .map_err(CoreError::InvalidCommand)?,
            },
            "list" => Command::List,
            "save" => Command::Save,
            other => return Err(CoreError::CommandNotFound(other.to_string())),
        };

        Ok(Some(command))
    }

    /// Returns the command's display name.
    pub fn display_name(&self) -> &str {
        match self {
            Command::Add { .. } => "Add Block",
            Command::Open { .. } => "Open Block",
            Command::Set { .. } => "Edit Block",
            Command::Points { .. } => "Set Points",
            Command::AddEntry { .. } => "Add Entry",
            Command::RemoveEntry { .. } => "Remove Entry",
            Command::Confirm => "Confirm",
            Command::Cancel => "Cancel",
            Command::Delete { .. } => "Delete Block",
            Command::Reorder { .. } => "Reorder",
            Command::MoveUp { .. } => "Move Up",
            Command::MoveDown { .. } => "Move Down",
            Command::Undo => "Undo",
            Command::Redo => "Redo",
            Command::Title { .. } => "Set Title",
            Command::Status { .. } => "Set Status",
            Command::List => "List Blocks",
            Command::Save => "Save",
        }
    }
}

fn parse_number<T: FromStr>(s: &str, verb: &str) -> CoreResult<T> {
    s.parse()
        .map_err(|_| CoreError::InvalidCommand(format!("{verb}: '{s}' is not a number")))
}

fn parse_list(s: &str) -> CoreResult<EntryList> {
    s.parse().map_err(CoreError::InvalidCommand)
}

/// What executing a command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    Added(BlockId),
    EntryAdded(usize),
    Validated(ValidationResult),
    /// Whether a reorder, undo or redo changed anything
    Changed(bool),
    Listing(Vec<String>),
    /// Saving is async and left to the caller
    SaveRequested,
}

/// Summary of a script run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptReport {
    /// Commands executed successfully
    pub executed: usize,
    /// Lines that failed to parse or execute
    pub failures: usize,
    /// Output and error lines, in order
    pub messages: Vec<String>,
    /// Id of the last successful save
    pub saved: Option<DocumentId>,
}

/// Executes commands against a controller.
#[derive(Debug, Clone, Default)]
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Executes a command.
    pub fn execute(&self, cmd: &Command, ctl: &mut DocumentController) -> CoreResult<CommandOutcome> {
        tracing::debug!("Executing command: {}", cmd.display_name());

        let outcome = match cmd {
            Command::Add { kind } => CommandOutcome::Added(ctl.add_block(*kind)?),
            Command::Open { block } => {
                let id = block.resolve(ctl)?;
                ctl.open_block(&id)?;
                CommandOutcome::Done
            }
            Command::Set { patch } => {
                ctl.update_open_block(patch)?;
                CommandOutcome::Done
            }
            Command::Points { points } => {
                ctl.set_open_block_points(*points)?;
                CommandOutcome::Done
            }
            Command::AddEntry { list } => CommandOutcome::EntryAdded(ctl.add_open_block_entry(*list)?),
            Command::RemoveEntry { list, index } => {
                ctl.remove_open_block_entry(*list, *index)?;
                CommandOutcome::Done
            }
            Command::Confirm => CommandOutcome::Validated(ctl.confirm_open_block()?),
            Command::Cancel => {
                ctl.cancel_open_block()?;
                CommandOutcome::Done
            }
            Command::Delete { block } => {
                let id = block.resolve(ctl)?;
                ctl.delete_block(&id)?;
                CommandOutcome::Done
            }
            Command::Reorder { from, to } => {
                let from = from.resolve(ctl)?;
                let to = to.resolve(ctl)?;
                CommandOutcome::Changed(ctl.reorder(&from, &to))
            }
            Command::MoveUp { block } => {
                let id = block.resolve(ctl)?;
                CommandOutcome::Changed(ctl.move_up(&id)?)
            }
            Command::MoveDown { block } => {
                let id = block.resolve(ctl)?;
                CommandOutcome::Changed(ctl.move_down(&id)?)
            }
            Command::Undo => CommandOutcome::Changed(ctl.undo()),
            Command::Redo => CommandOutcome::Changed(ctl.redo()),
            Command::Title { title } => {
                ctl.set_title(title.clone());
                CommandOutcome::Done
            }
            Command::Status { status } => {
                ctl.set_status(*status);
                CommandOutcome::Done
            }
            Command::List => CommandOutcome::Listing(list_blocks(ctl)),
            Command::Save => CommandOutcome::SaveRequested,
        };

        Ok(outcome)
    }

    /// Runs a script line by line, saving to `store` on `save`.
    ///
    /// Bad lines and rejected operations are reported and skipped. A failed
    /// save stops the run.
    pub async fn run_script(
        &self,
        ctl: &mut DocumentController,
        store: &dyn DocumentStore,
        script: &str,
    ) -> CoreResult<ScriptReport> {
        let mut report = ScriptReport::default();

        for (number, line) in script.lines().enumerate() {
            let number = number + 1;
            let outcome = match Command::parse(line) {
                Ok(None) => continue,
                Ok(Some(cmd)) => self.execute(&cmd, ctl),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(CommandOutcome::SaveRequested) => {
                    let id = ctl.save(store).await?;
                    report.messages.push(format!("saved {id}"));
                    report.saved = Some(id);
                }
                Ok(CommandOutcome::Added(id)) => report.messages.push(format!("added {id}")),
                Ok(CommandOutcome::Validated(result)) if !result.ok => {
                    report.failures += 1;
                    let message = result.message.unwrap_or_default();
                    report.messages.push(format!("line {number}: {message}"));
                    continue;
                }
                Ok(CommandOutcome::Listing(lines)) => report.messages.extend(lines),
                Ok(_) => {}
                Err(e) => {
                    report.failures += 1;
                    report.messages.push(format!("line {number}: {e}"));
                    continue;
                }
            }
            report.executed += 1;
        }

        Ok(report)
    }
}

/// One line per live block: position, kind, id, points and a preview.
///
/// The open block is marked with `*`, and blocks that would be dropped on
/// save with `(empty)`.
pub fn list_blocks(ctl: &DocumentController) -> Vec<String> {
    let open = ctl.open_block_id();
    ctl.blocks()
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let marker = if open == Some(block.id()) { '*' } else { ' ' };
            let mut line = format!(
                "{marker}#{:<3} {:<22} {}",
                i + 1,
                block.type_tag(),
                block.id()
            );
            if let Some(points) = block.points() {
                line.push_str(&format!(" [{points} pts]"));
            }
            let preview = block.preview(PREVIEW_WIDTH);
            if !preview.is_empty() {
                line.push_str(&format!("  {preview}"));
            }
            if !ctl.registry().has_content(block) {
                line.push_str(" (empty)");
            }
            line
        })
        .collect()
}
