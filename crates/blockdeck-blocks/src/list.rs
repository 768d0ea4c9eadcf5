//! Structurally shared block sequences.
//!
//! A `BlockList` is an `Arc` of a vector of `Arc<Block>`. Cloning one is a
//! reference-count bump, and every "mutating" method returns a new list
//! that shares all untouched blocks with the old one. History snapshots
//! and the live document therefore share storage.

use std::sync::Arc;

use crate::block::{Block, BlockId};
use crate::reorder;

/// An immutable, ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    blocks: Arc<Vec<Arc<Block>>>,
}

impl BlockList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn from_shared(blocks: Vec<Arc<Block>>) -> Self {
        Self {
            blocks: Arc::new(blocks),
        }
    }

    /// Returns the number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if there are no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates the blocks in order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().map(|b| b.as_ref())
    }

    /// Returns the block at `index`.
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index).map(|b| b.as_ref())
    }

    /// Returns the block with the given id.
    pub fn find(&self, id: &BlockId) -> Option<&Block> {
        self.iter().find(|b| b.id() == id)
    }

    /// Returns the position of the block with the given id.
    pub fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == id)
    }

    /// Returns true if a block with the given id exists.
    pub fn contains(&self, id: &BlockId) -> bool {
        self.position(id).is_some()
    }

    /// Returns the block ids in order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.iter().map(|b| b.id().clone()).collect()
    }

    /// Returns a list with `block` appended.
    pub fn pushed(&self, block: Block) -> Self {
        let mut blocks = self.blocks.as_ref().clone();
        blocks.push(Arc::new(block));
        Self::from_shared(blocks)
    }

    /// Returns a list without the block `id`, or `None` if it isn't there.
    pub fn removed(&self, id: &BlockId) -> Option<Self> {
        let index = self.position(id)?;
        let mut blocks = self.blocks.as_ref().clone();
        blocks.remove(index);
        Some(Self::from_shared(blocks))
    }

    /// Returns a list where the block with `block.id()` is replaced.
    pub fn replaced(&self, block: Block) -> Option<Self> {
        let index = self.position(block.id())?;
        let mut blocks = self.blocks.as_ref().clone();
        blocks[index] = Arc::new(block);
        Some(Self::from_shared(blocks))
    }

    /// Returns a list with the block at `from` moved to `to`.
    ///
    /// Out-of-range indices return an identical list.
    pub fn moved(&self, from: usize, to: usize) -> Self {
        Self::from_shared(reorder::move_item(self.blocks.as_slice(), from, to))
    }

    /// Returns a list filtered by `keep`, sharing the kept blocks.
    pub fn filtered(&self, mut keep: impl FnMut(&Block) -> bool) -> Self {
        Self::from_shared(
            self.blocks
                .iter()
                .filter(|b| keep(b.as_ref()))
                .cloned()
                .collect(),
        )
    }

    /// Returns true if both lists hold the very same allocation for block `id`.
    pub fn shares_block(&self, other: &BlockList, id: &BlockId) -> bool {
        match (self.position(id), other.position(id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&self.blocks[a], &other.blocks[b]),
            _ => false,
        }
    }
}

impl FromIterator<Block> for BlockList {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        Self::from_shared(iter.into_iter().map(Arc::new).collect())
    }
}

impl From<Vec<Block>> for BlockList {
    fn from(blocks: Vec<Block>) -> Self {
        blocks.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{BlockPayload, Separator};

    fn block(id: &str) -> Block {
        Block::new(
            BlockId::from(id),
            BlockPayload::Separator(Separator::default()),
            None,
        )
    }

    fn ids(list: &BlockList) -> Vec<String> {
        list.iter().map(|b| b.id().to_string()).collect()
    }

    #[test]
    fn test_pushed_leaves_original() {
        let a = BlockList::from(vec![block("a")]);
        let b = a.pushed(block("b"));
        assert_eq!(ids(&a), vec!["a"]);
        assert_eq!(ids(&b), vec!["a", "b"]);
        assert!(a.shares_block(&b, &BlockId::from("a")));
    }

    #[test]
    fn test_removed_and_replaced() {
        let list = BlockList::from(vec![block("a"), block("b"), block("c")]);
        let without = list.removed(&BlockId::from("b")).unwrap();
        assert_eq!(ids(&without), vec!["a", "c"]);
        assert!(list.removed(&BlockId::from("z")).is_none());

        let replaced = list.replaced(block("c")).unwrap();
        assert!(replaced.shares_block(&list, &BlockId::from("a")));
        assert!(!replaced.shares_block(&list, &BlockId::from("c")));
    }

    #[test]
    fn test_moved_shares_blocks() {
        let list = BlockList::from(vec![block("a"), block("b"), block("c")]);
        let moved = list.moved(0, 2);
        assert_eq!(ids(&moved), vec!["b", "c", "a"]);
        assert!(moved.shares_block(&list, &BlockId::from("a")));
        assert_eq!(list.moved(0, 7), list);
    }

    #[test]
    fn test_equality_is_by_value() {
        let a = BlockList::from(vec![block("a")]);
        let b = BlockList::from(vec![block("a")]);
        assert_eq!(a, b);
        assert!(!a.shares_block(&b, &BlockId::from("a")));
    }
}
