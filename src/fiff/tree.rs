//! Block tree over the flat tag directory.
//!
//! `FIFF_BLOCK_START` (payload = block kind) opens a child block and
//! `FIFF_BLOCK_END` closes it; every other tag belongs to the innermost open
//! block.
use std::io::{Read, Seek};

use anyhow::Result;

use super::constants::*;
use super::tag::{Tag, TagReader};

#[derive(Debug, Default, Clone)]
pub struct Block {
    /// Block kind; `0` for the synthetic root.
    pub kind: i32,
    pub tags: Vec<Tag>,
    pub children: Vec<Block>,
}

impl Block {
    /// Build the tree, reading each block's kind from its start tag.
    pub fn read<R: Read + Seek>(reader: &mut TagReader<R>, directory: &[Tag]) -> Result<Self> {
        let mut stack = vec![Block::default()];
        for tag in directory {
            match tag.kind {
                FIFF_BLOCK_START => {
                    let kind = reader.int(tag)?;
                    stack.push(Block { kind, ..Block::default() });
                }
                FIFF_BLOCK_END if stack.len() > 1 => {
                    if let Some(done) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(done);
                        }
                    }
                }
                FIFF_BLOCK_END => {}
                _ => {
                    if let Some(open) = stack.last_mut() {
                        open.tags.push(*tag);
                    }
                }
            }
        }
        // Unterminated blocks are folded into their parents.
        while stack.len() > 1 {
            if let Some(done) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(done);
                }
            }
        }
        Ok(stack.pop().unwrap_or_default())
    }

    /// Depth-first search for the first block of `kind` (including `self`).
    pub fn find(&self, kind: i32) -> Option<&Block> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(kind))
    }
}
