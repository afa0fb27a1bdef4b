// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, PaintLayerId};
use super::tree::PaintLayerTree;

/// An iterator over the direct children of a layer, in box order.
///
/// Created by [`PaintLayerTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a PaintLayerTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a PaintLayerTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = PaintLayerId;

    fn next(&mut self) -> Option<PaintLayerId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(self.tree.id_at(idx))
    }
}

/// An iterator over the strict ancestors of a layer, nearest first.
///
/// Created by [`PaintLayerTree::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    tree: &'a PaintLayerTree,
    current: u32,
}

impl<'a> Ancestors<'a> {
    pub(crate) fn new(tree: &'a PaintLayerTree, start: u32) -> Self {
        Self {
            tree,
            current: tree.parent[start as usize],
        }
    }
}

impl Iterator for Ancestors<'_> {
    type Item = PaintLayerId;

    fn next(&mut self) -> Option<PaintLayerId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.parent[idx as usize];
        Some(self.tree.id_at(idx))
    }
}
