// Copyright 2025 the gpu_atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle bin packing over a ternary split tree.
//!
//! The canvas starts as a single empty leaf. A rectangle placed in an empty
//! leaf sits flush with the leaf's minimum corner. When a second rectangle
//! arrives at an occupied leaf, the leaf becomes an internal node with three
//! children: a leaf sized exactly to the resident rectangle, and two leaves
//! that split the remaining L-shaped margin with one axis-aligned cut.
//!
//! Nodes live in a flat arena addressed by index. Freeing a rectangle
//! empties its leaf, and an internal node whose three children are all empty
//! leaves collapses back into a single empty leaf. Collapsed slots go on a
//! free list and are handed out again by later splits.

use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::error::AllocError;
use crate::geometry::{Extent, Padding, Point};

type NodeId = usize;

const ROOT: NodeId = 0;

/// A rectangle handed out by a [`RectBinPacker`].
///
/// The rectangle is valid until it is freed or the packer that produced it
/// is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackedRect {
    min: Point,
    size: Extent,
    padding: Padding,
    generation: u64,
}

impl PackedRect {
    fn empty(generation: u64) -> Self {
        Self {
            min: Point::new(0, 0),
            size: Extent::new(0, 0),
            padding: Padding::ZERO,
            generation,
        }
    }

    /// Minimum corner of the rectangle, padding included.
    #[inline]
    pub fn min(&self) -> Point {
        self.min
    }

    /// Size of the rectangle, padding included.
    #[inline]
    pub fn size(&self) -> Extent {
        self.size
    }

    /// Padding reserved around the requested content.
    #[inline]
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Minimum corner of the requested content.
    #[inline]
    pub fn unpadded_min(&self) -> Point {
        Point::new(self.min.x + self.padding.left, self.min.y + self.padding.top)
    }

    /// Size of the requested content.
    #[inline]
    pub fn unpadded_size(&self) -> Extent {
        Extent::new(
            self.size.width - self.padding.horizontal(),
            self.size.height - self.padding.vertical(),
        )
    }

    /// Whether this is the handle returned for a zero-sized request.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// The packer generation this rectangle was allocated in.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the two rectangles share any texel.
    ///
    /// Empty rectangles never intersect anything.
    pub fn intersects(&self, other: &Self) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (a, b) = (self, other);
        u64::from(a.min.x) < u64::from(b.min.x) + u64::from(b.size.width)
            && u64::from(b.min.x) < u64::from(a.min.x) + u64::from(a.size.width)
            && u64::from(a.min.y) < u64::from(b.min.y) + u64::from(b.size.height)
            && u64::from(b.min.y) < u64::from(a.min.y) + u64::from(a.size.height)
    }
}

/// The rectangle resident in a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Occupant {
    size: Extent,
    generation: u64,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    /// A leaf, possibly holding one rectangle at its minimum corner.
    Leaf(Option<Occupant>),
    /// An internal node, children sorted by ascending area.
    Internal([NodeId; 3]),
}

#[derive(Clone, Copy, Debug)]
struct Node {
    min: Point,
    size: Extent,
    parent: Option<NodeId>,
    kind: NodeKind,
    // Upper bounds of any single request the subtree could still accept.
    widest: u32,
    tallest: u32,
    biggest: u64,
}

impl Node {
    fn leaf(min: Point, size: Extent, parent: Option<NodeId>, occupant: Option<Occupant>) -> Self {
        let mut node = Self {
            min,
            size,
            parent,
            kind: NodeKind::Leaf(occupant),
            widest: 0,
            tallest: 0,
            biggest: 0,
        };
        node.recompute_leaf_bounds();
        node
    }

    fn recompute_leaf_bounds(&mut self) {
        let NodeKind::Leaf(occupant) = self.kind else {
            return;
        };
        let (w, h) = (self.size.width, self.size.height);
        match occupant {
            None => {
                self.widest = w;
                self.tallest = h;
                self.biggest = self.size.area();
            }
            Some(Occupant { size: r, .. }) => {
                let dx = w - r.width;
                let dy = h - r.height;
                // A vertical cut yields a dx * h strip, a horizontal one w * dy.
                self.widest = if dy > 0 { dx.max(w) } else { dx };
                self.tallest = if dx > 0 { dy.max(h) } else { dy };
                self.biggest = (u64::from(dx) * u64::from(h)).max(u64::from(w) * u64::from(dy));
            }
        }
    }

    fn may_accept(&self, request: Extent) -> bool {
        request.width <= self.widest
            && request.height <= self.tallest
            && request.area() <= self.biggest
    }

    fn is_empty_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(None))
    }

    fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && u64::from(p.x) < u64::from(self.min.x) + u64::from(self.size.width)
            && u64::from(p.y) < u64::from(self.min.y) + u64::from(self.size.height)
    }
}

/// The cut used to split an occupied leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Split {
    /// Margin to the right of the resident is cut off at full height.
    Vertical,
    /// Margin below the resident is cut off at full width.
    Horizontal,
}

/// Picks the cut for placing `request` next to `occupant` in a leaf of size
/// `leaf`, or `None` if neither cut leaves room for it.
fn choose_split(leaf: Extent, occupant: Extent, request: Extent) -> Option<Split> {
    let dx = leaf.width - occupant.width;
    let dy = leaf.height - occupant.height;
    let vertical = dx >= request.width && leaf.height >= request.height;
    let horizontal = dy >= request.height && leaf.width >= request.width;
    match (vertical, horizontal) {
        // Cut along the axis that has the most room left over.
        (true, true) if dx > dy => Some(Split::Vertical),
        (true, true) => Some(Split::Horizontal),
        (true, false) => Some(Split::Vertical),
        (false, true) => Some(Split::Horizontal),
        (false, false) => None,
    }
}

/// Packs rectangles into a fixed canvas.
///
/// Allocation failure is an ordinary result: once a request of some size
/// has been rejected, every later request at least as large on both axes is
/// rejected without walking the tree, until space is given back by
/// [`deallocate`](Self::deallocate) or [`clear`](Self::clear).
#[derive(Clone)]
pub struct RectBinPacker {
    nodes: Vec<Node>,
    free_nodes: Vec<NodeId>,
    rejected: Option<Extent>,
    generation: u64,
    rect_count: usize,
}

impl RectBinPacker {
    /// Creates a packer covering a `size` canvas.
    pub fn new(size: Extent) -> Self {
        let mut packer = Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            rejected: None,
            generation: 0,
            rect_count: 0,
        };
        packer.reset(size);
        packer
    }

    /// Size of the canvas.
    pub fn size(&self) -> Extent {
        self.nodes[ROOT].size
    }

    /// Clears every allocation, invalidating all handed-out rectangles.
    pub fn clear(&mut self) {
        self.clear_with_size(self.size());
    }

    /// Clears every allocation and changes the canvas size.
    pub fn clear_with_size(&mut self, size: Extent) {
        self.generation += 1;
        self.reset(size);
    }

    fn reset(&mut self, size: Extent) {
        self.nodes.clear();
        self.free_nodes.clear();
        self.nodes
            .push(Node::leaf(Point::new(0, 0), size, None, None));
        self.rejected = None;
        self.rect_count = 0;
    }

    /// Allocates room for a `size` rectangle surrounded by `padding`.
    ///
    /// A zero-sized request always succeeds with an empty rectangle that
    /// occupies no space.
    pub fn allocate(&mut self, size: Extent, padding: Padding) -> Result<PackedRect, AllocError> {
        if size.is_empty() {
            return Ok(PackedRect::empty(self.generation));
        }

        let padded = match (
            size.width.checked_add(padding.horizontal()),
            size.height.checked_add(padding.vertical()),
        ) {
            (Some(width), Some(height)) => Extent::new(width, height),
            _ => return Err(AllocError::out_of_space(size.width, size.height)),
        };

        if self
            .rejected
            .is_some_and(|r| padded.width >= r.width && padded.height >= r.height)
        {
            return Err(AllocError::out_of_space(size.width, size.height));
        }

        let Some(leaf) = self.find_leaf(ROOT, padded) else {
            log::trace!(
                "rect packer rejected {}x{} (padded {}x{})",
                size.width,
                size.height,
                padded.width,
                padded.height
            );
            self.rejected = Some(padded);
            return Err(AllocError::out_of_space(size.width, size.height));
        };

        let occupant = Occupant {
            size: padded,
            generation: self.generation,
        };
        let min = self.place(leaf, occupant);
        self.rect_count += 1;
        Ok(PackedRect {
            min,
            size: padded,
            padding,
            generation: self.generation,
        })
    }

    /// Gives the space of `rect` back to the packer.
    ///
    /// Returns `false` without touching the tree if `rect` is not live in
    /// this packer, which is the case for rectangles invalidated by a clear.
    /// Empty rectangles hold no space and always succeed.
    pub fn deallocate(&mut self, rect: &PackedRect) -> bool {
        if rect.is_empty() {
            return true;
        }
        let Some(leaf) = self.locate(rect) else {
            debug_assert!(
                rect.generation != self.generation,
                "{rect:?} was freed twice or comes from another packer"
            );
            return false;
        };
        self.free_leaf(leaf);
        self.rect_count -= 1;
        self.rejected = None;
        true
    }

    /// Whether `rect` still holds its space in this packer.
    pub fn contains(&self, rect: &PackedRect) -> bool {
        if rect.is_empty() {
            return rect.generation == self.generation;
        }
        rect.generation == self.generation && self.locate(rect).is_some()
    }

    /// Starts a new generation without freeing anything.
    ///
    /// Rectangles from earlier generations keep their space until
    /// [`retire_previous_generations`](Self::retire_previous_generations).
    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }

    /// Frees every rectangle allocated before the current generation.
    ///
    /// Returns how many rectangles were freed.
    pub(crate) fn retire_previous_generations(&mut self) -> usize {
        let mut stale = Vec::new();
        let mut stack = alloc::vec![ROOT];
        while let Some(id) = stack.pop() {
            match self.nodes[id].kind {
                NodeKind::Leaf(Some(occupant)) if occupant.generation < self.generation => {
                    stale.push(id);
                }
                NodeKind::Leaf(_) => {}
                NodeKind::Internal(children) => stack.extend(children),
            }
        }
        if stale.is_empty() {
            return 0;
        }
        if stale.len() == self.rect_count {
            self.reset(self.size());
            return stale.len();
        }
        // An occupied leaf never collapses, so ids in `stale` stay valid
        // until each one is freed.
        for &leaf in &stale {
            self.free_leaf(leaf);
        }
        self.rect_count -= stale.len();
        self.rejected = None;
        stale.len()
    }

    /// Number of clears performed so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of live non-empty rectangles.
    pub fn rect_count(&self) -> usize {
        self.rect_count
    }

    /// Number of nodes in the split tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    /// Bytes reserved for the split tree.
    pub fn bookkeeping_bytes(&self) -> usize {
        self.nodes.capacity() * size_of::<Node>()
            + self.free_nodes.capacity() * size_of::<NodeId>()
    }

    /// Returns a leaf in the subtree of `id` that can take `request`.
    fn find_leaf(&self, id: NodeId, request: Extent) -> Option<NodeId> {
        let node = &self.nodes[id];
        if !node.may_accept(request) {
            return None;
        }
        match node.kind {
            NodeKind::Leaf(None) => Some(id),
            NodeKind::Leaf(Some(occupant)) => {
                choose_split(node.size, occupant.size, request).map(|_| id)
            }
            NodeKind::Internal(children) => children
                .iter()
                .find_map(|&child| self.find_leaf(child, request)),
        }
    }

    /// Finds the leaf holding `rect`.
    ///
    /// Children partition their parent, so the leaf is the one on the path
    /// of nodes containing the rectangle's minimum corner.
    fn locate(&self, rect: &PackedRect) -> Option<NodeId> {
        let mut id = ROOT;
        loop {
            let node = &self.nodes[id];
            match node.kind {
                NodeKind::Leaf(Some(occupant)) => {
                    let held = node.min == rect.min
                        && occupant.size == rect.size
                        && occupant.generation == rect.generation;
                    return held.then_some(id);
                }
                NodeKind::Leaf(None) => return None,
                NodeKind::Internal(children) => {
                    id = children
                        .into_iter()
                        .find(|&child| self.nodes[child].contains(rect.min))?;
                }
            }
        }
    }

    /// Places `occupant` in the leaf `id`, which must accept it.
    fn place(&mut self, id: NodeId, occupant: Occupant) -> Point {
        let node = self.nodes[id];
        let target = match node.kind {
            NodeKind::Leaf(None) => id,
            NodeKind::Leaf(Some(resident)) => {
                let split = choose_split(node.size, resident.size, occupant.size);
                debug_assert!(split.is_some(), "leaf cannot take the request");
                let margin = self.split(id, resident, split.unwrap_or(Split::Vertical));
                self.find_leaf(id, occupant.size).unwrap_or(margin)
            }
            NodeKind::Internal(_) => {
                debug_assert!(false, "rectangles are only placed in leaves");
                return node.min;
            }
        };

        let leaf = &mut self.nodes[target];
        leaf.kind = NodeKind::Leaf(Some(occupant));
        leaf.recompute_leaf_bounds();
        let min = leaf.min;
        self.propagate(target);
        min
    }

    /// Stores `node` in a free slot, growing the arena if there is none.
    fn push_node(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Turns the occupied leaf `id` into an internal node, returning the
    /// margin child cut for the incoming rectangle.
    fn split(&mut self, id: NodeId, resident: Occupant, split: Split) -> NodeId {
        let Node { min, size, .. } = self.nodes[id];
        let (rw, rh) = (resident.size.width, resident.size.height);
        let (dx, dy) = (size.width - rw, size.height - rh);

        let (first, margin) = match split {
            Split::Vertical => (
                (Point::new(min.x, min.y + rh), Extent::new(rw, dy)),
                (Point::new(min.x + rw, min.y), Extent::new(dx, size.height)),
            ),
            Split::Horizontal => (
                (Point::new(min.x + rw, min.y), Extent::new(dx, rh)),
                (Point::new(min.x, min.y + rh), Extent::new(size.width, dy)),
            ),
        };

        let first = self.push_node(Node::leaf(first.0, first.1, Some(id), None));
        let margin = self.push_node(Node::leaf(margin.0, margin.1, Some(id), None));
        let kept = self.push_node(Node::leaf(min, resident.size, Some(id), Some(resident)));

        let mut children = [first, margin, kept];
        children.sort_by_key(|&child| self.nodes[child].size.area());
        self.nodes[id].kind = NodeKind::Internal(children);
        margin
    }

    /// Empties the occupied leaf `id` and merges empty siblings upward.
    fn free_leaf(&mut self, id: NodeId) {
        let leaf = &mut self.nodes[id];
        leaf.kind = NodeKind::Leaf(None);
        leaf.recompute_leaf_bounds();

        let mut top = id;
        while let Some(parent) = self.nodes[top].parent {
            let NodeKind::Internal(children) = self.nodes[parent].kind else {
                break;
            };
            if !children.iter().all(|&child| self.nodes[child].is_empty_leaf()) {
                break;
            }
            self.free_nodes.extend(children);
            let node = &mut self.nodes[parent];
            node.kind = NodeKind::Leaf(None);
            node.recompute_leaf_bounds();
            top = parent;
        }
        self.propagate(top);
    }

    /// Refreshes cached bounds from `id` up to the root.
    fn propagate(&mut self, mut id: NodeId) {
        loop {
            if let NodeKind::Internal(children) = self.nodes[id].kind {
                let (mut widest, mut tallest, mut biggest) = (0, 0, 0);
                for child in children {
                    let c = &self.nodes[child];
                    widest = c.widest.max(widest);
                    tallest = c.tallest.max(tallest);
                    biggest = c.biggest.max(biggest);
                }
                let node = &mut self.nodes[id];
                node.widest = widest;
                node.tallest = tallest;
                node.biggest = biggest;
            }
            match self.nodes[id].parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
    }
}

impl Debug for RectBinPacker {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RectBinPacker")
            .field("size", &self.size())
            .field("rect_count", &self.rect_count)
            .field("node_count", &self.node_count())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
