//! Proof obligations and the priority frontier that drives the search.

use std::cell::{Cell, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::{Rc, Weak};

use civet_ir::RelationId;
use civet_smt::terms::Term;

use crate::config::TieBreak;
use crate::derivation::Derivation;

/// Shared handle to a node of the proof-obligation tree.
pub type PobRef = Rc<ProofObligation>;

/// A node of the search tree: "is `post` reachable for `relation` within
/// `level` unrollings?"
///
/// A child holds the only owning reference to its parent, keeping ancestors
/// alive while any descendant survives; parents hold weak back-references to
/// their children, so a subtree disappears as soon as the frontier and the
/// engine drop it.
pub struct ProofObligation {
    relation: RelationId,
    post: RefCell<Term>,
    /// Replacement post-condition, committed lazily by [`ProofObligation::clean`].
    new_post: RefCell<Option<Term>>,
    level: Cell<usize>,
    depth: Cell<usize>,
    open: Cell<bool>,
    weakness: Cell<u32>,
    parent: Option<PobRef>,
    children: RefCell<Vec<Weak<ProofObligation>>>,
    derivation: RefCell<Option<Derivation>>,
}

impl ProofObligation {
    pub fn new(
        parent: Option<&PobRef>,
        relation: RelationId,
        level: usize,
        depth: usize,
        post: Term,
    ) -> PobRef {
        let pob = Rc::new(Self {
            relation,
            post: RefCell::new(post),
            new_post: RefCell::new(None),
            level: Cell::new(level),
            depth: Cell::new(depth),
            open: Cell::new(true),
            weakness: Cell::new(0),
            parent: parent.cloned(),
            children: RefCell::new(Vec::new()),
            derivation: RefCell::new(None),
        });
        if let Some(parent) = parent {
            parent.children.borrow_mut().push(Rc::downgrade(&pob));
        }
        pob
    }

    pub fn relation(&self) -> RelationId {
        self.relation
    }

    pub fn level(&self) -> usize {
        self.level.get()
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn post(&self) -> Term {
        self.post.borrow().clone()
    }

    /// Schedule a replacement post-condition without touching the live one.
    pub fn new_post(&self, post: Term) {
        if post != *self.post.borrow() {
            *self.new_post.borrow_mut() = Some(post);
        }
    }

    /// True when a replacement post-condition is pending.
    pub fn is_dirty(&self) -> bool {
        self.new_post.borrow().is_some()
    }

    /// Commit a pending post-condition, if any.
    pub fn clean(&self) {
        if let Some(post) = self.new_post.borrow_mut().take() {
            *self.post.borrow_mut() = post;
        }
    }

    /// Reopen the node for re-examination: commit any pending post, drop the
    /// attached derivation, and mark it open.
    pub fn reset(&self) {
        self.clean();
        self.derivation.replace(None);
        self.open.set(true);
    }

    /// Close the node; a closed obligation never keeps a derivation.
    pub fn close(&self) {
        self.open.set(false);
        self.derivation.replace(None);
    }

    pub fn is_closed(&self) -> bool {
        !self.open.get()
    }

    /// Raise the node one level for re-use at a deeper bound.
    pub fn inc_level(&self) {
        self.level.set(self.level.get() + 1);
        self.depth.set(self.depth.get() + 1);
        self.reset_weakness();
    }

    pub fn weakness(&self) -> u32 {
        self.weakness.get()
    }

    pub fn bump_weakness(&self) {
        self.weakness.set(self.weakness.get().saturating_add(1));
    }

    pub fn reset_weakness(&self) {
        self.weakness.set(0);
    }

    pub fn parent(&self) -> Option<PobRef> {
        self.parent.clone()
    }

    /// Live children, pruning back-references to dropped nodes.
    pub fn live_children(&self) -> Vec<PobRef> {
        let mut children = self.children.borrow_mut();
        children.retain(|weak| weak.strong_count() > 0);
        children.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn set_derivation(&self, derivation: Derivation) {
        *self.derivation.borrow_mut() = Some(derivation);
    }

    pub fn has_derivation(&self) -> bool {
        self.derivation.borrow().is_some()
    }

    pub fn derivation_mut(&self) -> RefMut<'_, Option<Derivation>> {
        self.derivation.borrow_mut()
    }
}

impl std::fmt::Debug for ProofObligation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofObligation")
            .field("relation", &self.relation)
            .field("level", &self.level.get())
            .field("depth", &self.depth.get())
            .field("open", &self.open.get())
            .field("post", &self.post.borrow().to_string())
            .finish()
    }
}

/// Heap entry; priorities are snapshotted at push time.
struct QueueEntry {
    level: usize,
    depth: usize,
    order: u64,
    pob: PobRef,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level && self.depth == other.depth && self.order == other.order
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse each key so the queue yields the
        // lowest level first, then the shallowest depth, then the smallest
        // residual order value.
        other
            .level
            .cmp(&self.level)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Priority queue of open obligations plus the search-tree root.
///
/// Obligations are drained lowest level first, ties broken by ascending
/// depth, residual ties by the configured deterministic insertion policy —
/// never by identity. A closed obligation is discarded on the way out, so
/// the queue never exposes one.
pub struct SearchFrontier {
    queue: BinaryHeap<QueueEntry>,
    root: Option<PobRef>,
    max_level: usize,
    min_depth: usize,
    next_seq: u64,
    tie_break: TieBreak,
}

impl SearchFrontier {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            queue: BinaryHeap::new(),
            root: None,
            max_level: 0,
            min_depth: 0,
            next_seq: 0,
            tie_break,
        }
    }

    /// Install the root obligation and seed the queue with it.
    pub fn set_root(&mut self, root: PobRef) {
        self.queue.clear();
        self.max_level = root.level();
        self.min_depth = root.depth();
        self.root = Some(root.clone());
        self.push(&root);
    }

    pub fn root(&self) -> Option<PobRef> {
        self.root.clone()
    }

    pub fn is_root(&self, pob: &PobRef) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| Rc::ptr_eq(root, pob))
    }

    pub fn push(&mut self, pob: &PobRef) {
        debug_assert!(!pob.is_closed(), "closed obligation pushed to frontier");
        let order = match self.tie_break {
            TieBreak::InsertionOrder => self.next_seq,
            TieBreak::ReverseInsertion => u64::MAX - self.next_seq,
        };
        self.next_seq += 1;
        self.queue.push(QueueEntry {
            level: pob.level(),
            depth: pob.depth(),
            order,
            pob: pob.clone(),
        });
    }

    /// Remove and return the highest-priority open obligation, committing a
    /// pending post-condition before exposing it.
    pub fn pop(&mut self) -> Option<PobRef> {
        while let Some(entry) = self.queue.pop() {
            if entry.pob.is_closed() {
                continue;
            }
            entry.pob.clean();
            return Some(entry.pob);
        }
        None
    }

    /// Return the highest-priority open obligation without removing it.
    pub fn top(&mut self) -> Option<PobRef> {
        while let Some(entry) = self.queue.peek() {
            if entry.pob.is_closed() {
                self.queue.pop();
                continue;
            }
            entry.pob.clean();
            return Some(entry.pob.clone());
        }
        None
    }

    /// Raise the global level bound; an empty queue is reseeded with the
    /// root at the new bound, restarting the search from the top.
    pub fn inc_level(&mut self) {
        self.max_level += 1;
        self.min_depth += 1;
        if self.queue.is_empty() {
            if let Some(root) = self.root.clone() {
                root.reset();
                root.inc_level();
                debug_assert_eq!(root.level(), self.max_level);
                self.push(&root);
            }
        }
    }

    /// Discard queued obligations and reseed with the root at the current
    /// bound. Learned lemmas and reachability facts are untouched — only the
    /// traversal order is lost.
    pub fn restart(&mut self) {
        self.queue.clear();
        if let Some(root) = self.root.clone() {
            root.reset();
            self.push(&root);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }
}
