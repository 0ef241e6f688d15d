use std::fmt;
use std::mem;

use generational_arena::{Arena, Index};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, warn};

use crate::config::{Settings, DEFAULT_PATH_SEPARATOR};
use crate::equivalence::{Intrinsic, PayloadEquivalence, PayloadKey, PayloadRef, Lookup};
use crate::errors::{TreeError, TreeResult};
use crate::node_ref::NodeRef;

/// Children of a node, in insertion order and keyed by payload.
pub(crate) type Children<T, Q> = IndexMap<PayloadKey<T, Q>, Index>;

/// Tree node in the arena-based hierarchy structure.
pub struct TreeNode<T, Q = Intrinsic> {
    /// Label of this node within its parent's namespace
    pub name: String,
    /// Payload; also the key under which the node is linked into its parent
    pub data: T,
    /// Level annotation maintained by the caller, never recomputed on relinking
    pub height: usize,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    pub(crate) children: Children<T, Q>,
}

impl<T, Q> TreeNode<T, Q> {
    fn new(name: String, data: T, parent: Option<Index>) -> Self {
        Self {
            name,
            data,
            height: 0,
            parent,
            children: IndexMap::new(),
        }
    }

    /// Indices of linked children, in insertion order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = Index> + '_ {
        self.children.values().copied()
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }
}

impl<T: fmt::Debug, Q> fmt::Debug for TreeNode<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("height", &self.height)
            .field("parent", &self.parent)
            .field("children", &self.children.values().collect::<Vec<_>>())
            .finish()
    }
}

/// Arena-based storage for labeled trees.
///
/// The arena owns every node; parents and children refer to each other by
/// generational [`Index`]. Several trees may live in one arena, `root` being the
/// first parentless node created unless set explicitly.
///
/// `Q` decides payload equality and hashing for sibling lookup and for node identity.
pub struct TreeArena<T, Q = Intrinsic> {
    /// Arena storage for all tree nodes
    arena: Arena<TreeNode<T, Q>>,
    /// Index of the root node, None for empty trees
    root: Option<Index>,
    path_separator: String,
}

impl<T, Q> Default for TreeArena<T, Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, Q> fmt::Debug for TreeArena<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeArena")
            .field("arena", &self.arena)
            .field("root", &self.root)
            .field("path_separator", &self.path_separator)
            .finish()
    }
}

impl<T, Q> TreeArena<T, Q> {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// # Errors
    /// [`TreeError::Config`] when `settings` fail [`Settings::validate`].
    pub fn with_settings(settings: &Settings) -> TreeResult<Self> {
        settings.validate()?;
        Ok(Self {
            arena: Arena::with_capacity(settings.initial_capacity),
            root: None,
            path_separator: settings.path_separator.clone(),
        })
    }

    pub fn path_separator(&self) -> &str {
        &self.path_separator
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, idx: Index) -> bool {
        self.arena.contains(idx)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn root(&self) -> Option<Index> {
        self.root
    }

    #[instrument(level = "trace", skip(self))]
    pub fn set_root(&mut self, idx: Index) -> TreeResult<()> {
        self.ensure_node(idx)?;
        self.root = Some(idx);
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get_node(&self, idx: Index) -> Option<&TreeNode<T, Q>> {
        self.arena.get(idx)
    }

    /// Mutable access for non-structural edits (name, height, data).
    ///
    /// Changing `data` of a node that is linked into a parent leaves the parent's
    /// key stale: the parent can no longer find the node by its new payload.
    #[instrument(level = "trace", skip(self))]
    pub fn get_node_mut(&mut self, idx: Index) -> Option<&mut TreeNode<T, Q>> {
        self.arena.get_mut(idx)
    }

    /// Read-only view of a node, carrying its identity and traversal operations.
    pub fn node(&self, idx: Index) -> TreeResult<NodeRef<'_, T, Q>> {
        NodeRef::new(self, idx).ok_or(TreeError::NodeNotFound(idx))
    }

    pub fn root_node(&self) -> TreeResult<NodeRef<'_, T, Q>> {
        let root = self.root.ok_or(TreeError::NoRoot)?;
        self.node(root)
    }

    fn ensure_node(&self, idx: Index) -> TreeResult<()> {
        if self.arena.contains(idx) {
            Ok(())
        } else {
            Err(TreeError::NodeNotFound(idx))
        }
    }

    fn node_mut(&mut self, idx: Index) -> TreeResult<&mut TreeNode<T, Q>> {
        self.arena.get_mut(idx).ok_or(TreeError::NodeNotFound(idx))
    }

    fn alloc(&mut self, name: String, data: T, parent: Option<Index>) -> Index {
        let idx = self.arena.insert(TreeNode::new(name, data, parent));
        if parent.is_none() && self.root.is_none() {
            self.root = Some(idx);
        }
        idx
    }

    /// Creates an empty node: no name, default payload, no parent, no children.
    #[instrument(level = "trace", skip(self))]
    pub fn create_default_node(&mut self) -> Index
    where
        T: Default,
    {
        self.alloc(String::new(), T::default(), None)
    }

    /// Creates a node pointing at `parent` without linking it into the parent's
    /// children; call [`add_child`](Self::add_child) for that.
    #[instrument(level = "trace", skip(self, data))]
    pub fn create_node(&mut self, data: T, parent: Option<Index>) -> TreeResult<Index> {
        self.create_named_node(String::new(), data, parent)
    }

    #[instrument(level = "trace", skip(self, name, data))]
    pub fn create_named_node(
        &mut self,
        name: impl Into<String>,
        data: T,
        parent: Option<Index>,
    ) -> TreeResult<Index> {
        if let Some(parent_idx) = parent {
            self.ensure_node(parent_idx)?;
        }
        Ok(self.alloc(name.into(), data, parent))
    }

    /// Creates a node and links it under `parent` in one step.
    ///
    /// A sibling displaced by an equivalent payload is dropped together with its
    /// subtree, since the caller never sees its index.
    #[instrument(level = "trace", skip(self, name, data))]
    pub fn insert_node(
        &mut self,
        name: impl Into<String>,
        data: T,
        parent: Option<Index>,
    ) -> TreeResult<Index>
    where
        T: Clone,
        Q: PayloadEquivalence<T>,
    {
        let node_idx = self.create_named_node(name, data, parent)?;
        if let Some(parent_idx) = parent {
            if let Some(displaced) = self.add_child(parent_idx, node_idx)? {
                self.remove_subtree(displaced)?;
            }
        }
        Ok(node_idx)
    }

    /// Appends `child` to the end of `parent`'s children, keyed by the child's payload.
    ///
    /// `child.parent` is left untouched. If a sibling with an equivalent payload is
    /// already linked, it is unlinked and returned: the last insert wins and the
    /// ordered children never hold two equivalent payloads.
    #[instrument(level = "trace", skip(self))]
    pub fn add_child(&mut self, parent: Index, child: Index) -> TreeResult<Option<Index>>
    where
        T: Clone,
        Q: PayloadEquivalence<T>,
    {
        let key = PayloadKey::new(
            self.arena
                .get(child)
                .ok_or(TreeError::NodeNotFound(child))?
                .data
                .clone(),
        );
        let parent_node = self.node_mut(parent)?;
        let displaced = parent_node
            .children
            .shift_remove(&key)
            .filter(|&previous| previous != child);
        parent_node.children.insert(key, child);

        if let Some(previous) = displaced {
            warn!(
                ?parent,
                ?child,
                ?previous,
                "sibling with equivalent payload replaced"
            );
        } else {
            debug!(?parent, ?child, "child linked");
        }
        Ok(displaced)
    }

    /// Unlinks the sibling whose payload is equivalent to `child`'s payload.
    ///
    /// That sibling may be a different node than `child`. Nothing linked under
    /// that payload is a no-op. The removed node keeps its `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_child(&mut self, parent: Index, child: Index) -> TreeResult<Option<Index>>
    where
        Q: PayloadEquivalence<T>,
    {
        self.ensure_node(child)?;
        let mut children = mem::take(&mut self.node_mut(parent)?.children);
        let removed = self
            .arena
            .get(child)
            .and_then(|node| children.shift_remove(&Lookup::<T, Q>::new(&node.data)));
        self.node_mut(parent)?.children = children;

        debug!(?parent, ?child, ?removed, "child unlinked");
        Ok(removed)
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn remove_child_by_data(&mut self, parent: Index, data: &T) -> TreeResult<Option<Index>>
    where
        Q: PayloadEquivalence<T>,
    {
        let removed = self
            .node_mut(parent)?
            .children
            .shift_remove(&Lookup::<T, Q>::new(data));
        debug!(?parent, ?removed, "child unlinked by payload");
        Ok(removed)
    }

    #[instrument(level = "trace", skip(self, data))]
    pub fn child_by_data(&self, parent: Index, data: &T) -> TreeResult<Option<Index>>
    where
        Q: PayloadEquivalence<T>,
    {
        Ok(self.node(parent)?.child_by_data(data).map(|c| c.index()))
    }

    /// Drops `idx` and every node linked below it from the arena.
    ///
    /// Every remaining link to a dropped node is removed as well, wherever it
    /// sits: `add_child` may link a node under a parent other than the recorded
    /// one. Returns the number of nodes dropped.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_subtree(&mut self, idx: Index) -> TreeResult<usize> {
        self.ensure_node(idx)?;

        let mut dropped = IndexSet::new();
        let mut stack = vec![idx];
        while let Some(current_idx) = stack.pop() {
            if let Some(node) = self.arena.remove(current_idx) {
                stack.extend(node.children.into_values());
                dropped.insert(current_idx);
            }
        }

        for (_, node) in self.arena.iter_mut() {
            node.children.retain(|_, child| !dropped.contains(&*child));
        }

        if self.root.is_some_and(|root| !self.arena.contains(root)) {
            self.root = None;
        }
        debug!(dropped = dropped.len(), "subtree removed");
        Ok(dropped.len())
    }

    /// Writes `base` into `idx` and `base + depth` into each linked descendant.
    ///
    /// Heights are otherwise never touched by the arena.
    #[instrument(level = "debug", skip(self))]
    pub fn assign_heights(&mut self, idx: Index, base: usize) -> TreeResult<()> {
        self.ensure_node(idx)?;
        let mut stack = vec![(idx, base)];
        while let Some((current_idx, height)) = stack.pop() {
            if let Some(node) = self.arena.get_mut(current_idx) {
                node.height = height;
                stack.extend(node.children().map(|child| (child, height + 1)));
            }
        }
        Ok(())
    }

    /// The node and its whole subtree, deduplicated by payload equivalence.
    pub fn descendants_and_self(&self, idx: Index) -> TreeResult<IndexSet<NodeRef<'_, T, Q>>>
    where
        Q: PayloadEquivalence<T>,
    {
        Ok(self.node(idx)?.descendants_and_self())
    }

    pub fn descendants_and_self_data(
        &self,
        idx: Index,
    ) -> TreeResult<IndexSet<PayloadRef<'_, T, Q>>>
    where
        Q: PayloadEquivalence<T>,
    {
        Ok(self.node(idx)?.descendants_and_self_data())
    }

    pub fn flat_sub_tree(&self, idx: Index) -> TreeResult<IndexMap<String, NodeRef<'_, T, Q>>> {
        self.node(idx)?.flat_sub_tree()
    }

    pub fn flat_sub_tree_with_data(&self, idx: Index) -> TreeResult<IndexMap<String, &T>> {
        self.node(idx)?.flat_sub_tree_with_data()
    }

    /// Moves every node into an arena with strategy `Q2`, rebuilding all child keys.
    ///
    /// Indices are not preserved; the returned map translates old indices to new
    /// ones. Siblings that become equivalent under `Q2` keep the last linked one.
    #[instrument(level = "debug", skip(self))]
    pub fn into_strategy<Q2>(mut self) -> (TreeArena<T, Q2>, IndexMap<Index, Index>)
    where
        Q2: PayloadEquivalence<T>,
    {
        let mut converted = TreeArena::<T, Q2>::with_capacity(self.arena.len());
        converted.path_separator = mem::take(&mut self.path_separator);

        let mut remap = IndexMap::with_capacity(self.arena.len());
        let mut links = Vec::with_capacity(self.arena.len());
        for (old_idx, node) in self.arena.drain() {
            let TreeNode {
                name,
                data,
                height,
                parent,
                children,
            } = node;
            let new_idx = converted.arena.insert(TreeNode {
                name,
                data,
                height,
                parent: None,
                children: IndexMap::new(),
            });
            remap.insert(old_idx, new_idx);
            links.push((new_idx, parent, children));
        }

        for (new_idx, parent, children) in links {
            let parent = parent.and_then(|p| remap.get(&p).copied());
            let mut rekeyed: Children<T, Q2> = IndexMap::with_capacity(children.len());
            for (key, old_child) in children {
                let Some(&new_child) = remap.get(&old_child) else {
                    continue;
                };
                let key = PayloadKey::<T, Q2>::new(key.into_inner());
                if let Some(previous) = rekeyed.shift_remove(&key) {
                    warn!(
                        ?new_idx,
                        ?previous,
                        "sibling dropped: equivalent payload under new strategy"
                    );
                }
                rekeyed.insert(key, new_child);
            }
            if let Some(node) = converted.arena.get_mut(new_idx) {
                node.parent = parent;
                node.children = rekeyed;
            }
        }

        converted.root = self.root.and_then(|root| remap.get(&root).copied());
        (converted, remap)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> TreeIterator<'_, T, Q> {
        TreeIterator::new(self)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter_postorder(&self) -> PostOrderIterator<'_, T, Q> {
        PostOrderIterator::new(self)
    }

    /// Number of levels below and including the root, 0 for an empty tree.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        if let Some(root) = self.root {
            self.calculate_depth(root)
        } else {
            0
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children()
                .map(|child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Collects all leaf nodes (nodes with no children) below the root.
    ///
    /// Empty trees return an empty vector.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_nodes(&self) -> Vec<Index> {
        let mut leaves = Vec::new();
        if let Some(root) = self.root {
            self.collect_leaves(root, &mut leaves);
        }
        leaves
    }

    #[instrument(level = "trace", skip(self, leaves))]
    fn collect_leaves(&self, node_idx: Index, leaves: &mut Vec<Index>) {
        if let Some(node) = self.get_node(node_idx) {
            if node.children.is_empty() {
                leaves.push(node_idx);
            } else {
                for child in node.children() {
                    self.collect_leaves(child, leaves);
                }
            }
        }
    }
}

pub struct TreeIterator<'a, T, Q> {
    arena: &'a TreeArena<T, Q>,
    stack: Vec<Index>,
}

impl<'a, T, Q> TreeIterator<'a, T, Q> {
    fn new(arena: &'a TreeArena<T, Q>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push(root);
        }
        Self { arena, stack }
    }
}

impl<'a, T, Q> Iterator for TreeIterator<'a, T, Q> {
    type Item = (Index, &'a TreeNode<T, Q>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children().rev());
                return Some((current_idx, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a, T, Q> {
    arena: &'a TreeArena<T, Q>,
    stack: Vec<(Index, bool)>,
}

impl<'a, T, Q> PostOrderIterator<'a, T, Q> {
    fn new(arena: &'a TreeArena<T, Q>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = arena.root() {
            stack.push((root, false));
        }
        Self { arena, stack }
    }
}

impl<'a, T, Q> Iterator for PostOrderIterator<'a, T, Q> {
    type Item = (Index, &'a TreeNode<T, Q>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for child in node.children().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}
