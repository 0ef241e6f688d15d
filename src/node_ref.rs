use std::fmt;
use std::hash::{Hash, Hasher};

use generational_arena::Index;
use indexmap::map::Entry;
use indexmap::{IndexMap, IndexSet};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::arena::{TreeArena, TreeNode};
use crate::equivalence::{Intrinsic, PayloadEquivalence, PayloadRef, Lookup};
use crate::errors::{TreeError, TreeResult};

/// Read-only handle to a node of a [`TreeArena`].
///
/// Two handles are equal when their payloads are equivalent under `Q`, whatever
/// their names, heights, parents or children. Hashing agrees with that, so a
/// `NodeRef` can key any map or set.
pub struct NodeRef<'a, T, Q = Intrinsic> {
    arena: &'a TreeArena<T, Q>,
    index: Index,
    node: &'a TreeNode<T, Q>,
}

impl<T, Q> Clone for NodeRef<'_, T, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, Q> Copy for NodeRef<'_, T, Q> {}

impl<'a, T, Q> NodeRef<'a, T, Q> {
    pub(crate) fn new(arena: &'a TreeArena<T, Q>, index: Index) -> Option<Self> {
        let node = arena.get_node(index)?;
        Some(Self { arena, index, node })
    }

    pub fn index(&self) -> Index {
        self.index
    }

    pub fn name(&self) -> &'a str {
        &self.node.name
    }

    pub fn data(&self) -> &'a T {
        &self.node.data
    }

    pub fn height(&self) -> usize {
        self.node.height
    }

    pub fn arena(&self) -> &'a TreeArena<T, Q> {
        self.arena
    }

    /// The recorded parent, if it is still in the arena.
    pub fn parent(&self) -> Option<NodeRef<'a, T, Q>> {
        self.node
            .parent
            .and_then(|parent| NodeRef::new(self.arena, parent))
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.node.children.is_empty()
    }

    pub fn num_children(&self) -> usize {
        self.node.num_children()
    }

    /// Linked children in insertion order.
    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeRef<'a, T, Q>> + 'a {
        let arena = self.arena;
        self.node
            .children()
            .filter_map(move |child| NodeRef::new(arena, child))
    }

    pub fn child_by_data(&self, data: &T) -> Option<NodeRef<'a, T, Q>>
    where
        Q: PayloadEquivalence<T>,
    {
        self.node
            .children
            .get(&Lookup::<T, Q>::new(data))
            .and_then(|&child| NodeRef::new(self.arena, child))
    }

    pub fn has_child(&self, data: &T) -> bool
    where
        Q: PayloadEquivalence<T>,
    {
        self.node
            .children
            .contains_key(&Lookup::<T, Q>::new(data))
    }

    /// This node plus every node below it.
    ///
    /// The set is keyed by payload equivalence, so distinct nodes with equivalent
    /// payloads collapse into the first one reached in pre-order.
    pub fn descendants_and_self(&self) -> IndexSet<NodeRef<'a, T, Q>>
    where
        Q: PayloadEquivalence<T>,
    {
        let mut set = IndexSet::new();
        set.insert(*self);
        for child in self.children() {
            set.extend(child.descendants_and_self());
        }
        set
    }

    pub fn descendants_and_self_data(&self) -> IndexSet<PayloadRef<'a, T, Q>>
    where
        Q: PayloadEquivalence<T>,
    {
        self.descendants_and_self()
            .into_iter()
            .map(|node| PayloadRef::new(node.data()))
            .collect()
    }

    /// Maps the path of every node in this subtree to the node.
    ///
    /// This node is keyed by its bare name, each descendant by the names from here
    /// down joined with the arena's path separator (`r`, `r/a`, `r/b/c`, ...).
    ///
    /// # Errors
    /// [`TreeError::DuplicatePath`] when two nodes end up with the same path,
    /// i.e. siblings share a name.
    pub fn flat_sub_tree(&self) -> TreeResult<IndexMap<String, NodeRef<'a, T, Q>>> {
        let separator = self.arena.path_separator();
        let mut flat = IndexMap::new();
        flat.insert(self.name().to_string(), *self);

        for child in self.children() {
            for (path, node) in child.flat_sub_tree()? {
                match flat.entry(format!("{}{}{}", self.name(), separator, path)) {
                    Entry::Occupied(entry) => {
                        return Err(TreeError::DuplicatePath(entry.key().clone()))
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(node);
                    }
                }
            }
        }
        Ok(flat)
    }

    pub fn flat_sub_tree_with_data(&self) -> TreeResult<IndexMap<String, &'a T>> {
        Ok(self
            .flat_sub_tree()?
            .into_iter()
            .map(|(path, node)| (path, node.data()))
            .collect())
    }
}

impl<T, Q> PartialEq for NodeRef<'_, T, Q>
where
    Q: PayloadEquivalence<T>,
{
    fn eq(&self, other: &Self) -> bool {
        Q::equivalent(&self.node.data, &other.node.data)
    }
}

impl<T, Q> Eq for NodeRef<'_, T, Q> where Q: PayloadEquivalence<T> {}

impl<T, Q> Hash for NodeRef<'_, T, Q>
where
    Q: PayloadEquivalence<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(Q::hash_of(&self.node.data));
    }
}

impl<T: fmt::Debug, Q> fmt::Debug for NodeRef<'_, T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("index", &self.index)
            .field("name", &self.node.name)
            .field("data", &self.node.data)
            .finish()
    }
}

// Persisted form is { name, data, children }; parent and height are transient
// and the payload index is rebuilt from the children on load.
impl<T: Serialize, Q> Serialize for NodeRef<'_, T, Q> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct ChildrenSeq<'a, T, Q>(NodeRef<'a, T, Q>);

        impl<T: Serialize, Q> Serialize for ChildrenSeq<'_, T, Q> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.0.children())
            }
        }

        let mut state = serializer.serialize_struct("Node", 3)?;
        state.serialize_field("name", &self.node.name)?;
        state.serialize_field("data", &self.node.data)?;
        state.serialize_field("children", &ChildrenSeq(*self))?;
        state.end()
    }
}
