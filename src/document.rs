//! Owned, nested form of a subtree for (de)serialization.

use generational_arena::Index;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, instrument, warn};

use crate::arena::TreeArena;
use crate::equivalence::PayloadEquivalence;
use crate::errors::{TreeError, TreeResult};
use crate::node_ref::NodeRef;

/// A subtree as it is persisted: names, payloads and ordered children.
///
/// Parent links and heights are not part of it; they are rebuilt (parents) or
/// reset (heights) when the document is loaded into an arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct NodeDocument<T> {
    #[serde(default)]
    pub name: String,
    pub data: T,
    #[serde(default)]
    pub children: Vec<NodeDocument<T>>,
}

impl<T> NodeDocument<T> {
    pub fn new(name: impl Into<String>, data: T) -> Self {
        Self {
            name: name.into(),
            data,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<NodeDocument<T>>) -> Self {
        self.children = children;
        self
    }
}

impl<'a, T: Clone, Q> From<NodeRef<'a, T, Q>> for NodeDocument<T> {
    fn from(node: NodeRef<'a, T, Q>) -> Self {
        Self {
            name: node.name().to_string(),
            data: node.data().clone(),
            children: node.children().map(NodeDocument::from).collect(),
        }
    }
}

impl<T, Q> TreeArena<T, Q> {
    pub fn to_document(&self, idx: Index) -> TreeResult<NodeDocument<T>>
    where
        T: Clone,
    {
        Ok(NodeDocument::from(self.node(idx)?))
    }

    /// Builds a fresh arena whose root is the document's top node.
    pub fn from_document(document: NodeDocument<T>) -> TreeResult<Self>
    where
        T: Clone,
        Q: PayloadEquivalence<T>,
    {
        let mut arena = Self::new();
        let root = arena.graft_document(None, document)?;
        arena.set_root(root)?;
        Ok(arena)
    }

    /// Creates every node of `document` and links it under `parent`.
    ///
    /// Each created node records its parent, so back-references are complete
    /// after loading. Returns the index of the document's top node.
    ///
    /// # Errors
    /// [`TreeError::DuplicatePayload`] when a node's payload is equivalent to a
    /// sibling's, either within the document or under `parent`. Nothing of the
    /// document stays in the arena then.
    #[instrument(level = "debug", skip(self, document))]
    pub fn graft_document(
        &mut self,
        parent: Option<Index>,
        document: NodeDocument<T>,
    ) -> TreeResult<Index>
    where
        T: Clone,
        Q: PayloadEquivalence<T>,
    {
        let NodeDocument {
            name,
            data,
            children,
        } = document;
        if let Some(parent_idx) = parent {
            self.ensure_unique_payload(parent_idx, &name, &data)?;
        }
        let top = self.insert_node(name, data, parent)?;
        let mut created = 1_usize;

        // Reverse so siblings are linked in document order
        let mut stack: Vec<_> = children.into_iter().rev().map(|c| (c, top)).collect();
        while let Some((current, parent_idx)) = stack.pop() {
            if let Err(e) = self.ensure_unique_payload(parent_idx, &current.name, &current.data) {
                self.remove_subtree(top)?;
                return Err(e);
            }
            let current_idx = self.insert_node(current.name, current.data, Some(parent_idx))?;
            created += 1;
            stack.extend(
                current
                    .children
                    .into_iter()
                    .rev()
                    .map(|c| (c, current_idx)),
            );
        }

        debug!(created, "document grafted");
        Ok(top)
    }

    fn ensure_unique_payload(&self, parent: Index, name: &str, data: &T) -> TreeResult<()>
    where
        Q: PayloadEquivalence<T>,
    {
        if self.child_by_data(parent, data)?.is_some() {
            warn!(?parent, name, "document sibling with equivalent payload");
            return Err(TreeError::DuplicatePayload {
                parent,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl<T: Serialize, Q> Serialize for TreeArena<T, Q> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let root = self.root_node().map_err(S::Error::custom)?;
        root.serialize(serializer)
    }
}

impl<'de, T, Q> Deserialize<'de> for TreeArena<T, Q>
where
    T: Clone + Deserialize<'de>,
    Q: PayloadEquivalence<T>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = NodeDocument::<T>::deserialize(deserializer)?;
        Self::from_document(document).map_err(D::Error::custom)
    }
}
