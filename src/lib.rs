//! Arena-backed labeled trees.
//!
//! Every node carries a name, a payload and a caller-managed height. Children are
//! kept in insertion order and keyed by payload, so "is there a child with this
//! payload" is a single hash lookup. Parents are non-owning arena indices.
//!
//! Payload equality and hashing come from a [`PayloadEquivalence`] strategy chosen
//! per arena type, [`Intrinsic`] (the payload's own `Eq`/`Hash`) by default.
//!
//! ```
//! use labeltree::TreeArena;
//!
//! let mut tree = TreeArena::<u32>::new();
//! let r = tree.insert_node("r", 0, None).unwrap();
//! let b = tree.insert_node("b", 2, Some(r)).unwrap();
//! tree.insert_node("a", 1, Some(r)).unwrap();
//! tree.insert_node("c", 3, Some(b)).unwrap();
//!
//! let flat = tree.flat_sub_tree(r).unwrap();
//! assert_eq!(
//!     flat.keys().map(String::as_str).collect::<Vec<_>>(),
//!     ["r", "r/b", "r/b/c", "r/a"],
//! );
//! ```

pub mod arena;
pub mod config;
pub mod document;
pub mod equivalence;
pub mod errors;
pub mod node_ref;
pub mod util;

pub use arena::{PostOrderIterator, TreeArena, TreeIterator, TreeNode};
pub use config::Settings;
pub use document::NodeDocument;
pub use equivalence::{ByPayload, Intrinsic, PayloadEquivalence, PayloadKey, PayloadRef};
pub use errors::{TreeError, TreeResult};
pub use generational_arena::Index;
pub use node_ref::NodeRef;
