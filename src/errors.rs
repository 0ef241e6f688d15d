use generational_arena::Index;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("node not found in arena: {0:?}")]
    NodeNotFound(Index),

    #[error("tree has no root node")]
    NoRoot,

    #[error("duplicate path in flattened subtree: {0}")]
    DuplicatePath(String),

    #[error("sibling with equivalent payload already linked under {parent:?}: {name}")]
    DuplicatePayload { parent: Index, name: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

pub type TreeResult<T> = Result<T, TreeError>;
