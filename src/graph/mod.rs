//! Core tag graph data structures

mod engine;
mod node;
mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{
    GraphConfig, TagGraph, TrellisError, TrellisResult, DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_DEPTH,
};
pub use node::{Tag, TagId, TagState, COLOR_INHERIT, ROOT_ID};
