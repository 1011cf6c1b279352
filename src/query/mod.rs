//! Traversal queries over the tag graph

mod traverse;

pub use traverse::{
    ancestors, implied_ancestors, implied_sub_tree, path, path_char_length, sub_tree, view_color,
};
