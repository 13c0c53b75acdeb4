//! Ordered indexes and scratch lists.

pub mod bst;
pub mod dlist;

pub use bst::{OrderedIndex, OrderedKey};
pub use dlist::{DList, DListCursor, NodeId};
