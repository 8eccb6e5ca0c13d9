//! Ordered map backed by a B+ tree: the storage core everything else in
//! this crate sits on top of.

mod construction;
mod delete_operations;
mod get_operations;
mod insert_operations;
mod iteration;
mod range_queries;
mod tree_structure;
mod types;
mod validation;

pub use iteration::{ItemIterator, KeyIterator, ValueIterator};
pub use range_queries::RangeIterator;
pub use tree_structure::NodeCounts;
pub use types::OrderedMap;
