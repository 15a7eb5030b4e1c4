//! Core type model
//!
//! The host type hierarchy is declared explicitly up front instead of being
//! discovered through reflection, and every runtime value carries its exact
//! type key.

pub mod types;
pub mod value;

pub use types::{HierarchyBuilder, TypeHierarchy, TypeKey};
pub use value::{Extracted, Value};
