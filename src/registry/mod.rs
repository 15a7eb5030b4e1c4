//! Type entry catalog
//!
//! Two phases: a [`RegistryBuilder`] accepts registrations at start-up and
//! [`RegistryBuilder::freeze`] turns it into an immutable [`TypeRegistry`]
//! ordered most-specific-first.

pub mod catalog;
pub mod entry;
pub(crate) mod order;

pub use catalog::{RegistryBuilder, TypeRegistry};
pub use entry::TypeEntry;
