//! Event values
//!
//! Getters extract typed values from heterogeneous runtime events. Lookups
//! are keyed by the event's concrete class and cached, so the getter list is
//! scanned at most once per class, value type and time variant.

pub mod expression;
pub mod registry;

pub use expression::EventValueExpression;
pub use registry::{
    EventGetterEntry, EventValueBuilder, EventValueRegistry, GetterFn, ResolvedGetter, TimeVariant,
};
