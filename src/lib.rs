//! Runtime type registry for embedded scripting engines.
//!
//! Host modules describe their types once at start-up (parsers, codecs,
//! converters, event-value getters); after the registries are frozen the
//! lookups are lock-free and cached per concrete type.

// Core modules
pub mod core;
pub mod errors;
pub mod registry;
pub mod convert;
pub mod parse;
pub mod codec;
pub mod changer;
pub mod events;
pub mod builtins;

// Ambient
pub mod config;
pub mod infrastructure;
pub mod performance;

// Re-export commonly used items
pub use core::{Extracted, HierarchyBuilder, TypeHierarchy, TypeKey, Value};
pub use errors::{
    ChangeError, CodecError, ConfigError, HierarchyError, ParseError, RegistrationIssue,
    RegistryError, ResolveError, SetupError,
};
pub use registry::{RegistryBuilder, TypeEntry, TypeRegistry};
pub use convert::{ConversionGraph, ConverterEdge, ConverterFlags};
pub use parse::{DisplayFlags, FnParser, ParseContext, ParseFailure, Parser, StringMode};
pub use codec::{BincodeSerializer, JsonSerializer, SerializedValue, Serializer};
pub use changer::{ChangeMode, FnMutator, Mutator};
pub use events::{
    EventGetterEntry, EventValueBuilder, EventValueExpression, EventValueRegistry,
    ResolvedGetter, TimeVariant,
};
pub use builtins::{BuiltinTypes, Timespan};
pub use config::RegistryConfig;
pub use infrastructure::{init_logging, LogConfig, LogFormat};
pub use performance::{CacheStats, DispatchCache};
