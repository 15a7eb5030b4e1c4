//! Error taxonomy for registration, lookup and runtime value handling.
//!
//! Fatal registration problems stop catalog construction (`RegistryError`).
//! Everything else that can go wrong while modules register is collected as a
//! `RegistrationIssue` and reported once when the catalog is frozen.

use std::fmt;

use thiserror::Error;

use crate::changer::ChangeMode;

/// Errors raised while declaring the host type hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    #[error("type '{0}' is already declared")]
    DuplicateType(String),

    #[error("type '{name}' names an undeclared supertype (key {key})")]
    UnknownSupertype { name: String, key: u32 },
}

/// Fatal registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("can't register {type_name} with the code name '{code_name}' because that name is already used by {existing}")]
    DuplicateName {
        code_name: String,
        type_name: String,
        existing: String,
    },

    #[error("can't register the type entry '{code_name}' because the type {type_name} is already registered as '{existing}'")]
    DuplicateType {
        code_name: String,
        type_name: String,
        existing: String,
    },

    #[error("'{0}' is not a valid code name (expected lowercase letters, digits and underscores)")]
    InvalidCodeName(String),

    #[error("invalid user input pattern '{pattern}' for '{code_name}': {source}")]
    InvalidPattern {
        code_name: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("type entries with circular dependencies detected: {}", format_unresolved(.unresolved))]
    CircularDependency {
        unresolved: Vec<UnresolvedEntry>,
        cycles: Vec<Vec<String>>,
    },
}

impl RegistryError {
    /// Code names involved in a circular dependency, if this is one.
    pub fn unresolved_names(&self) -> Vec<&str> {
        match self {
            Self::CircularDependency { unresolved, .. } => {
                unresolved.iter().map(|u| u.code_name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// An entry left over when the dependency resolver stopped making progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEntry {
    pub code_name: String,
    pub pending_after: Vec<String>,
}

impl fmt::Display for UnresolvedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after: {})", self.code_name, self.pending_after.join(", "))
    }
}

fn format_unresolved(unresolved: &[UnresolvedEntry]) -> String {
    unresolved
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Non-fatal registration problems, collected until the catalog is frozen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationIssue {
    #[error("ignored a registration error due to configuration: {0}")]
    Skipped(String),

    #[error("{} dependency/ies could not be resolved for '{code_name}': {}", .missing.len(), .missing.join(", "))]
    UnresolvedDependency {
        code_name: String,
        missing: Vec<String>,
    },

    #[error("'{code_name}'s 'serialize as' type {target} is not registered")]
    SerializeAsUnregistered { code_name: String, target: String },

    #[error("'{code_name}'s 'serialize as' type {target} is not serializable")]
    SerializeAsNotSerializable { code_name: String, target: String },
}

/// One parser's complaint about the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub code_name: String,
    pub message: String,
}

/// Aggregate parse failure: every parser that was tried and what it said.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("can't understand '{text}' as {target}{}", format_diagnostics(.diagnostics))]
    NoMatch {
        text: String,
        target: String,
        diagnostics: Vec<ParseDiagnostic>,
    },
}

impl ParseError {
    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        match self {
            Self::NoMatch { diagnostics, .. } => diagnostics,
        }
    }
}

fn format_diagnostics(diagnostics: &[ParseDiagnostic]) -> String {
    if diagnostics.is_empty() {
        return String::new();
    }
    let joined = diagnostics
        .iter()
        .map(|d| format!("{}: {}", d.code_name, d.message))
        .collect::<Vec<_>>()
        .join("; ");
    format!(" ({})", joined)
}

/// Failures of a value codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bincode codec failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("value payload is not a {expected}")]
    UnexpectedPayload { expected: &'static str },
}

/// Event-value resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("ambiguous {value} value in {event}: declared by unrelated types {}", .candidates.join(", "))]
    Ambiguous {
        event: String,
        value: String,
        candidates: Vec<String>,
    },
}

/// Setup-time configuration errors raised while an expression is initialised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("there are multiple {value} in {event} event; declared by {}", .candidates.join(", "))]
    AmbiguousEventValue {
        event: String,
        value: String,
        candidates: Vec<String>,
    },

    #[error("there's no {value} in {}", .events.join(" or "))]
    NoEventValue { value: String, events: Vec<String> },

    #[error("{value} can't be changed with mode {mode:?}")]
    UnsupportedChange { value: String, mode: ChangeMode },
}

impl From<ResolveError> for SetupError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Ambiguous {
                event,
                value,
                candidates,
            } => SetupError::AmbiguousEventValue {
                event,
                value,
                candidates,
            },
        }
    }
}

/// Runtime failures of an in-place change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeError {
    #[error("unsupported operation: {0:?}")]
    Unsupported(ChangeMode),

    #[error("invalid delta: {0}")]
    InvalidDelta(String),
}

/// Failures loading or saving the crate's own settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_pending() {
        let err = RegistryError::CircularDependency {
            unresolved: vec![
                UnresolvedEntry {
                    code_name: "a".to_string(),
                    pending_after: vec!["c".to_string()],
                },
                UnresolvedEntry {
                    code_name: "b".to_string(),
                    pending_after: vec!["a".to_string()],
                },
            ],
            cycles: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("a (after: c)"));
        assert!(msg.contains("b (after: a)"));
        assert_eq!(err.unresolved_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_error_aggregates() {
        let err = ParseError::NoMatch {
            text: "x".to_string(),
            target: "number".to_string(),
            diagnostics: vec![ParseDiagnostic {
                code_name: "number".to_string(),
                message: "not a number".to_string(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "can't understand 'x' as number (number: not a number)"
        );
    }
}
