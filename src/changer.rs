//! In-place mutation of host values

use std::sync::Arc;

use crate::core::{TypeHierarchy, TypeKey, Value};
use crate::errors::ChangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeMode {
    Add,
    Set,
    Remove,
    RemoveAll,
    Delete,
    Reset,
}

impl ChangeMode {
    /// Modes that never take a delta.
    pub fn is_deltaless(self) -> bool {
        matches!(self, ChangeMode::Delete | ChangeMode::Reset)
    }
}

/// Describes which changes a type supports and applies them.
pub trait Mutator: Send + Sync {
    /// Delta types accepted for `mode`, or `None` when the mode is unsupported.
    fn accept_change(&self, mode: ChangeMode) -> Option<Vec<TypeKey>>;

    fn change(
        &self,
        targets: &[Value],
        delta: Option<&[Value]>,
        mode: ChangeMode,
    ) -> Result<(), ChangeError>;
}

type ChangeFn = dyn Fn(&[Value], Option<&[Value]>, ChangeMode) -> Result<(), ChangeError> + Send + Sync;

/// Closure-backed [`Mutator`] with an explicit table of supported modes.
pub struct FnMutator {
    accepted: Vec<(ChangeMode, Vec<TypeKey>)>,
    apply: Arc<ChangeFn>,
}

impl FnMutator {
    pub fn new(
        apply: impl Fn(&[Value], Option<&[Value]>, ChangeMode) -> Result<(), ChangeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            accepted: Vec::new(),
            apply: Arc::new(apply),
        }
    }

    pub fn accept(mut self, mode: ChangeMode, delta_types: &[TypeKey]) -> Self {
        self.accepted.retain(|(m, _)| *m != mode);
        self.accepted.push((mode, delta_types.to_vec()));
        self
    }
}

impl Mutator for FnMutator {
    fn accept_change(&self, mode: ChangeMode) -> Option<Vec<TypeKey>> {
        self.accepted
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, types)| types.clone())
    }

    fn change(
        &self,
        targets: &[Value],
        delta: Option<&[Value]>,
        mode: ChangeMode,
    ) -> Result<(), ChangeError> {
        if self.accept_change(mode).is_none() {
            return Err(ChangeError::Unsupported(mode));
        }
        (self.apply)(targets, delta, mode)
    }
}

/// Whether `mutator` supports `mode` with deltas of the given types.
pub fn accepts_change(
    mutator: &dyn Mutator,
    mode: ChangeMode,
    delta_types: &[TypeKey],
    hierarchy: &TypeHierarchy,
) -> bool {
    let Some(accepted) = mutator.accept_change(mode) else {
        return false;
    };
    if mode.is_deltaless() || delta_types.is_empty() {
        return true;
    }
    delta_types
        .iter()
        .all(|d| accepted.iter().any(|a| hierarchy.is_assignable(*d, *a)))
}
