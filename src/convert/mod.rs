//! Conversion graph
//!
//! Single-hop converters registered by modules, and a breadth-first chain
//! search used to convert values that are already typed. Parsing from text
//! only ever uses one hop (see `parse`).

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::{TypeHierarchy, TypeKey, Value};
use crate::performance::{CacheStats, DispatchCache};

pub type ConvertFn = dyn Fn(&Value) -> Option<Value> + Send + Sync;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterFlags {
    /// Only usable as a single hop, never as part of a chain.
    pub no_chaining: bool,
    /// Ignored when parsing command arguments.
    pub no_command_arguments: bool,
}

impl ConverterFlags {
    pub const NONE: ConverterFlags = ConverterFlags {
        no_chaining: false,
        no_command_arguments: false,
    };

    pub fn no_chaining() -> Self {
        Self {
            no_chaining: true,
            ..Self::NONE
        }
    }

    pub fn no_command_arguments() -> Self {
        Self {
            no_command_arguments: true,
            ..Self::NONE
        }
    }
}

/// A registered one-hop conversion between two types.
#[derive(Clone)]
pub struct ConverterEdge {
    from: TypeKey,
    to: TypeKey,
    flags: ConverterFlags,
    convert: Arc<ConvertFn>,
}

impl ConverterEdge {
    pub fn new(
        from: TypeKey,
        to: TypeKey,
        convert: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            flags: ConverterFlags::NONE,
            convert: Arc::new(convert),
        }
    }

    pub fn with_flags(mut self, flags: ConverterFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn from(&self) -> TypeKey {
        self.from
    }

    pub fn to(&self) -> TypeKey {
        self.to
    }

    pub fn flags(&self) -> ConverterFlags {
        self.flags
    }

    pub fn apply(&self, value: &Value) -> Option<Value> {
        (self.convert)(value)
    }
}

impl fmt::Debug for ConverterEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterEdge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("flags", &self.flags)
            .finish()
    }
}

type Chain = Option<Arc<[usize]>>;

/// Frozen set of converter edges with memoised chain search.
pub struct ConversionGraph {
    hierarchy: Arc<TypeHierarchy>,
    edges: Vec<ConverterEdge>,
    chains: DispatchCache<(TypeKey, TypeKey), Chain>,
}

impl ConversionGraph {
    pub fn new(hierarchy: Arc<TypeHierarchy>, edges: Vec<ConverterEdge>) -> Self {
        Self {
            hierarchy,
            edges,
            chains: DispatchCache::new(),
        }
    }

    pub fn edges(&self) -> &[ConverterEdge] {
        &self.edges
    }

    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    /// Edges whose output can be used where `target` is expected.
    pub fn edges_into(&self, target: TypeKey) -> impl Iterator<Item = &ConverterEdge> + '_ {
        self.edges
            .iter()
            .filter(move |e| self.hierarchy.is_assignable(e.to, target))
    }

    pub fn converter_exists(&self, from: TypeKey, to: TypeKey) -> bool {
        self.hierarchy.is_assignable(from, to) || self.chain(from, to).is_some()
    }

    /// Convert `value` to `to`, walking as many hops as needed.
    pub fn convert(&self, value: &Value, to: TypeKey) -> Option<Value> {
        if self.hierarchy.is_assignable(value.ty(), to) {
            return Some(value.clone());
        }

        let chain = self.chain(value.ty(), to)?;
        let mut current = value.clone();
        for &idx in chain.iter() {
            current = self.edges[idx].apply(&current)?;
        }

        if self.hierarchy.is_assignable(current.ty(), to) {
            Some(current)
        } else {
            debug!(
                "converter chain to {} produced a {}",
                self.hierarchy.name(to),
                self.hierarchy.name(current.ty())
            );
            None
        }
    }

    pub fn convert_all(&self, values: &[Value], to: TypeKey) -> Vec<Value> {
        values.iter().filter_map(|v| self.convert(v, to)).collect()
    }

    pub fn chain_stats(&self) -> CacheStats {
        self.chains.stats()
    }

    fn chain(&self, from: TypeKey, to: TypeKey) -> Chain {
        self.chains
            .get_or_compute((from, to), || self.search(from, to).map(Arc::from))
    }

    /// Shortest edge chain from `from` to something assignable to `to`.
    /// Levels are expanded in edge registration order, so equal-length
    /// chains resolve to the one using earlier-registered edges.
    fn search(&self, from: TypeKey, to: TypeKey) -> Option<Vec<usize>> {
        let mut visited = HashSet::from([from]);
        let mut queue: VecDeque<(TypeKey, Vec<usize>)> = VecDeque::from([(from, Vec::new())]);

        while let Some((current, path)) = queue.pop_front() {
            for (idx, edge) in self.edges.iter().enumerate() {
                if !self.hierarchy.is_assignable(current, edge.from) {
                    continue;
                }
                if edge.flags.no_chaining && !path.is_empty() {
                    continue;
                }

                let mut next = path.clone();
                next.push(idx);
                if self.hierarchy.is_assignable(edge.to, to) {
                    return Some(next);
                }
                if !edge.flags.no_chaining && visited.insert(edge.to) {
                    queue.push_back((edge.to, next));
                }
            }
        }
        None
    }
}

impl fmt::Debug for ConversionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionGraph")
            .field("edges", &self.edges)
            .field("cached_chains", &self.chains.len())
            .finish()
    }
}
