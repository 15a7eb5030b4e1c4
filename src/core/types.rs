use std::collections::HashMap;
use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::HierarchyError;

/// Identity of a host type inside a [`TypeHierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey(u32);

impl TypeKey {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct TypeNode {
    name: String,
    supertypes: Vec<TypeKey>,
}

/// Open hierarchy: host types are declared parent-first.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    nodes: Vec<TypeNode>,
    by_name: HashMap<String, TypeKey>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a host type with its direct supertypes.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        supertypes: &[TypeKey],
    ) -> Result<TypeKey, HierarchyError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(HierarchyError::DuplicateType(name));
        }
        if let Some(bad) = supertypes.iter().find(|k| k.index() >= self.nodes.len()) {
            return Err(HierarchyError::UnknownSupertype {
                name,
                key: bad.raw(),
            });
        }

        let key = TypeKey(self.nodes.len() as u32);
        let mut direct = supertypes.to_vec();
        direct.dedup();
        self.by_name.insert(name.clone(), key);
        self.nodes.push(TypeNode {
            name,
            supertypes: direct,
        });
        Ok(key)
    }

    pub fn key(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    /// Close the hierarchy and precompute every ancestor set.
    pub fn build(self) -> TypeHierarchy {
        let count = self.nodes.len();
        let mut ancestors: Vec<BitVec> = Vec::with_capacity(count);

        // Supertypes always precede their subtypes, so one forward pass suffices
        for (idx, node) in self.nodes.iter().enumerate() {
            let mut bits = bitvec![0; count];
            bits.set(idx, true);
            for sup in &node.supertypes {
                for inherited in ancestors[sup.index()].iter_ones() {
                    bits.set(inherited, true);
                }
            }
            ancestors.push(bits);
        }

        let depths = ancestors.iter().map(|bits| bits.count_ones() - 1).collect();

        TypeHierarchy {
            nodes: self.nodes,
            by_name: self.by_name,
            ancestors,
            depths,
        }
    }
}

/// Closed, immutable host type hierarchy with O(1) assignability checks.
#[derive(Debug)]
pub struct TypeHierarchy {
    nodes: Vec<TypeNode>,
    by_name: HashMap<String, TypeKey>,
    ancestors: Vec<BitVec>,
    depths: Vec<usize>,
}

impl TypeHierarchy {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: TypeKey) -> bool {
        key.index() < self.nodes.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        (0..self.nodes.len() as u32).map(TypeKey)
    }

    pub fn name(&self, key: TypeKey) -> &str {
        self.nodes
            .get(key.index())
            .map(|n| n.name.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn key(&self, name: &str) -> Option<TypeKey> {
        self.by_name.get(name).copied()
    }

    pub fn supertypes(&self, key: TypeKey) -> &[TypeKey] {
        self.nodes
            .get(key.index())
            .map(|n| n.supertypes.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a value of `sub` can be used where `sup` is expected.
    pub fn is_assignable(&self, sub: TypeKey, sup: TypeKey) -> bool {
        match self.ancestors.get(sub.index()) {
            Some(bits) => sup.index() < bits.len() && bits[sup.index()],
            None => false,
        }
    }

    pub fn is_strict_subtype(&self, sub: TypeKey, sup: TypeKey) -> bool {
        sub != sup && self.is_assignable(sub, sup)
    }

    /// Number of (transitive) ancestors.
    pub fn depth(&self, key: TypeKey) -> usize {
        self.depths.get(key.index()).copied().unwrap_or(0)
    }

    /// The most derived type every key is assignable to.
    ///
    /// With multiple supertypes several candidates can share the greatest
    /// depth; the earliest declared one wins.
    pub fn common_supertype(&self, keys: &[TypeKey]) -> Option<TypeKey> {
        let (first, rest) = keys.split_first()?;
        let mut common = self.ancestors.get(first.index())?.clone();
        for key in rest {
            let bits = self.ancestors.get(key.index())?;
            for idx in 0..common.len() {
                if common[idx] && !bits[idx] {
                    common.set(idx, false);
                }
            }
        }

        let mut best: Option<TypeKey> = None;
        for idx in common.iter_ones() {
            let candidate = TypeKey(idx as u32);
            match best {
                Some(b) if self.depth(b) >= self.depth(candidate) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (TypeHierarchy, [TypeKey; 5]) {
        let mut b = HierarchyBuilder::new();
        let object = b.declare("Object", &[]).unwrap();
        let event = b.declare("Event", &[object]).unwrap();
        let block = b.declare("BlockEvent", &[event]).unwrap();
        let place = b.declare("PlaceEvent", &[block]).unwrap();
        let chat = b.declare("ChatEvent", &[event]).unwrap();
        (b.build(), [object, event, block, place, chat])
    }

    #[test]
    fn test_assignability() {
        let (h, [object, event, block, place, chat]) = sample();
        assert!(h.is_assignable(place, block));
        assert!(h.is_assignable(place, object));
        assert!(h.is_assignable(place, place));
        assert!(!h.is_assignable(block, place));
        assert!(!h.is_assignable(chat, block));
        assert!(h.is_strict_subtype(block, event));
        assert!(!h.is_strict_subtype(event, event));
        assert_eq!(h.depth(place), 3);
        assert_eq!(h.depth(object), 0);
    }

    #[test]
    fn test_common_supertype() {
        let (h, [_, event, block, place, chat]) = sample();
        assert_eq!(h.common_supertype(&[place, chat]), Some(event));
        assert_eq!(h.common_supertype(&[place, block]), Some(block));
        assert_eq!(h.common_supertype(&[]), None);
    }

    #[test]
    fn test_multiple_supertypes() {
        let mut b = HierarchyBuilder::new();
        let object = b.declare("Object", &[]).unwrap();
        let named = b.declare("Named", &[object]).unwrap();
        let located = b.declare("Located", &[object]).unwrap();
        let entity = b.declare("Entity", &[named, located]).unwrap();
        let h = b.build();
        assert!(h.is_assignable(entity, named));
        assert!(h.is_assignable(entity, located));
        assert_eq!(h.depth(entity), 3);
        assert_eq!(h.supertypes(entity), &[named, located]);
    }

    #[test]
    fn test_declare_errors() {
        let mut b = HierarchyBuilder::new();
        b.declare("Object", &[]).unwrap();
        assert_eq!(
            b.declare("Object", &[]),
            Err(HierarchyError::DuplicateType("Object".to_string()))
        );
        assert!(matches!(
            b.declare("Ghost", &[TypeKey(9)]),
            Err(HierarchyError::UnknownSupertype { key: 9, .. })
        ));
    }
}
