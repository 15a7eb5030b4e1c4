use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{DisplayConfig, RegistrationConfig, RegistryConfig};
use crate::convert::{ConversionGraph, ConverterEdge};
use crate::core::{TypeHierarchy, TypeKey, Value};
use crate::errors::{RegistrationIssue, RegistryError};
use crate::parse::Parser;
use crate::performance::{CacheStats, DispatchCache};
use crate::registry::entry::TypeEntry;
use crate::registry::order::resolve_order;

static CODE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new("^[a-z0-9_]+$").expect("static pattern"));

/// Open catalog: modules register entries and converters here at start-up.
pub struct RegistryBuilder {
    hierarchy: Arc<TypeHierarchy>,
    registration: RegistrationConfig,
    display: DisplayConfig,
    entries: Vec<TypeEntry>,
    by_code_name: HashMap<String, usize>,
    by_native: HashMap<TypeKey, usize>,
    converters: Vec<ConverterEdge>,
    issues: Vec<RegistrationIssue>,
}

impl RegistryBuilder {
    pub fn new(hierarchy: Arc<TypeHierarchy>) -> Self {
        Self::with_config(hierarchy, &RegistryConfig::default())
    }

    pub fn with_config(hierarchy: Arc<TypeHierarchy>, config: &RegistryConfig) -> Self {
        Self {
            hierarchy,
            registration: config.registration.clone(),
            display: config.display.clone(),
            entries: Vec::new(),
            by_code_name: HashMap::new(),
            by_native: HashMap::new(),
            converters: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    pub fn display_config(&self) -> &DisplayConfig {
        &self.display
    }

    /// Add a type entry to the catalog.
    ///
    /// Duplicate code names or native types are fatal unless
    /// `soft_api_exceptions` is set, in which case the entry is skipped and
    /// the conflict is kept as a registration issue.
    pub fn register(&mut self, mut entry: TypeEntry) -> Result<(), RegistryError> {
        if !CODE_NAME.is_match(entry.code_name()) {
            return Err(RegistryError::InvalidCodeName(entry.code_name().to_string()));
        }

        let conflict = if let Some(&idx) = self.by_code_name.get(entry.code_name()) {
            Some(RegistryError::DuplicateName {
                code_name: entry.code_name().to_string(),
                type_name: self.hierarchy.name(entry.native()).to_string(),
                existing: self.hierarchy.name(self.entries[idx].native()).to_string(),
            })
        } else {
            self.by_native
                .get(&entry.native())
                .map(|&idx| RegistryError::DuplicateType {
                    code_name: entry.code_name().to_string(),
                    type_name: self.hierarchy.name(entry.native()).to_string(),
                    existing: self.entries[idx].code_name().to_string(),
                })
        };

        if let Some(error) = conflict {
            if !self.registration.soft_api_exceptions {
                return Err(error);
            }
            warn!("Ignored a registration error due to configuration: {}", error);
            self.issues.push(RegistrationIssue::Skipped(error.to_string()));
            return Ok(());
        }

        entry
            .compile_patterns()
            .map_err(|(pattern, source)| RegistryError::InvalidPattern {
                code_name: entry.code_name().to_string(),
                pattern,
                source,
            })?;

        let idx = self.entries.len();
        self.by_code_name.insert(entry.code_name().to_string(), idx);
        self.by_native.insert(entry.native(), idx);
        self.entries.push(entry);
        Ok(())
    }

    pub fn register_converter(&mut self, edge: ConverterEdge) {
        self.converters.push(edge);
    }

    pub fn exact_entry(&self, ty: TypeKey) -> Option<&TypeEntry> {
        self.by_native.get(&ty).map(|&idx| &self.entries[idx])
    }

    pub fn entry_by_code_name(&self, code_name: &str) -> Option<&TypeEntry> {
        self.by_code_name.get(code_name).map(|&idx| &self.entries[idx])
    }

    /// Parser registered for exactly `ty`; usable before the catalog is frozen.
    pub fn exact_parser(&self, ty: TypeKey) -> Option<&Arc<dyn Parser>> {
        self.exact_entry(ty).and_then(TypeEntry::parser)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close registration: order the catalog and validate aliases.
    ///
    /// The calling thread becomes the primary execution context used by the
    /// codec's synchronous-serializer check.
    pub fn freeze(self) -> Result<TypeRegistry, RegistryError> {
        let ordering = resolve_order(
            &self.entries,
            &self.hierarchy,
            self.registration.warn_unresolved_dependencies,
        )?;

        let mut slots: Vec<Option<TypeEntry>> = self.entries.into_iter().map(Some).collect();
        let entries: Vec<TypeEntry> = ordering
            .order
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();

        let by_code_name = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.code_name().to_string(), idx))
            .collect();
        let by_native: HashMap<TypeKey, usize> = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.native(), idx))
            .collect();

        let alias_issues = validate_serialize_as(&entries, &by_native, &self.hierarchy);
        for issue in &alias_issues {
            warn!("{}", issue);
        }
        let mut issues = self.issues;
        issues.extend(ordering.dropped);
        issues.extend(alias_issues);

        if self.registration.log_order {
            debug!(
                "Type entry order: {}",
                entries
                    .iter()
                    .map(TypeEntry::code_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        let conversions = Arc::new(ConversionGraph::new(
            Arc::clone(&self.hierarchy),
            self.converters,
        ));

        Ok(TypeRegistry {
            hierarchy: self.hierarchy,
            display: self.display,
            entries,
            by_code_name,
            by_native,
            conversions,
            closest: DispatchCache::new(),
            displayers: DispatchCache::new(),
            issues,
            primary: thread::current().id(),
        })
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("entries", &self.entries.len())
            .field("converters", &self.converters.len())
            .field("issues", &self.issues)
            .finish()
    }
}

fn validate_serialize_as(
    entries: &[TypeEntry],
    by_native: &HashMap<TypeKey, usize>,
    hierarchy: &TypeHierarchy,
) -> Vec<RegistrationIssue> {
    entries
        .iter()
        .filter_map(|entry| {
            let target = entry.serialize_as()?;
            let issue = match by_native.get(&target) {
                None => RegistrationIssue::SerializeAsUnregistered {
                    code_name: entry.code_name().to_string(),
                    target: hierarchy.name(target).to_string(),
                },
                Some(&idx) if entries[idx].serializer().is_none() => {
                    RegistrationIssue::SerializeAsNotSerializable {
                        code_name: entry.code_name().to_string(),
                        target: entries[idx].code_name().to_string(),
                    }
                }
                Some(_) => return None,
            };
            Some(issue)
        })
        .collect()
}

/// Frozen catalog. Immutable apart from its dispatch caches and safe to
/// share between worker threads.
pub struct TypeRegistry {
    pub(crate) hierarchy: Arc<TypeHierarchy>,
    pub(crate) display: DisplayConfig,
    pub(crate) entries: Vec<TypeEntry>,
    by_code_name: HashMap<String, usize>,
    by_native: HashMap<TypeKey, usize>,
    pub(crate) conversions: Arc<ConversionGraph>,
    closest: DispatchCache<TypeKey, Option<usize>>,
    pub(crate) displayers: DispatchCache<TypeKey, Option<usize>>,
    issues: Vec<RegistrationIssue>,
    primary: ThreadId,
}

impl TypeRegistry {
    pub fn hierarchy(&self) -> &Arc<TypeHierarchy> {
        &self.hierarchy
    }

    pub fn conversions(&self) -> &Arc<ConversionGraph> {
        &self.conversions
    }

    pub fn display_config(&self) -> &DisplayConfig {
        &self.display
    }

    /// Entries in priority order, most specific first.
    pub fn entries(&self) -> impl Iterator<Item = &TypeEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Non-fatal problems collected during registration and freezing.
    pub fn issues(&self) -> &[RegistrationIssue] {
        &self.issues
    }

    pub fn exact_entry(&self, ty: TypeKey) -> Option<&TypeEntry> {
        self.by_native.get(&ty).map(|&idx| &self.entries[idx])
    }

    pub fn entry_by_code_name(&self, code_name: &str) -> Option<&TypeEntry> {
        self.by_code_name.get(code_name).map(|&idx| &self.entries[idx])
    }

    pub fn exact_parser(&self, ty: TypeKey) -> Option<&Arc<dyn Parser>> {
        self.exact_entry(ty).and_then(TypeEntry::parser)
    }

    /// Most specific entry whose native type `ty` is assignable to.
    pub fn closest_entry(&self, ty: TypeKey) -> Option<&TypeEntry> {
        self.closest_index(ty).map(|idx| &self.entries[idx])
    }

    pub(crate) fn closest_index(&self, ty: TypeKey) -> Option<usize> {
        self.closest.get_or_compute(ty, || {
            self.entries
                .iter()
                .position(|e| self.hierarchy.is_assignable(ty, e.native()))
        })
    }

    /// Every entry `ty` is assignable to, most specific first.
    pub fn all_supertype_entries(&self, ty: TypeKey) -> Vec<&TypeEntry> {
        self.entries
            .iter()
            .filter(|e| self.hierarchy.is_assignable(ty, e.native()))
            .collect()
    }

    /// Closest entry for the common supertype of several runtime types.
    pub fn common_supertype_entry(&self, types: &[TypeKey]) -> Option<&TypeEntry> {
        let common = self.hierarchy.common_supertype(types)?;
        self.closest_entry(common)
    }

    /// Entry named by `text` through its user input patterns.
    pub fn entry_from_user_input(&self, text: &str) -> Option<&TypeEntry> {
        let text = text.trim();
        self.entries.iter().find(|e| e.matches_user_input(text))
    }

    pub fn type_from_user_input(&self, text: &str) -> Option<TypeKey> {
        self.entry_from_user_input(text).map(TypeEntry::native)
    }

    /// Copy a value through its type's cloner, or share the payload when the
    /// type has none.
    pub fn clone_value(&self, value: &Value) -> Value {
        self.closest_entry(value.ty())
            .and_then(TypeEntry::cloner)
            .map(|cloner| cloner(value))
            .unwrap_or_else(|| value.clone())
    }

    /// Convert a value to `to`, chaining converters as needed.
    pub fn convert(&self, value: &Value, to: TypeKey) -> Option<Value> {
        self.conversions.convert(value, to)
    }

    pub fn convert_all(&self, values: &[Value], to: TypeKey) -> Vec<Value> {
        self.conversions.convert_all(values, to)
    }

    pub fn converter_exists(&self, from: TypeKey, to: TypeKey) -> bool {
        self.conversions.converter_exists(from, to)
    }

    /// Whether the caller runs on the thread that froze the registry.
    pub fn is_primary_context(&self) -> bool {
        thread::current().id() == self.primary
    }

    pub fn closest_cache_stats(&self) -> CacheStats {
        self.closest.stats()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field(
                "entries",
                &self.entries.iter().map(TypeEntry::code_name).collect::<Vec<_>>(),
            )
            .field("conversions", &self.conversions)
            .field("issues", &self.issues)
            .finish()
    }
}
