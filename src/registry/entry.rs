use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::changer::Mutator;
use crate::codec::Serializer;
use crate::core::{TypeKey, Value};
use crate::parse::Parser;

pub type ClonerFn = dyn Fn(&Value) -> Value + Send + Sync;

/// Everything the engine knows about one registered host type.
///
/// Built with the chained setters below and handed to
/// [`RegistryBuilder::register`](crate::registry::RegistryBuilder::register).
#[derive(Clone)]
pub struct TypeEntry {
    code_name: String,
    native: TypeKey,
    name: Option<String>,
    parser: Option<Arc<dyn Parser>>,
    serializer: Option<Arc<dyn Serializer>>,
    serialize_as: Option<TypeKey>,
    mutator: Option<Arc<dyn Mutator>>,
    user_input_patterns: Vec<String>,
    compiled_patterns: Vec<Regex>,
    before: Vec<String>,
    after: Vec<String>,
    cloner: Option<Arc<ClonerFn>>,
}

impl TypeEntry {
    pub fn new(code_name: impl Into<String>, native: TypeKey) -> Self {
        Self {
            code_name: code_name.into(),
            native,
            name: None,
            parser: None,
            serializer: None,
            serialize_as: None,
            mutator: None,
            user_input_patterns: Vec::new(),
            compiled_patterns: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            cloner: None,
        }
    }

    /// Human readable name, used when printing expressions.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    /// Persist values of this type by converting them to `target` first.
    pub fn with_serialize_as(mut self, target: TypeKey) -> Self {
        self.serialize_as = Some(target);
        self
    }

    pub fn with_mutator(mut self, mutator: impl Mutator + 'static) -> Self {
        self.mutator = Some(Arc::new(mutator));
        self
    }

    /// Patterns matched (whole input, case-insensitively) against how a
    /// script author names this type.
    pub fn with_user_input_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_input_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Code names of entries that must sort after this one.
    pub fn with_before<I, S>(mut self, code_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before.extend(code_names.into_iter().map(Into::into));
        self
    }

    /// Code names of entries that must sort before this one.
    pub fn with_after<I, S>(mut self, code_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(code_names.into_iter().map(Into::into));
        self
    }

    pub fn with_cloner(mut self, cloner: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.cloner = Some(Arc::new(cloner));
        self
    }

    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    pub fn native(&self) -> TypeKey {
        self.native
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code_name)
    }

    pub fn parser(&self) -> Option<&Arc<dyn Parser>> {
        self.parser.as_ref()
    }

    pub fn serializer(&self) -> Option<&Arc<dyn Serializer>> {
        self.serializer.as_ref()
    }

    pub fn serialize_as(&self) -> Option<TypeKey> {
        self.serialize_as
    }

    pub fn mutator(&self) -> Option<&Arc<dyn Mutator>> {
        self.mutator.as_ref()
    }

    pub fn cloner(&self) -> Option<&Arc<ClonerFn>> {
        self.cloner.as_ref()
    }

    pub fn patterns(&self) -> &[String] {
        &self.user_input_patterns
    }

    pub fn before_names(&self) -> &[String] {
        &self.before
    }

    pub fn after_names(&self) -> &[String] {
        &self.after
    }

    /// Whether `text` names this type. Patterns are compiled on registration.
    pub fn matches_user_input(&self, text: &str) -> bool {
        self.compiled_patterns.iter().any(|re| re.is_match(text))
    }

    pub(crate) fn compile_patterns(&mut self) -> Result<(), (String, regex::Error)> {
        self.compiled_patterns = self
            .user_input_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i)^(?:{})$", p)).map_err(|e| (p.clone(), e)))
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("code_name", &self.code_name)
            .field("native", &self.native)
            .field("parser", &self.parser.is_some())
            .field("serializer", &self.serializer.is_some())
            .field("serialize_as", &self.serialize_as)
            .field("mutator", &self.mutator.is_some())
            .field("before", &self.before)
            .field("after", &self.after)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HierarchyBuilder;

    #[test]
    fn test_user_input_patterns() {
        let mut b = HierarchyBuilder::new();
        let block = b.declare("Block", &[]).unwrap();
        let mut entry = TypeEntry::new("block", block)
            .with_name("block")
            .with_user_input_patterns(["blocks?", "cubes?"]);
        entry.compile_patterns().unwrap();

        assert!(entry.matches_user_input("Blocks"));
        assert!(entry.matches_user_input("cube"));
        assert!(!entry.matches_user_input("blockstate"));
        assert_eq!(entry.display_name(), "block");
    }

    #[test]
    fn test_bad_pattern() {
        let mut b = HierarchyBuilder::new();
        let block = b.declare("Block", &[]).unwrap();
        let mut entry = TypeEntry::new("block", block).with_user_input_patterns(["(unclosed"]);
        let (pattern, _) = entry.compile_patterns().unwrap_err();
        assert_eq!(pattern, "(unclosed");
    }
}
