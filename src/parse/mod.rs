//! Text parsing pipeline
//!
//! `parse_direct` tries every registered parser producing the target type in
//! priority order. `parse` falls back to exactly one converter hop: text is
//! parsed as an edge's source type and then converted.

pub mod display;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::{TypeKey, Value};
use crate::errors::{ParseDiagnostic, ParseError};
use crate::registry::TypeRegistry;

pub use display::StringMode;

/// Where the text being parsed comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseContext {
    Default,
    Event,
    Command,
    Config,
    Script,
}

/// Why a parser produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The text is not something this parser understands; stays silent.
    NoMatch,
    /// The text looked right but is invalid; reported to the user.
    Invalid(String),
}

/// Rendering hints passed through to parsers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayFlags(u8);

impl DisplayFlags {
    pub const NONE: DisplayFlags = DisplayFlags(0);
    pub const NO_ARTICLE: DisplayFlags = DisplayFlags(1);
    pub const PLURAL: DisplayFlags = DisplayFlags(1 << 1);

    pub fn contains(self, other: DisplayFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: DisplayFlags) -> DisplayFlags {
        DisplayFlags(self.0 | other.0)
    }
}

/// Text conversion for one registered type.
pub trait Parser: Send + Sync {
    fn parse(&self, text: &str, ctx: ParseContext) -> Result<Value, ParseFailure>;

    fn can_parse(&self, _ctx: ParseContext) -> bool {
        true
    }

    fn to_display(&self, value: &Value, flags: DisplayFlags) -> String;

    /// Form used inside variable names.
    fn to_variable_name(&self, value: &Value) -> String;

    fn to_debug(&self, value: &Value) -> String {
        self.to_display(value, DisplayFlags::NONE)
    }
}

type ParseFn = dyn Fn(&str, ParseContext) -> Result<Value, ParseFailure> + Send + Sync;
type RenderFn = dyn Fn(&Value) -> String + Send + Sync;

/// Closure-backed [`Parser`] for host modules.
#[derive(Clone)]
pub struct FnParser {
    parse: Option<Arc<ParseFn>>,
    display: Arc<RenderFn>,
    variable_name: Option<Arc<RenderFn>>,
    debug: Option<Arc<RenderFn>>,
    contexts: Option<Vec<ParseContext>>,
}

impl FnParser {
    pub fn new(
        parse: impl Fn(&str, ParseContext) -> Result<Value, ParseFailure> + Send + Sync + 'static,
        display: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            parse: Some(Arc::new(parse)),
            display: Arc::new(display),
            variable_name: None,
            debug: None,
            contexts: None,
        }
    }

    /// A parser that only prints values and never parses text.
    pub fn display_only(display: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self {
            parse: None,
            display: Arc::new(display),
            variable_name: None,
            debug: None,
            contexts: None,
        }
    }

    pub fn only_in(mut self, contexts: &[ParseContext]) -> Self {
        self.contexts = Some(contexts.to_vec());
        self
    }

    pub fn with_variable_name(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.variable_name = Some(Arc::new(f));
        self
    }

    pub fn with_debug(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.debug = Some(Arc::new(f));
        self
    }
}

impl Parser for FnParser {
    fn parse(&self, text: &str, ctx: ParseContext) -> Result<Value, ParseFailure> {
        match &self.parse {
            Some(parse) => parse(text, ctx),
            None => Err(ParseFailure::NoMatch),
        }
    }

    fn can_parse(&self, ctx: ParseContext) -> bool {
        self.parse.is_some()
            && self
                .contexts
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&ctx))
    }

    fn to_display(&self, value: &Value, _flags: DisplayFlags) -> String {
        (self.display)(value)
    }

    fn to_variable_name(&self, value: &Value) -> String {
        match &self.variable_name {
            Some(f) => f(value),
            None => (self.display)(value),
        }
    }

    fn to_debug(&self, value: &Value) -> String {
        match &self.debug {
            Some(f) => f(value),
            None => (self.display)(value),
        }
    }
}

impl fmt::Debug for FnParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnParser")
            .field("parses", &self.parse.is_some())
            .field("contexts", &self.contexts)
            .finish()
    }
}

impl TypeRegistry {
    /// Parse `text` with a parser whose type is assignable to `target`.
    pub fn parse_direct(&self, text: &str, target: TypeKey, ctx: ParseContext) -> Option<Value> {
        self.parse_direct_collect(text, target, ctx, &mut Vec::new())
    }

    pub fn try_parse_direct(
        &self,
        text: &str,
        target: TypeKey,
        ctx: ParseContext,
    ) -> Result<Value, ParseError> {
        let mut diagnostics = Vec::new();
        self.parse_direct_collect(text, target, ctx, &mut diagnostics)
            .ok_or_else(|| self.no_match(text, target, diagnostics))
    }

    /// Parse directly, or through a single converter hop.
    pub fn parse(&self, text: &str, target: TypeKey, ctx: ParseContext) -> Option<Value> {
        self.parse_collect(text, target, ctx, &mut Vec::new())
    }

    pub fn try_parse(
        &self,
        text: &str,
        target: TypeKey,
        ctx: ParseContext,
    ) -> Result<Value, ParseError> {
        let mut diagnostics = Vec::new();
        self.parse_collect(text, target, ctx, &mut diagnostics)
            .ok_or_else(|| self.no_match(text, target, diagnostics))
    }

    fn parse_collect(
        &self,
        text: &str,
        target: TypeKey,
        ctx: ParseContext,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Option<Value> {
        if let Some(value) = self.parse_direct_collect(text, target, ctx, diagnostics) {
            return Some(value);
        }

        for edge in self.conversions.edges_into(target) {
            if ctx == ParseContext::Command && edge.flags().no_command_arguments {
                continue;
            }
            let Some(source) = self.parse_direct_collect(text, edge.from(), ctx, diagnostics) else {
                continue;
            };
            if let Some(converted) = edge.apply(&source) {
                return Some(converted);
            }
        }
        None
    }

    fn parse_direct_collect(
        &self,
        text: &str,
        target: TypeKey,
        ctx: ParseContext,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Option<Value> {
        for entry in &self.entries {
            let Some(parser) = entry.parser() else {
                continue;
            };
            if !parser.can_parse(ctx) || !self.hierarchy.is_assignable(entry.native(), target) {
                continue;
            }

            match parser.parse(text, ctx) {
                Ok(value) => {
                    debug!("Parsed '{}' as {}", text, entry.code_name());
                    return Some(value);
                }
                Err(ParseFailure::NoMatch) => {}
                Err(ParseFailure::Invalid(message)) => diagnostics.push(ParseDiagnostic {
                    code_name: entry.code_name().to_string(),
                    message,
                }),
            }
        }
        None
    }

    fn no_match(&self, text: &str, target: TypeKey, diagnostics: Vec<ParseDiagnostic>) -> ParseError {
        let target = self
            .exact_entry(target)
            .map(|e| e.display_name().to_string())
            .unwrap_or_else(|| self.hierarchy.name(target).to_string());
        ParseError::NoMatch {
            text: text.to_string(),
            target,
            diagnostics,
        }
    }
}
