//! Built-in types
//!
//! The handful of types every script host needs: objects, numbers, booleans,
//! text and timespans, together with their parsers, codecs and the
//! number-to-text conversion.

pub mod timespan;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::{BincodeSerializer, JsonSerializer};
use crate::convert::ConverterEdge;
use crate::core::{HierarchyBuilder, TypeKey, Value};
use crate::errors::{HierarchyError, RegistryError};
use crate::parse::{DisplayFlags, ParseContext, ParseFailure, Parser};
use crate::registry::{RegistryBuilder, TypeEntry};

pub use timespan::Timespan;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static pattern"));

/// Digits kept when a number is used inside a variable name.
const VARIABLE_NAME_ACCURACY: usize = 8;

/// Print `value` with at most `accuracy` decimals and no trailing zeros.
pub fn format_number(value: f64, accuracy: usize) -> String {
    let mut text = format!("{:.*}", accuracy, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// Keys of the built-in types in a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinTypes {
    pub object: TypeKey,
    pub number: TypeKey,
    pub boolean: TypeKey,
    pub text: TypeKey,
    pub timespan: TypeKey,
}

/// Declare the built-in types; everything else a host declares should
/// descend from `object`.
pub fn declare_types(builder: &mut HierarchyBuilder) -> Result<BuiltinTypes, HierarchyError> {
    let object = builder.declare("Object", &[])?;
    Ok(BuiltinTypes {
        object,
        number: builder.declare("Number", &[object])?,
        boolean: builder.declare("Boolean", &[object])?,
        text: builder.declare("Text", &[object])?,
        timespan: builder.declare("Timespan", &[object])?,
    })
}

/// Register entries and converters for the built-in types.
pub fn register_entries(registry: &mut RegistryBuilder, types: &BuiltinTypes) -> Result<(), RegistryError> {
    let accuracy = registry.display_config().number_accuracy;

    registry.register(
        TypeEntry::new("object", types.object)
            .with_name("object")
            .with_user_input_patterns(["objects?"]),
    )?;
    registry.register(
        TypeEntry::new("number", types.number)
            .with_name("number")
            .with_parser(NumberParser {
                native: types.number,
                accuracy,
            })
            .with_serializer(BincodeSerializer::<f64>::new())
            .with_user_input_patterns(["num(ber)?s?"]),
    )?;
    registry.register(
        TypeEntry::new("boolean", types.boolean)
            .with_name("boolean")
            .with_parser(BooleanParser {
                native: types.boolean,
            })
            .with_serializer(BincodeSerializer::<bool>::new())
            .with_user_input_patterns(["booleans?"]),
    )?;
    registry.register(
        TypeEntry::new("text", types.text)
            .with_name("text")
            .with_parser(TextParser { native: types.text })
            .with_serializer(JsonSerializer::<String>::new())
            .with_user_input_patterns(["(text|string)s?"]),
    )?;
    registry.register(
        TypeEntry::new("timespan", types.timespan)
            .with_name("time span")
            .with_parser(TimespanParser {
                native: types.timespan,
                accuracy,
            })
            .with_serializer(BincodeSerializer::<Timespan>::new())
            .with_user_input_patterns(["time ?spans?"]),
    )?;

    let text = types.text;
    registry.register_converter(ConverterEdge::new(types.number, text, move |value| {
        let n = value.downcast_ref::<f64>()?;
        Some(Value::new(text, format_number(*n, accuracy)))
    }));
    Ok(())
}

#[derive(Debug)]
struct NumberParser {
    native: TypeKey,
    accuracy: usize,
}

impl Parser for NumberParser {
    fn parse(&self, text: &str, _ctx: ParseContext) -> Result<Value, ParseFailure> {
        let text = text.trim();
        if !NUMBER.is_match(text) {
            return Err(ParseFailure::NoMatch);
        }
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Value::new(self.native, n)),
            _ => Err(ParseFailure::Invalid(format!("'{}' is too large to be a number", text))),
        }
    }

    fn to_display(&self, value: &Value, _flags: DisplayFlags) -> String {
        value
            .downcast_ref::<f64>()
            .map(|n| format_number(*n, self.accuracy))
            .unwrap_or_default()
    }

    fn to_variable_name(&self, value: &Value) -> String {
        value
            .downcast_ref::<f64>()
            .map(|n| format_number(*n, VARIABLE_NAME_ACCURACY))
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct BooleanParser {
    native: TypeKey,
}

impl Parser for BooleanParser {
    fn parse(&self, text: &str, _ctx: ParseContext) -> Result<Value, ParseFailure> {
        match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(Value::new(self.native, true)),
            "false" | "no" | "off" => Ok(Value::new(self.native, false)),
            _ => Err(ParseFailure::NoMatch),
        }
    }

    fn to_display(&self, value: &Value, _flags: DisplayFlags) -> String {
        value
            .downcast_ref::<bool>()
            .map(bool::to_string)
            .unwrap_or_default()
    }

    fn to_variable_name(&self, value: &Value) -> String {
        self.to_display(value, DisplayFlags::NONE)
    }
}

/// Any text is valid text, so scripts would match it everywhere; only
/// configuration values are parsed as plain text.
#[derive(Debug)]
struct TextParser {
    native: TypeKey,
}

impl Parser for TextParser {
    fn parse(&self, text: &str, _ctx: ParseContext) -> Result<Value, ParseFailure> {
        Ok(Value::new(self.native, text.to_string()))
    }

    fn can_parse(&self, ctx: ParseContext) -> bool {
        ctx == ParseContext::Config
    }

    fn to_display(&self, value: &Value, _flags: DisplayFlags) -> String {
        value.downcast_ref::<String>().cloned().unwrap_or_default()
    }

    fn to_variable_name(&self, value: &Value) -> String {
        self.to_display(value, DisplayFlags::NONE)
    }

    fn to_debug(&self, value: &Value) -> String {
        format!("\"{}\"", self.to_display(value, DisplayFlags::NONE))
    }
}

#[derive(Debug)]
struct TimespanParser {
    native: TypeKey,
    accuracy: usize,
}

impl Parser for TimespanParser {
    fn parse(&self, text: &str, _ctx: ParseContext) -> Result<Value, ParseFailure> {
        Timespan::parse(text)
            .map(|t| Value::new(self.native, t))
            .ok_or(ParseFailure::NoMatch)
    }

    fn to_display(&self, value: &Value, _flags: DisplayFlags) -> String {
        value
            .downcast_ref::<Timespan>()
            .map(|t| t.to_display(self.accuracy))
            .unwrap_or_default()
    }

    fn to_variable_name(&self, value: &Value) -> String {
        value
            .downcast_ref::<Timespan>()
            .map(|t| format!("timespan:{}", t.millis()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::parse::StringMode;
    use crate::registry::TypeRegistry;

    fn registry() -> (TypeRegistry, BuiltinTypes) {
        let mut h = HierarchyBuilder::new();
        let types = declare_types(&mut h).unwrap();
        let mut reg = RegistryBuilder::new(Arc::new(h.build()));
        register_entries(&mut reg, &types).unwrap();
        (reg.freeze().unwrap(), types)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0, 2), "3");
        assert_eq!(format_number(2.5, 2), "2.5");
        assert_eq!(format_number(1.0 / 3.0, 2), "0.33");
        assert_eq!(format_number(-0.001, 2), "0");
        assert_eq!(format_number(10.0, 0), "10");
        assert_eq!(format_number(1.23456789, 8), "1.23456789");
    }

    #[test]
    fn test_number_to_text_through_conversion() {
        let (reg, k) = registry();
        let v = reg.parse("3.0", k.text, ParseContext::Default).unwrap();
        assert_eq!(v.ty(), k.text);
        assert_eq!(v.downcast_ref::<String>().unwrap(), "3");

        let v = reg.parse("hello", k.text, ParseContext::Config).unwrap();
        assert_eq!(v.downcast_ref::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_parse_builtins() {
        let (reg, k) = registry();
        let n = reg.parse("-4.25", k.number, ParseContext::Default).unwrap();
        assert_eq!(n.downcast_ref::<f64>(), Some(&-4.25));

        let b = reg.parse("Yes", k.boolean, ParseContext::Default).unwrap();
        assert_eq!(b.downcast_ref::<bool>(), Some(&true));
        assert!(reg.parse("maybe", k.boolean, ParseContext::Default).is_none());

        let t = reg.parse("2 minutes", k.timespan, ParseContext::Script).unwrap();
        assert_eq!(t.downcast_ref::<Timespan>().unwrap().millis(), 120_000);
        assert!(reg
            .parse("99999999999999999999 years and 1 second", k.timespan, ParseContext::Script)
            .is_none());
        assert!(reg.parse("99999999999999999999:00", k.timespan, ParseContext::Script).is_none());

        let huge = format!("1{}", "0".repeat(400));
        let err = reg.try_parse(&huge, k.number, ParseContext::Default).unwrap_err();
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_display_modes() {
        let (reg, k) = registry();
        let n = Value::new(k.number, 1.0 / 3.0);
        assert_eq!(reg.to_message(&n), "0.33");
        assert_eq!(reg.to_display_string(&n, StringMode::VariableName, DisplayFlags::NONE), "0.33333333");
        assert_eq!(reg.to_display_string(&n, StringMode::Debug, DisplayFlags::NONE), "[number:0.33]");

        let s = Value::new(k.text, "hi".to_string());
        assert_eq!(reg.to_display_string(&s, StringMode::Debug, DisplayFlags::NONE), "[text:\"hi\"]");

        let t = Value::new(k.timespan, Timespan::from_millis(1_500));
        assert_eq!(reg.to_message(&t), "1.5 seconds");
        assert_eq!(
            reg.to_display_string(&t, StringMode::VariableName, DisplayFlags::NONE),
            "timespan:1500"
        );
    }

    #[test]
    fn test_user_input_names() {
        let (reg, k) = registry();
        assert_eq!(reg.type_from_user_input("Numbers"), Some(k.number));
        assert_eq!(reg.type_from_user_input("strings"), Some(k.text));
        assert_eq!(reg.type_from_user_input("timespan"), Some(k.timespan));
        assert_eq!(reg.type_from_user_input("object"), Some(k.object));
        assert_eq!(reg.type_from_user_input("players"), None);
    }
}
