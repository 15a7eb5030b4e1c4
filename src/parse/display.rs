//! Printing values for messages, debugging and variable names

use crate::core::{Extracted, Value};
use crate::parse::DisplayFlags;
use crate::registry::{TypeEntry, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringMode {
    Message,
    /// `[code_name:debug form]`
    Debug,
    VariableName,
}

impl TypeRegistry {
    pub fn to_display_string(&self, value: &Value, mode: StringMode, flags: DisplayFlags) -> String {
        let Some(entry) = self.displaying_entry(value) else {
            let type_name = self.hierarchy.name(value.ty());
            return match mode {
                StringMode::VariableName => format!("object:{}", type_name),
                StringMode::Message | StringMode::Debug => type_name.to_string(),
            };
        };
        let Some(parser) = entry.parser() else {
            return entry.display_name().to_string();
        };

        match mode {
            StringMode::Message => parser.to_display(value, flags),
            StringMode::Debug => format!("[{}:{}]", entry.code_name(), parser.to_debug(value)),
            StringMode::VariableName => parser.to_variable_name(value),
        }
    }

    pub fn to_message(&self, value: &Value) -> String {
        self.to_display_string(value, StringMode::Message, DisplayFlags::NONE)
    }

    /// Join several values: `a, b and c` (or `or`). An empty list prints the
    /// configured "none" text.
    pub fn to_display_list(&self, values: &[Value], and: bool, mode: StringMode) -> String {
        let parts: Vec<String> = values
            .iter()
            .map(|v| self.to_display_string(v, mode, DisplayFlags::NONE))
            .collect();

        match parts.as_slice() {
            [] => self.display.none_text.clone(),
            [only] => only.clone(),
            [init @ .., last] => format!(
                "{} {} {}",
                init.join(", "),
                if and { "and" } else { "or" },
                last
            ),
        }
    }

    /// Values extracted from an event; several values print as `[a, b]`.
    pub fn display_extracted(&self, extracted: &Extracted, mode: StringMode) -> String {
        match extracted {
            Extracted::One(value) => self.to_display_string(value, mode, DisplayFlags::NONE),
            Extracted::Many(values) => format!(
                "[{}]",
                values
                    .iter()
                    .map(|v| self.to_display_string(v, mode, DisplayFlags::NONE))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// First entry in priority order that both accepts the value's type and
    /// has a parser to print with.
    fn displaying_entry(&self, value: &Value) -> Option<&TypeEntry> {
        let ty = value.ty();
        let idx = self.displayers.get_or_compute(ty, || {
            self.entries
                .iter()
                .position(|e| e.parser().is_some() && self.hierarchy.is_assignable(ty, e.native()))
                .or_else(|| self.closest_index(ty))
        })?;
        Some(&self.entries[idx])
    }
}
