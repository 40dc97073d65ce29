use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field-keyed validation messages. The `base` key holds record-level errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub const BASE: &'static str = "base";

    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single field error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.add(Self::BASE, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Human-readable messages, base errors first.
    ///
    /// `base` messages are emitted verbatim; field messages are prefixed with
    /// the humanized field name (`answer_text` -> `Answer text ...`).
    pub fn full_messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(base) = self.0.get(Self::BASE) {
            out.extend(base.iter().cloned());
        }
        for (field, messages) in &self.0 {
            if field == Self::BASE {
                continue;
            }
            let name = humanize_field(field);
            out.extend(messages.iter().map(|m| format!("{name} {m}")));
        }
        out
    }

    /// Turn into `Err(self)` when non-empty.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

fn humanize_field(field: &str) -> String {
    let spaced = field.strip_suffix("_id").unwrap_or(field).replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
