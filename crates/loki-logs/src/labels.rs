// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Label sets and their canonical string form.
//!
//! The canonical form is the stream key: `{a="1", b="2"}`, names sorted,
//! values quoted. Values are escaped the same way Loki's label parser reads
//! them back, so two distinct label sets can never share a key.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::errors::LabelError;

/// Label name to label value. Iteration is always sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the previous value if the name was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Union of both sets. On a name collision the value from `other` wins.
    #[must_use]
    pub fn merge(&self, other: &LabelSet) -> LabelSet {
        let mut merged = self.clone();
        for (name, value) in &other.0 {
            merged.0.insert(name.clone(), value.clone());
        }
        merged
    }

    /// Checks every name against `[a-zA-Z_][a-zA-Z0-9_]*` and rejects empty
    /// values.
    pub fn validate(&self) -> Result<(), LabelError> {
        for (name, value) in &self.0 {
            if !is_valid_label_name(name) {
                return Err(LabelError::InvalidName(name.clone()));
            }
            if value.is_empty() {
                return Err(LabelError::EmptyValue(name.clone()));
            }
        }
        Ok(())
    }

    /// Renders the set as `{name="value", ...}` sorted by name, skipping any
    /// name listed in `exclude`.
    #[must_use]
    pub fn canonicalize(&self, exclude: &[&str]) -> String {
        let mut out = String::with_capacity(2 + self.0.len() * 16);
        out.push('{');
        let mut first = true;
        for (name, value) in &self.0 {
            if exclude.contains(&name.as_str()) {
                continue;
            }
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(name);
            out.push_str("=\"");
            escape_label_value(value, &mut out);
            out.push('"');
        }
        out.push('}');
        out
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonicalize(&[]))
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Prometheus label name grammar.
#[must_use]
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn escape_label_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            _ => out.push(ch),
        }
    }
}
