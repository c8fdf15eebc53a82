//! Variables and `$(label:name)` substitution
//!
//! Command text may reference variables before the payload is built. The
//! instance publishes its own variables (`tcp_response`) under its label.

use crate::network::payload::decode_latin1;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

/// Text substituted for references to unknown variables
pub const UNKNOWN_VALUE: &str = "$NA";

fn reference_regex() -> &'static Regex {
    static REFERENCE_RE: OnceLock<Regex> = OnceLock::new();
    REFERENCE_RE.get_or_init(|| {
        Regex::new(r"\$\(([^:$)]+):([^)$]+)\)").expect("reference pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Text(text) => write!(f, "{}", text),
            // one char per byte so the value survives a literal re-send
            VariableValue::Bytes(bytes) => write!(f, "{}", decode_latin1(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Default)]
pub struct VariableStore {
    values: HashMap<String, VariableValue>,
    definitions: BTreeMap<String, Vec<VariableDefinition>>,
}

fn key(label: &str, name: &str) -> String {
    format!("{}:{}", label, name)
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the variables published under `label`.
    ///
    /// Values of variables that are no longer defined are dropped.
    pub fn set_definitions(&mut self, label: &str, definitions: Vec<VariableDefinition>) {
        let prefix = format!("{}:", label);
        self.values.retain(|k, _| match k.strip_prefix(&prefix) {
            Some(name) => definitions.iter().any(|d| d.name == name),
            None => true,
        });
        self.definitions.insert(label.to_string(), definitions);
    }

    pub fn definitions(&self, label: &str) -> &[VariableDefinition] {
        self.definitions
            .get(label)
            .map(|d| d.as_slice())
            .unwrap_or_default()
    }

    pub fn set(&mut self, label: &str, name: &str, value: VariableValue) {
        self.values.insert(key(label, name), value);
    }

    pub fn get(&self, label: &str, name: &str) -> Option<&VariableValue> {
        self.values.get(&key(label, name))
    }

    /// Look up a `label:name` reference
    pub fn get_ref(&self, reference: &str) -> Option<&VariableValue> {
        self.values.get(reference)
    }

    /// Replace every `$(label:name)` in `text` with the variable value
    pub fn parse(&self, text: &str) -> String {
        reference_regex()
            .replace_all(text, |caps: &Captures| match self.get(&caps[1], &caps[2]) {
                Some(value) => value.to_string(),
                None => UNKNOWN_VALUE.to_string(),
            })
            .into_owned()
    }
}
