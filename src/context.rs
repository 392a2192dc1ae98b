//! Session context fields and the gate that keeps producers from running
//! before a goal's required fields are known.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::goals::GoalDefinition;

/// Key/value facts the user has supplied for this session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context {
    fields: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Scalar field rendered as text; arrays and objects yield None
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Apply updates; returns true when any field gained a different value
    pub fn extend<I>(&mut self, updates: I) -> bool
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut changed = false;
        for (key, value) in updates {
            if self.fields.get(&key) != Some(&value) {
                self.fields.insert(key, value);
                changed = true;
            }
        }
        changed
    }

    /// Present means set and not null, not an empty or blank string,
    /// not an empty array and not an empty object.
    pub fn is_present(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Required context fields of `goal` that are missing, in declaration order
pub fn missing_fields(goal: &GoalDefinition, context: &Context) -> Vec<String> {
    goal.required_context
        .iter()
        .filter(|field| !context.is_present(field))
        .cloned()
        .collect()
}

pub fn is_satisfied(goal: &GoalDefinition, context: &Context) -> bool {
    missing_fields(goal, context).is_empty()
}

/// Parse a `key=value; key=value` list. Values that parse as JSON keep their
/// type; anything else is taken as a string.
pub fn parse_assignments(raw: &str) -> Vec<(String, Value)> {
    raw.split([';', '\n'])
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let parsed = serde_json::from_str::<Value>(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            Some((key.to_string(), parsed))
        })
        .collect()
}
