use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value, json};

use super::ProducerId;

/// Structured result of one producer
pub type ResultMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ProducerOutcome {
    Available(ResultMap),
    /// Placeholder for a producer that failed, timed out or had nothing to read
    Unavailable { reason: String },
}

impl ProducerOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Available(map) => Value::Object(map.clone()),
            Self::Unavailable { reason } => json!({"status": "unavailable", "reason": reason}),
        }
    }
}

/// Producer outcomes for one goal run, in execution order.
///
/// Every producer that was attempted has exactly one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    entries: Vec<(ProducerId, ProducerOutcome)>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the outcome for `id`, keeping first-insert order
    pub fn insert(&mut self, id: ProducerId, outcome: ProducerOutcome) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == id) {
            slot.1 = outcome;
        } else {
            self.entries.push((id, outcome));
        }
    }

    pub fn get(&self, id: ProducerId) -> Option<&ProducerOutcome> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    /// Result map of `id` when it ran successfully
    pub fn available(&self, id: ProducerId) -> Option<&ResultMap> {
        match self.get(id) {
            Some(ProducerOutcome::Available(map)) => Some(map),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProducerId, &ProducerOutcome)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn available_ids(&self) -> Vec<ProducerId> {
        self.iter()
            .filter(|(_, o)| o.is_available())
            .map(|(id, _)| id)
            .collect()
    }

    /// Failed producers with their reasons
    pub fn unavailable(&self) -> Vec<(ProducerId, &str)> {
        self.iter()
            .filter_map(|(id, o)| match o {
                ProducerOutcome::Unavailable { reason } => Some((id, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (id, outcome) in self.iter() {
            map.insert(id.as_str().to_string(), outcome.to_value());
        }
        Value::Object(map)
    }

    /// Compact serialization used inside prompts
    pub fn to_compact_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Indented serialization used by the deep data view
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for Findings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, outcome) in &self.entries {
            map.serialize_entry(id.as_str(), &outcome.to_value())?;
        }
        map.end()
    }
}

/// One-line rendering of a result value for narratives and roll-ups
pub fn describe_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(format!("{} items", items.len())),
        Value::Object(o) => match (o.get("mean"), o.get("top")) {
            (Some(mean), _) => Some(format!("mean {}", mean)),
            (None, Some(Value::Array(top))) if !top.is_empty() => {
                Some(format!("top {}", top[0]["value"].as_str().unwrap_or("?")))
            }
            _ => None,
        },
        Value::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_keeps_execution_order_and_placeholders() {
        let mut f = Findings::new();
        let mut m = ResultMap::new();
        m.insert("mean".into(), json!(0.42));
        f.insert(ProducerId::ValidateNorthStar, ProducerOutcome::Available(m));
        f.insert(ProducerId::ScanKpiHealth, ProducerOutcome::unavailable("timed out"));

        let s = f.to_compact_string();
        assert_eq!(
            s,
            r#"{"validate_north_star":{"mean":0.42},"scan_kpi_health":{"status":"unavailable","reason":"timed out"}}"#
        );
        assert_eq!(f.available_ids(), vec![ProducerId::ValidateNorthStar]);
        assert_eq!(f.unavailable(), vec![(ProducerId::ScanKpiHealth, "timed out")]);
    }
}
