//! Frequency encoding: each value maps to its normalized occurrence rate in the reference data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical lookup key of a cell. Numerically equal numbers share a key (`1` and `1.0`).
pub fn category_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Learned per-column value frequencies.
///
/// Values never seen during fitting encode as `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyEncoder {
    frequencies: HashMap<String, HashMap<String, f64>>,
}

impl FrequencyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the frequencies of `keys` for `column`, replacing any earlier mapping.
    pub fn fit_column<I>(&mut self, column: &str, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;
        for key in keys {
            *counts.entry(key).or_insert(0) += 1;
            total += 1;
        }
        let mapping = counts
            .into_iter()
            .map(|(key, count)| (key, count as f64 / total as f64))
            .collect();
        self.frequencies.insert(column.to_string(), mapping);
    }

    pub fn encode(&self, column: &str, key: &str) -> f64 {
        self.frequencies
            .get(column)
            .and_then(|mapping| mapping.get(key))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_fitted(&self, column: &str) -> bool {
        self.frequencies.contains_key(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_key_unifies_numbers() {
        assert_eq!(category_key(&json!(1)), category_key(&json!(1.0)));
        assert_eq!(category_key(&json!(-0.0)), "0");
        assert_eq!(category_key(&json!("a")), "a");
        assert_eq!(category_key(&json!(true)), "true");
    }

    #[test]
    fn test_frequencies_are_normalized() {
        let mut encoder = FrequencyEncoder::new();
        encoder.fit_column("c", ["a", "b", "a", "a"].map(String::from));
        assert_eq!(encoder.encode("c", "a"), 0.75);
        assert_eq!(encoder.encode("c", "b"), 0.25);
        assert!(encoder.is_fitted("c"));
    }

    #[test]
    fn test_unseen_values_encode_as_zero() {
        let mut encoder = FrequencyEncoder::new();
        encoder.fit_column("c", ["a".to_string()]);
        assert_eq!(encoder.encode("c", "z"), 0.0);
        assert_eq!(encoder.encode("other", "a"), 0.0);
    }
}
