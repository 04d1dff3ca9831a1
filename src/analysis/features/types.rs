// Types module - Ordered feature vectors
//
// A feature vector is an insertion-ordered list of named scalars. Order is
// part of the contract: every vector from the same extractor has the same
// names in the same order, so rows line up into a table.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// One scalar feature value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Counts and sizes (`sample_rate`, `beat_count`, ...)
    Int(i64),
    /// Everything else
    Float(f64),
}

impl FeatureValue {
    /// Numeric value for model input
    pub fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Int(v) => v as f64,
            FeatureValue::Float(v) => v,
        }
    }

    /// Neutral value of the same kind
    pub fn zero_like(self) -> Self {
        match self {
            FeatureValue::Int(_) => FeatureValue::Int(0),
            FeatureValue::Float(_) => FeatureValue::Float(0.0),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<f32> for FeatureValue {
    fn from(v: f32) -> Self {
        FeatureValue::Float(v as f64)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<usize> for FeatureValue {
    fn from(v: usize) -> Self {
        FeatureValue::Int(v as i64)
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{}", v),
            FeatureValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Insertion-ordered mapping from feature name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a feature; a repeated name replaces the earlier value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Append every entry of `other`
    pub fn extend(&mut self, other: FeatureVector) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Values as `f64`, in name order
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| v.as_f64()).collect()
    }

    /// Same names and kinds, every value zeroed
    pub fn zeroed(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), v.zero_like()))
                .collect(),
        }
    }

    /// True if both vectors have the same names in the same order
    pub fn same_schema(&self, other: &FeatureVector) -> bool {
        self.names().eq(other.names())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let mut v = FeatureVector::new();
        v.insert("zeta", 1.0);
        v.insert("alpha", 2usize);
        v.insert("mid", 3.0f32);
        assert_eq!(v.names().collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(v.get("alpha"), Some(FeatureValue::Int(2)));
    }

    #[test]
    fn test_repeated_name_replaces() {
        let mut v = FeatureVector::new();
        v.insert("a", 1.0);
        v.insert("a", 5.0);
        assert_eq!(v.len(), 1);
        assert_eq!(v.get("a"), Some(FeatureValue::Float(5.0)));
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let mut v = FeatureVector::new();
        v.insert("tempo", 120.5);
        v.insert("beat_count", 8usize);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"tempo":120.5,"beat_count":8}"#);
    }

    #[test]
    fn test_zeroed_keeps_schema_and_kinds() {
        let mut v = FeatureVector::new();
        v.insert("x", 4.2);
        v.insert("n", 3usize);
        let z = v.zeroed();
        assert!(z.same_schema(&v));
        assert_eq!(z.get("x"), Some(FeatureValue::Float(0.0)));
        assert_eq!(z.get("n"), Some(FeatureValue::Int(0)));
    }
}
