//! In-memory document representation.
//!
//! A [`Document`] is an insertion-ordered mapping of field name to a
//! dynamically typed [`Value`]. Migrations reshape documents purely through
//! mapping operations: get, insert, remove, and rename.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::version::DocumentVersion;

/// One schema-less record as held in memory during migration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    /// Set a field. An existing field keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Remove a field, keeping the order of the remaining fields.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    /// Rename a field in place. Returns `false` when `from` is absent.
    ///
    /// An existing field named `to` is replaced.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if !self.0.contains_key(from) {
            return false;
        }
        if from == to {
            return true;
        }
        let fields = std::mem::take(&mut self.0);
        self.0 = fields
            .into_iter()
            .filter_map(|(key, value)| {
                if key == to {
                    None
                } else if key == from {
                    Some((to.to_string(), value))
                } else {
                    Some((key, value))
                }
            })
            .collect();
        true
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Read the version stored under `field`.
    ///
    /// Returns `Ok(None)` when the field is absent. A present field that is not
    /// a canonical version string is a format error, never a guess.
    pub fn version(&self, field: &str) -> Result<Option<DocumentVersion>> {
        match self.0.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => DocumentVersion::parse(s).map(Some),
            Some(other) => Err(Error::Format(format!(
                "version field '{}' holds a non-string value: {}",
                field, other
            ))),
        }
    }

    /// Stamp `version` under `field`.
    pub fn set_version(&mut self, field: &str, version: DocumentVersion) {
        self.0
            .insert(field.to_string(), Value::String(version.to_string()));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Decode a document from its JSON wire form.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode a document to its JSON wire form.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Serialization(format!(
                "expected a JSON object for a document, found {}",
                value_kind(&other)
            ))),
        }
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        document.into_value()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::try_from(json!({ "Version": "0.0.1", "Dors": 3, "Color": "red" })).unwrap()
    }

    #[test]
    fn test_rename_keeps_position() {
        let mut doc = sample();
        assert!(doc.rename("Dors", "Door"));

        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["Version", "Door", "Color"]);
        assert_eq!(doc.get("Door"), Some(&json!(3)));
    }

    #[test]
    fn test_rename_missing_field_is_noop() {
        let mut doc = sample();
        assert!(!doc.rename("Wheels", "Tyres"));
        assert_eq!(doc, sample());
    }

    #[test]
    fn test_rename_over_existing_field_replaces_it() {
        let mut doc = sample();
        assert!(doc.rename("Dors", "Color"));
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["Version", "Color"]);
        assert_eq!(doc.get("Color"), Some(&json!(3)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut doc = sample();
        assert_eq!(doc.remove("Version"), Some(json!("0.0.1")));
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["Dors", "Color"]);
    }

    #[test]
    fn test_version_absent_present_and_invalid() {
        let doc = sample();
        assert_eq!(doc.version("Version").unwrap(), Some(DocumentVersion::new(0, 0, 1)));
        assert_eq!(doc.version("version").unwrap(), None);

        let bad = Document::try_from(json!({ "Version": 2 })).unwrap();
        assert!(matches!(bad.version("Version"), Err(Error::Format(_))));

        let malformed = Document::try_from(json!({ "Version": "two" })).unwrap();
        assert!(matches!(malformed.version("Version"), Err(Error::Format(_))));
    }

    #[test]
    fn test_set_version_in_place_or_appended() {
        let mut doc = sample();
        doc.set_version("Version", DocumentVersion::new(0, 0, 2));
        assert_eq!(doc.keys().next().map(String::as_str), Some("Version"));
        assert_eq!(doc.get("Version"), Some(&json!("0.0.2")));

        let mut bare: Document = [("Dors", json!(3))].into_iter().collect();
        bare.set_version("Version", DocumentVersion::new(0, 0, 2));
        assert_eq!(bare.keys().last().map(String::as_str), Some("Version"));
    }

    #[test]
    fn test_try_from_non_object_fails() {
        assert!(matches!(
            Document::try_from(json!([1, 2, 3])),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_wire_form_preserves_order() {
        let doc = sample();
        let bytes = doc.to_vec().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            r#"{"Version":"0.0.1","Dors":3,"Color":"red"}"#
        );
        assert_eq!(Document::from_slice(&bytes).unwrap(), doc);
    }
}
