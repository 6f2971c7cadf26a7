use ciborium::value::Value;

use super::cbor::{into_map, into_text, CborValue, CodecError};

/// Open-ended extension data attached to a reference.
///
/// Keeps insertion order and is encoded in that order, so whatever
///  produced the map decides how it hashes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extra(Vec<(String, Value)>);

impl Extra {
    pub fn new() -> Self {
        Extra(Vec::new())
    }

    /// Insert a value, replacing an existing key in place
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.0.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CborValue for Extra {
    fn to_cbor(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (Value::Text(k.clone()), v.clone()))
                .collect(),
        )
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let mut extra = Extra::new();
        for (key, value) in into_map(value, "extra")? {
            let key = into_text(key, "extra key")?;
            if extra.get(&key).is_some() {
                return Err(CodecError::DuplicateKey {
                    context: "extra",
                    key,
                });
            }
            extra.0.push((key, value));
        }
        Ok(extra)
    }
}
