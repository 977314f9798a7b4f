use super::values::Value;
use crate::error::{AdapterError, AdapterResult};

/// An ordered set of attribute values for create/update operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an earlier value for the same name in place.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// In-place form of [`Record::set`].
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The `id` field, when present and not null.
    pub fn id(&self) -> Option<&Value> {
        self.get("id").filter(|v| !v.is_null())
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A JSON object; keys keep their order.
    pub fn from_json(value: serde_json::Value) -> AdapterResult<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            }),
            other => Err(AdapterError::invalid_value(format!(
                "record must be an object, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let r = Record::new().set("a", 1).set("b", 2).set("a", 3);
        let fields: Vec<_> = r.iter().collect();
        assert_eq!(fields, vec![("a", &Value::Int(3)), ("b", &Value::Int(2))]);
    }

    #[test]
    fn test_null_id_is_absent() {
        assert!(Record::new().set("id", Value::Null).id().is_none());
        assert_eq!(Record::new().set("id", 7).id(), Some(&Value::Int(7)));
    }
}
