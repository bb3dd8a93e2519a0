//! Decoded records and their values.
//!
//! A [`Record`] is one decoded schema instance. Field order is insertion
//! order, which for decoded data is the binary layout order.

use std::fmt;

/// Marker written for a continuation flag whose tail data is present
pub const DATA_EXISTS: &str = "data_exists";

/// Marker written for a continuation flag whose tail data is absent
pub const DATA_ABSENT: &str = "data_absent";

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Text from a character array or string field
    Text(String),
    /// Enum symbol
    Symbol(String),
    /// Continuation flag state
    Continue(bool),
    /// Primitive array
    Array(Vec<Value>),
    /// Nested group record
    Record(Record),
    /// Homogeneous collection
    List(Vec<Record>),
    /// Heterogeneous collection keyed by subtype tag
    Subtypes(Vec<(String, Vec<Record>)>),
    /// Reference to another data file, without suffix
    Path(String),
}

impl Value {
    /// Returns the value as a signed integer, if it is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the textual content of text-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Symbol(s) | Value::Path(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this is a numeric zero
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Int(v) => *v == 0,
            Value::UInt(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) | Value::Symbol(s) | Value::Path(s) => f.write_str(s),
            Value::Continue(true) => f.write_str(DATA_EXISTS),
            Value::Continue(false) => f.write_str(DATA_ABSENT),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(r) => write!(f, "{}", r),
            Value::List(items) => write!(f, "<{} records>", items.len()),
            Value::Subtypes(groups) => {
                let total: usize = groups.iter().map(|(_, items)| items.len()).sum();
                write!(f, "<{} records in {} subtypes>", total, groups.len())
            }
        }
    }
}

/// One decoded schema instance: an ordered list of named values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field, replacing an existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Returns the value of a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns true if the field is present
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Moves every field of `other` into this record
    pub fn merge(&mut self, other: Record) {
        for (name, value) in other.fields {
            self.set(name, value);
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new().with("id", 1i64).with("name", "oak");
        record.set("id", 7i64);

        let names: Vec<_> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(record.get("id"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Continue(true).to_string(), "data_exists");
        assert_eq!(Value::Continue(false).to_string(), "data_absent");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(
            Value::Array(vec![Value::UInt(1), Value::UInt(2)]).to_string(),
            "[1, 2]"
        );
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::UInt(12).as_i64(), Some(12));
        assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Value::Text("3".into()).as_i64(), None);
    }
}
