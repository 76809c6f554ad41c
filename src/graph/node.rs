//! Graph node and property value types.

use std::collections::BTreeMap;

/// A property value on a graph node.
///
/// Node schemas are open: venue-specific enhancement hooks may attach
/// properties the core converter knows nothing about, so properties are a
/// dynamic bag rather than per-type structs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Get the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the list content, if this is a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Get the mutable list content, if this is a list value.
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A node in the output document graph.
///
/// Created exactly once by a block assembler or the annotated-text extractor;
/// never mutated after creation except through the venue enhancement hooks,
/// which run before the node is committed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub props: BTreeMap<String, Value>,
}

impl Node {
    /// Create a node with an empty property bag.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: BTreeMap::new(),
        }
    }

    /// Set a property, returning self for chained construction.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }

    /// Set a property.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.props.insert(key.to_string(), value.into());
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Get a string property.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// The source-document id this node was built from, if any.
    pub fn source_id(&self) -> Option<&str> {
        self.get_str("source_id")
    }

    /// Append a value to a list property, creating the list if absent.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        match self.props.get_mut(key) {
            Some(Value::List(items)) => items.push(value.into()),
            _ => {
                self.props
                    .insert(key.to_string(), Value::List(vec![value.into()]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_bag() {
        let mut node = Node::new("paragraph_1", "paragraph").with("label", "1.");
        node.set("content", "Hello");

        assert_eq!(node.get_str("label"), Some("1."));
        assert_eq!(node.get_str("content"), Some("Hello"));
        assert_eq!(node.get("missing"), None);
    }

    #[test]
    fn test_push_creates_list() {
        let mut node = Node::new("list_1", "list");
        node.push("items", "paragraph_1");
        node.push("items", "paragraph_2");

        let items = node.get("items").and_then(Value::as_list).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_option_converts_to_null() {
        let node = Node::new("aff_1", "affiliation").with("country", None::<String>);
        assert!(node.get("country").unwrap().is_null());
    }
}
