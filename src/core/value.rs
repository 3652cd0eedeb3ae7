//! Closed value model shared by the dispatcher, the batch engine and the serializers.
//!
//! Every action result, every decoded request parameter and every error payload
//! is a [`Value`]. Serializers match over the variants explicitly, so the XML
//! "named field" convention is a property of [`Value::Object`] rather than of
//! whatever fields a map happens to carry.

use std::fmt;

use indexmap::IndexMap;
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Insertion-ordered field map.
pub type Fields = IndexMap<String, Value>;

/// Name of the field carrying the type tag of a typed object on the wire.
pub const OBJECT_TYPE_FIELD: &str = "objectType";

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    /// Generic structured data, serialized to XML as a key-tagged map.
    Map(Fields),
    /// Typed or error-shaped object, serialized to XML with one element per field.
    Object(TaggedObject),
}

/// An object that carries an explicit type tag or is shaped like an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaggedObject {
    pub object_type: Option<String>,
    pub error_like: bool,
    pub fields: Fields,
}

impl TaggedObject {
    /// Creates an empty object tagged with `object_type`.
    pub fn typed(object_type: impl Into<String>) -> Self {
        Self {
            object_type: Some(object_type.into()),
            error_like: false,
            fields: Fields::new(),
        }
    }

    /// Creates an empty untyped object that keeps its field names on the wire.
    pub fn error_like() -> Self {
        Self {
            object_type: None,
            error_like: true,
            fields: Fields::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Field lookup on maps and objects.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|fields| fields.get(name))
    }

    /// The field map of a `Map` or an `Object`.
    pub fn fields(&self) -> Option<&Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            Value::Object(object) => Some(&object.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Value::Map(fields) => Some(fields),
            Value::Object(object) => Some(&mut object.fields),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; numeric strings coming from a path are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// String view; scalars are rendered the way they appear on the wire.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Converts parsed JSON into a `Value`.
    ///
    /// Objects carrying `objectType`, `code` or `message` become
    /// [`TaggedObject`]s; every other object becomes a plain `Map`.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => {
                let mut object_type = None;
                let mut fields = Fields::with_capacity(map.len());
                for (key, value) in map {
                    if key == OBJECT_TYPE_FIELD {
                        if let JsonValue::String(tag) = value {
                            object_type = Some(tag);
                            continue;
                        }
                    }
                    fields.insert(key, Value::from_json(value));
                }
                let error_like = fields.contains_key("code") || fields.contains_key("message");
                if object_type.is_some() || error_like {
                    Value::Object(TaggedObject {
                        object_type,
                        error_like,
                        fields,
                    })
                } else {
                    Value::Map(fields)
                }
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => serializer.collect_seq(items),
            Value::Map(fields) => serializer.collect_map(fields),
            Value::Object(object) => object.serialize(serializer),
        }
    }
}

impl Serialize for TaggedObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.fields.len() + usize::from(self.object_type.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        if let Some(object_type) = &self.object_type {
            map.serialize_entry(OBJECT_TYPE_FIELD, object_type)?;
        }
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields)
    }
}

impl From<TaggedObject> for Value {
    fn from(object: TaggedObject) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_round_trip() {
        let original = json!({
            "name": "Ann",
            "age": 31,
            "ratio": 0.5,
            "tags": ["a", "b", null],
            "nested": {"flag": true, "list": [{"x": 1}]}
        });
        let value = Value::from_json(original.clone());
        let text = serde_json::to_string(&value).unwrap();
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_from_json_promotes_error_shaped_objects() {
        let value = Value::from_json(json!({"code": "X", "message": "boom"}));
        match value {
            Value::Object(object) => {
                assert!(object.error_like);
                assert!(object.object_type.is_none());
            }
            other => panic!("expected object, got {other:?}"),
        }

        let typed = Value::from_json(json!({"objectType": "User", "id": 1}));
        match typed {
            Value::Object(object) => {
                assert_eq!(object.object_type.as_deref(), Some("User"));
                assert_eq!(object.get("id"), Some(&Value::Int(1)));
                assert!(object.get(OBJECT_TYPE_FIELD).is_none());
            }
            other => panic!("expected object, got {other:?}"),
        }

        assert!(matches!(Value::from_json(json!({"a": 1})), Value::Map(_)));
    }

    #[test]
    fn test_typed_object_serializes_type_tag_first() {
        let value = Value::from(TaggedObject::typed("User").with("id", 7));
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"objectType":"User","id":7}"#
        );
    }

    #[test]
    fn test_lenient_accessors() {
        assert_eq!(Value::from("42").as_i64(), Some(42));
        assert_eq!(Value::from("4.5").as_f64(), Some(4.5));
        assert_eq!(Value::from("true").as_bool(), Some(true));
        assert_eq!(Value::from("nope").as_i64(), None);
        assert_eq!(Value::Int(3).to_text().as_deref(), Some("3"));
    }
}
