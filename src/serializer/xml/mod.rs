//! Data-XML serializer
//!
//! Value conversion rules:
//!
//! - null fields and items are omitted
//! - a list is an `<objectType>array</objectType>` marker followed by one
//!   `<item>` per entry
//! - a plain map is an `<objectType>map</objectType>` marker followed by one
//!   `<item key="...">` per field
//! - a tagged object is its type tag followed by one element per field, named
//!   after the field
//! - scalars are written as text

use crate::core::{value::OBJECT_TYPE_FIELD, Value};

use super::{ResponseSerializer, APPLICATION_XML};

pub mod writer;

pub use writer::{XmlElement, XmlNode};

const ROOT: &str = "xml";
const ITEM: &str = "item";

#[derive(Default)]
pub struct XmlSerializer {
    result: Option<Value>,
    error: Option<Value>,
}

impl XmlSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self) -> XmlElement {
        document(self.result.as_ref(), self.error.as_ref())
    }
}

impl ResponseSerializer for XmlSerializer {
    fn configure(&mut self, result: Option<Value>, error: Option<Value>) {
        self.result = result;
        self.error = error;
    }

    fn content_type(&self) -> &'static str {
        APPLICATION_XML
    }

    fn serialize(&self) -> Vec<u8> {
        self.document().to_xml_string().into_bytes()
    }
}

/// The `<xml>` document holding optional `result` and `error` elements.
pub fn document(result: Option<&Value>, error: Option<&Value>) -> XmlElement {
    let mut root = XmlElement::new(ROOT);
    for (name, value) in [("result", result), ("error", error)] {
        if let Some(value) = value.filter(|v| !v.is_null()) {
            root.push(XmlElement::new(name).extend(to_nodes(value)));
        }
    }
    root
}

/// Content of the element holding `value`.
pub fn to_nodes(value: &Value) -> Vec<XmlNode> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => {
            let mut nodes = vec![marker("array")];
            nodes.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| XmlNode::Element(XmlElement::new(ITEM).extend(to_nodes(item)))),
            );
            nodes
        }
        Value::Map(fields) => {
            let mut nodes = vec![marker("map")];
            nodes.extend(fields.iter().filter(|(_, v)| !v.is_null()).map(|(key, v)| {
                XmlNode::Element(XmlElement::new(ITEM).attr("key", key).extend(to_nodes(v)))
            }));
            nodes
        }
        Value::Object(object) => {
            let mut nodes = Vec::with_capacity(object.fields.len() + 1);
            if let Some(tag) = &object.object_type {
                nodes.push(XmlNode::Element(
                    XmlElement::new(OBJECT_TYPE_FIELD).text(tag.as_str()),
                ));
            }
            nodes.extend(object.fields.iter().filter(|(_, v)| !v.is_null()).map(
                |(name, v)| XmlNode::Element(XmlElement::new(name.as_str()).extend(to_nodes(v))),
            ));
            nodes
        }
        scalar => scalar.to_text().map(XmlNode::Text).into_iter().collect(),
    }
}

fn marker(kind: &str) -> XmlNode {
    XmlNode::Element(XmlElement::new(OBJECT_TYPE_FIELD).text(kind))
}
