use crate::core::Value;

use super::{
    xml::{self, XmlElement},
    ResponseSerializer, APPLICATION_XML,
};

/// Schema-XML serializer
///
/// Writes the schema document as a raw element tree. A configured error, or
/// a result carrying a type tag, goes through the data-XML conventions instead.
#[derive(Default)]
pub struct SchemaXmlSerializer {
    document: Option<XmlElement>,
    result: Option<Value>,
    error: Option<Value>,
}

impl SchemaXmlSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_document(&mut self, document: XmlElement) {
        self.document = Some(document);
    }

    fn has_typed_result(&self) -> bool {
        matches!(&self.result, Some(Value::Object(object)) if object.object_type.is_some())
    }
}

impl ResponseSerializer for SchemaXmlSerializer {
    fn configure(&mut self, result: Option<Value>, error: Option<Value>) {
        self.result = result;
        self.error = error;
    }

    fn content_type(&self) -> &'static str {
        APPLICATION_XML
    }

    fn serialize(&self) -> Vec<u8> {
        let text = match &self.document {
            Some(document) if self.error.is_none() && !self.has_typed_result() => {
                document.to_xml_string()
            }
            _ => xml::document(self.result.as_ref(), self.error.as_ref()).to_xml_string(),
        };
        text.into_bytes()
    }
}
