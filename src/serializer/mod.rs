//! Response serializers: data-JSON, data-XML and schema-XML.

use crate::core::Value;

pub mod json;
pub mod schema;
pub mod xml;

pub use json::JsonSerializer;
pub use schema::SchemaXmlSerializer;
pub use xml::{XmlElement, XmlNode, XmlSerializer};

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";

/// Turns a result and/or an error into wire bytes.
pub trait ResponseSerializer: Send {
    /// Sets the values to write; `None` leaves the corresponding slot out.
    fn configure(&mut self, result: Option<Value>, error: Option<Value>);

    fn content_type(&self) -> &'static str;

    fn serialize(&self) -> Vec<u8>;
}

/// Picks the data serializer requested by an `Accept` header. XML only when
/// explicitly asked for, JSON otherwise.
pub fn for_accept(accept: Option<&str>) -> Box<dyn ResponseSerializer> {
    let wants_xml = accept
        .map(|value| value.trim_start().to_ascii_lowercase())
        .is_some_and(|value| value.starts_with(APPLICATION_XML));
    if wants_xml {
        Box::new(XmlSerializer::new())
    } else {
        Box::new(JsonSerializer::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_accept() {
        assert_eq!(for_accept(None).content_type(), APPLICATION_JSON);
        assert_eq!(for_accept(Some("*/*")).content_type(), APPLICATION_JSON);
        assert_eq!(
            for_accept(Some("text/html, application/xml")).content_type(),
            APPLICATION_JSON
        );
        assert_eq!(
            for_accept(Some("Application/XML;q=0.9")).content_type(),
            APPLICATION_XML
        );
    }
}
