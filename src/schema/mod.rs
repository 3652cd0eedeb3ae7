//! Schema builder
//!
//! Walks the registry of every registered service and produces the discovery
//! document:
//!
//! ```text
//! <xml>
//!   <enums><enum name type="int"><const name value/>...</enum>...</enums>
//!   <classes><class name><property name type .../>...</class>...</classes>
//!   <services><service id name><action ...><param .../><result .../></action></service></services>
//! </xml>
//! ```
//!
//! Enums and classes are emitted once per name; a class is emitted after the
//! classes it references, and cyclic class graphs terminate.

use std::collections::HashSet;

use log::debug;

use crate::{
    core::RestResult,
    reflect::{ActionDescriptor, ClassRef, EnumDescriptor, Kind},
    serializer::XmlElement,
    service::{ServiceHandle, ServiceRegistry},
};

#[derive(Default)]
pub struct SchemaBuilder {
    enums: Vec<XmlElement>,
    enum_names: HashSet<&'static str>,
    classes: Vec<XmlElement>,
    class_names: HashSet<&'static str>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the schema document for `services`.
    pub fn build(mut self, services: &ServiceRegistry) -> RestResult<XmlElement> {
        let mut service_elements = XmlElement::new("services");
        for service in services.iter() {
            service_elements.push(self.service(service)?);
        }
        debug!(
            "Schema built: {} enum(s), {} class(es), {} service(s)",
            self.enums.len(),
            self.classes.len(),
            services.len()
        );

        Ok(XmlElement::new("xml")
            .child(XmlElement::new("enums").extend(self.enums.into_iter().map(Into::into)))
            .child(XmlElement::new("classes").extend(self.classes.into_iter().map(Into::into)))
            .child(service_elements))
    }

    fn service(&mut self, service: &ServiceHandle) -> RestResult<XmlElement> {
        let mut element = XmlElement::new("service")
            .attr("id", service.name())
            .attr("name", service.name());
        for action in service.actions().values() {
            element.push(self.action(action)?);
        }
        Ok(element)
    }

    fn action(&mut self, action: &ActionDescriptor) -> RestResult<XmlElement> {
        let description = Some(action.description.as_str()).filter(|d| !d.is_empty());
        let mut element = XmlElement::new("action")
            .attr("name", &action.name)
            .attr("enableInMultiRequest", action.multi_request)
            .attr_opt("description", description);

        for param in &action.params {
            let param_element = XmlElement::new("param")
                .attr("name", &param.name)
                .attr("type", param.kind.type_name())
                .attr_opt("description", param.description.as_deref());
            element.push(self.kind(param_element, param.kind)?);
        }

        if let Some(returns) = &action.returns {
            let result = XmlElement::new("result").attr("type", returns.kind.type_name());
            element.push(self.kind(result, returns.kind)?);
        }
        Ok(element)
    }

    /// Expands a member's kind, tagging `element` with its enum name if any.
    fn kind(&mut self, element: XmlElement, kind: Kind) -> RestResult<XmlElement> {
        match kind {
            Kind::Enum(descriptor) => {
                self.add_enum(descriptor);
                Ok(element.attr("enumType", descriptor.name))
            }
            Kind::Class(class) => {
                self.add_class(class)?;
                Ok(element)
            }
            Kind::Primitive(_) => Ok(element),
        }
    }

    fn add_enum(&mut self, descriptor: &'static EnumDescriptor) {
        if !self.enum_names.insert(descriptor.name) {
            return;
        }
        let mut element = XmlElement::new("enum")
            .attr("name", descriptor.name)
            .attr("type", "int");
        for (name, value) in descriptor.constants {
            element.push(XmlElement::new("const").attr("name", name).attr("value", value));
        }
        self.enums.push(element);
    }

    fn add_class(&mut self, class: ClassRef) -> RestResult<()> {
        if !self.class_names.insert(class.name()) {
            return Ok(());
        }
        let mut element = XmlElement::new("class").attr("name", class.name());
        for property in class.properties()?.values() {
            let property_element = XmlElement::new("property")
                .attr("name", &property.name)
                .attr("type", property.kind.type_name())
                .attr_opt("description", property.description.as_deref());
            element.push(self.kind(property_element, property.kind)?);
        }
        self.classes.push(element);
        Ok(())
    }
}
