//! Static descriptions of actions, parameters and properties.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;

use crate::core::{RegistrationError, RestResult, Value};

use super::{
    object::{instantiate, RestObject},
    registry::describe_properties,
};

/// The five kinds that are never looked up in a symbol table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Int,
    Long,
    Float,
    Boolean,
    String,
}

impl Primitive {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "int" => Some(Primitive::Int),
            "long" => Some(Primitive::Long),
            "float" => Some(Primitive::Float),
            "boolean" => Some(Primitive::Boolean),
            "string" => Some(Primitive::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
        }
    }

    /// Converts a raw value to this kind, `None` when it does not fit.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match self {
            Primitive::Int | Primitive::Long => value.as_i64().map(Value::Int),
            Primitive::Float => value.as_f64().map(Value::Float),
            Primitive::Boolean => value.as_bool().map(Value::Bool),
            Primitive::String => value.to_text().map(Value::String),
        }
    }
}

/// A named set of integer constants. Collapses to `int` on the wire.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub name: &'static str,
    pub constants: &'static [(&'static str, i64)],
}

impl EnumDescriptor {
    /// Accepts either the integer value or the constant name.
    pub fn coerce(&self, value: &Value) -> Option<i64> {
        if let Some(i) = value.as_i64() {
            return Some(i);
        }
        let name = value.as_str()?;
        self.constants
            .iter()
            .find(|(constant, _)| *constant == name)
            .map(|(_, v)| *v)
    }
}

/// Handle on a constructible value type.
#[derive(Clone, Copy)]
pub struct ClassRef {
    name: &'static str,
    describe: fn() -> Result<Arc<PropertyTable>, RegistrationError>,
    instantiate: fn(&Value) -> RestResult<Value>,
}

impl ClassRef {
    pub fn of<T: RestObject>() -> Self {
        Self {
            name: T::TYPE_NAME,
            describe: describe_properties::<T>,
            instantiate: instantiate::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The class's memoized property table.
    pub fn properties(&self) -> Result<Arc<PropertyTable>, RegistrationError> {
        (self.describe)()
    }

    /// Builds an instance of the class from raw data and returns it as a typed object.
    pub fn instantiate(&self, raw: &Value) -> RestResult<Value> {
        (self.instantiate)(raw)
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassRef").field(&self.name).finish()
    }
}

/// Entry of a static symbol table.
#[derive(Clone, Copy, Debug)]
pub enum Symbol {
    Class(ClassRef),
    Enum(&'static EnumDescriptor),
}

pub type SymbolTable = HashMap<String, Symbol>;

/// Declared value category of a parameter, property or return slot.
#[derive(Clone, Copy, Debug)]
pub enum Kind {
    Primitive(Primitive),
    Class(ClassRef),
    Enum(&'static EnumDescriptor),
}

impl Kind {
    /// Resolves a declared kind name against the owner's symbol table.
    pub fn resolve(
        owner: &str,
        member: &str,
        kind: &str,
        symbols: &SymbolTable,
    ) -> Result<Self, RegistrationError> {
        if let Some(primitive) = Primitive::parse(kind) {
            return Ok(Kind::Primitive(primitive));
        }
        match symbols.get(kind) {
            Some(Symbol::Class(class)) => Ok(Kind::Class(*class)),
            Some(Symbol::Enum(descriptor)) => Ok(Kind::Enum(*descriptor)),
            None => Err(RegistrationError::new(owner, member, kind)),
        }
    }

    /// Kind name as published: enums report `int`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Kind::Primitive(primitive) => primitive.as_str(),
            Kind::Class(class) => class.name(),
            Kind::Enum(_) => Primitive::Int.as_str(),
        }
    }

    pub fn enum_type(&self) -> Option<&'static EnumDescriptor> {
        match self {
            Kind::Enum(descriptor) => Some(*descriptor),
            _ => None,
        }
    }

    pub fn class(&self) -> Option<ClassRef> {
        match self {
            Kind::Class(class) => Some(*class),
            _ => None,
        }
    }

    /// Converts a non-null raw value into this kind while populating an object.
    pub fn coerce(&self, value: &Value) -> RestResult<Value> {
        match self {
            Kind::Primitive(primitive) => Ok(primitive.coerce(value).unwrap_or(Value::Null)),
            Kind::Enum(descriptor) => Ok(descriptor.coerce(value).map_or(Value::Null, Value::Int)),
            Kind::Class(class) => class.instantiate(value),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParamDescriptor {
    pub name: String,
    pub kind: Kind,
    pub default: Option<Value>,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ReturnDescriptor {
    pub kind: Kind,
}

#[derive(Clone, Debug)]
pub struct ActionDescriptor {
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    pub returns: Option<ReturnDescriptor>,
    pub description: String,
    pub multi_request: bool,
}

impl ActionDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Type-erased setter invoked while populating an object.
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) + Send + Sync>;

#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: Kind,
    pub description: Option<String>,
    /// Name of the setter, `set` followed by the capitalized property name.
    pub setter: String,
    pub(crate) apply: Setter,
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("setter", &self.setter)
            .finish()
    }
}

pub type ActionTable = IndexMap<String, Arc<ActionDescriptor>>;
pub type PropertyTable = IndexMap<String, PropertyDescriptor>;

#[cfg(test)]
mod tests {
    use super::*;

    static COLOR: EnumDescriptor = EnumDescriptor {
        name: "Color",
        constants: &[("RED", 0), ("BLUE", 1)],
    };

    #[test]
    fn test_primitive_kinds_are_never_looked_up() {
        let symbols = SymbolTable::new();
        for name in ["int", "long", "float", "boolean", "string"] {
            let kind = Kind::resolve("Owner", "member", name, &symbols).unwrap();
            assert_eq!(kind.type_name(), name);
        }
    }

    #[test]
    fn test_unresolvable_kind_is_a_registration_error() {
        let err = Kind::resolve("Owner", "member", "Missing", &SymbolTable::new()).unwrap_err();
        assert_eq!(err, RegistrationError::new("Owner", "member", "Missing"));
    }

    #[test]
    fn test_enum_collapses_to_int() {
        let mut symbols = SymbolTable::new();
        symbols.insert("Color".to_string(), Symbol::Enum(&COLOR));
        let kind = Kind::resolve("Owner", "member", "Color", &symbols).unwrap();
        assert_eq!(kind.type_name(), "int");
        assert_eq!(kind.enum_type().map(|e| e.name), Some("Color"));
        assert_eq!(kind.coerce(&Value::from("BLUE")).unwrap(), Value::Int(1));
        assert_eq!(kind.coerce(&Value::from("0")).unwrap(), Value::Int(0));
    }
}
