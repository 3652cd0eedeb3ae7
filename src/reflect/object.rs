//! Serializable value types and their population from raw request data.

use log::trace;

use crate::core::{RestResult, Value};

use super::{decl::ClassDecl, registry::describe_properties};

/// A value type that can be built from request data and described in the schema.
pub trait RestObject: Default + Send + Sync + 'static {
    /// Name under which the type is published and tagged on the wire.
    const TYPE_NAME: &'static str;

    /// Declares the settable properties and the symbol table of the type.
    fn declare(decl: &mut ClassDecl<Self>);

    /// Wire form of the instance, a typed object.
    fn to_value(&self) -> Value;

    fn from_value(raw: &Value) -> RestResult<Self> {
        construct::<Self>(raw)
    }
}

/// Builds a `T` by invoking every declared setter in declaration order.
///
/// Present, non-null values are coerced to the property's kind first (nested
/// classes are constructed recursively); absent properties receive `Null`.
pub fn construct<T: RestObject>(raw: &Value) -> RestResult<T> {
    let properties = describe_properties::<T>()?;
    let data = raw.fields();
    let mut object = T::default();

    for property in properties.values() {
        let value = match data.and_then(|fields| fields.get(&property.name)) {
            Some(value) if !value.is_null() => property.kind.coerce(value)?,
            _ => Value::Null,
        };
        trace!("{}.{}({value})", T::TYPE_NAME, property.setter);
        (property.apply)(&mut object, value);
    }

    Ok(object)
}

pub(crate) fn instantiate<T: RestObject>(raw: &Value) -> RestResult<Value> {
    construct::<T>(raw).map(|object| object.to_value())
}
