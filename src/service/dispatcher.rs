//! Single-action dispatch: argument collection, coercion and invocation.

use std::sync::Arc;

use log::debug;

use crate::{
    core::{Fields, RestError, RestResult, Value},
    reflect::{ActionDescriptor, Kind, ParamDescriptor},
};

use super::{Arguments, ServiceHandle};

/// Invokes `action` on `service` with the raw parameter map `params`.
pub async fn dispatch(service: &ServiceHandle, action: &str, params: &Fields) -> RestResult<Value> {
    let descriptor = service
        .action(action)
        .ok_or_else(|| RestError::action_not_found(service.name(), action))?;
    let args = collect_arguments(descriptor, params)?;

    debug!("Executing [{}.{}]", service.name(), action);
    service.controller().invoke(action, args).await
}

/// Walks the declared arguments in order. An absent argument with a default
/// ends collection; an absent argument without one is an error.
pub(crate) fn collect_arguments(
    action: Arc<ActionDescriptor>,
    params: &Fields,
) -> RestResult<Arguments> {
    let mut values = Vec::with_capacity(action.params.len());
    for param in &action.params {
        match params.get(&param.name) {
            Some(raw) => values.push(convert(param, raw)?),
            None if param.default.is_some() => break,
            None => return Err(RestError::missing_parameter(&param.name)),
        }
    }
    Ok(Arguments::new(action, values))
}

fn convert(param: &ParamDescriptor, raw: &Value) -> RestResult<Value> {
    match param.kind {
        Kind::Class(class) => class.instantiate(raw),
        _ if raw.is_null() => Ok(Value::Null),
        Kind::Primitive(primitive) => primitive
            .coerce(raw)
            .ok_or_else(|| RestError::invalid_parameter(&param.name, primitive.as_str())),
        Kind::Enum(descriptor) => descriptor
            .coerce(raw)
            .map(Value::Int)
            .ok_or_else(|| RestError::invalid_parameter(&param.name, descriptor.name)),
    }
}
