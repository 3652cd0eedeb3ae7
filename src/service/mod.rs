//! Services: controllers exposing named actions, their registry and the
//! single-action dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    core::{RestError, RestResult, Value},
    reflect::{ActionDescriptor, RestObject},
};

pub mod dispatcher;
pub mod registry;

pub use crate::reflect::ControllerDecl;
pub use dispatcher::dispatch;
pub use registry::{ServiceHandle, ServiceRegistry};

/// A registrable group of actions.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// Declares the actions of the controller and the classes and enums they use.
    fn declare(decl: &mut ControllerDecl)
    where
        Self: Sized;

    /// Runs `action` with arguments already checked against its descriptor.
    async fn invoke(&self, action: &str, args: Arguments) -> RestResult<Value>;
}

/// Arguments collected for one action invocation, in declaration order.
///
/// Collection stops at the first absent argument that has a default, so
/// lookups past that point fall back to the declared default.
#[derive(Clone, Debug)]
pub struct Arguments {
    action: Arc<ActionDescriptor>,
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(action: Arc<ActionDescriptor>, values: Vec<Value>) -> Self {
        Self { action, values }
    }

    /// Number of arguments actually collected.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collected value of `name`, or its declared default when collection
    /// stopped before it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let index = self.action.params.iter().position(|p| p.name == name)?;
        match self.values.get(index) {
            Some(value) => Some(value),
            None => self.action.params[index].default.as_ref(),
        }
    }

    pub fn optional_int(&self, name: &str) -> RestResult<Option<i64>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| RestError::invalid_parameter(name, "int")),
        }
    }

    pub fn int(&self, name: &str) -> RestResult<i64> {
        self.optional_int(name)?
            .ok_or_else(|| RestError::missing_parameter(name))
    }

    pub fn string(&self, name: &str) -> RestResult<Option<String>> {
        Ok(self.get(name).and_then(Value::to_text))
    }

    /// Builds `T` from the argument; `None` when it is absent or null.
    pub fn object<T: RestObject>(&self, name: &str) -> RestResult<Option<T>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::from_value(value).map(Some),
        }
    }
}
