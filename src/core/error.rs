//! Error taxonomy of the gateway
//!
//! Request-time failures are [`RestError`] values that end up in a response
//! slot. Declaration mistakes are [`RegistrationError`]s, which are fatal and
//! surface when a controller is registered.

use std::fmt;

use http::StatusCode;

use super::value::{Fields, TaggedObject, Value};

/// Wire error codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The path matches none of the recognized forms
    InvalidUrl,
    /// A batch entry has no `service` field
    ServiceNotDefined,
    /// A batch entry has no `action` field
    ActionNotDefined,
    /// No service registered under the requested name
    ServiceNotFound,
    /// The service does not expose the requested action
    ActionNotFound,
    /// A required, non-defaulted argument was not supplied
    MissingParameter,
    /// An argument was supplied but cannot be read as its declared kind
    InvalidParameter,
    /// A back-reference token could not be resolved
    InvalidMultirequestToken,
    /// Domain-level lookup miss
    ObjectNotFound,
    /// Building the schema document failed
    ReflectionFailed,
    /// Persistence fault
    InternalDbError,
    /// Anything else escaping the gateway
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::ServiceNotDefined => "SERVICE_NOT_DEFINED",
            ErrorCode::ActionNotDefined => "ACTION_NOT_DEFINED",
            ErrorCode::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorCode::ActionNotFound => "ACTION_NOT_FOUND",
            ErrorCode::MissingParameter => "MISSING_PARAMETER",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::InvalidMultirequestToken => "INVALID_MULTIREQUEST_TOKEN",
            ErrorCode::ObjectNotFound => "OBJECT_NOT_FOUND",
            ErrorCode::ReflectionFailed => "REFLECTION_FAILED",
            ErrorCode::InternalDbError => "INTERNAL_DB_ERROR",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ServiceNotFound | ErrorCode::ActionNotFound | ErrorCode::ObjectNotFound => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::ReflectionFailed
            | ErrorCode::InternalDbError
            | ErrorCode::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An Error-shaped response.
#[derive(Clone, Debug, PartialEq)]
pub struct RestError {
    pub code: ErrorCode,
    pub message: String,
    pub parameters: Fields,
}

impl RestError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            parameters: Fields::new(),
        }
    }

    /// Adds a named parameter describing the failure.
    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn invalid_url() -> Self {
        Self::new(ErrorCode::InvalidUrl, "Invalid URL")
    }

    pub fn service_not_defined(request: &str) -> Self {
        Self::new(
            ErrorCode::ServiceNotDefined,
            format!("Service not defined for request [{request}]"),
        )
        .with_param("request", request)
    }

    pub fn action_not_defined(request: &str) -> Self {
        Self::new(
            ErrorCode::ActionNotDefined,
            format!("Action not defined for request [{request}]"),
        )
        .with_param("request", request)
    }

    pub fn service_not_found(service: &str) -> Self {
        Self::new(
            ErrorCode::ServiceNotFound,
            format!("Service [{service}] not found"),
        )
        .with_param("service", service)
    }

    pub fn action_not_found(service: &str, action: &str) -> Self {
        Self::new(
            ErrorCode::ActionNotFound,
            format!("Action [{service}.{action}] not found"),
        )
        .with_param("service", service)
        .with_param("action", action)
    }

    pub fn missing_parameter(parameter: &str) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("Parameter [{parameter}] is required"),
        )
        .with_param("parameter", parameter)
    }

    pub fn invalid_parameter(parameter: &str, kind: &str) -> Self {
        Self::new(
            ErrorCode::InvalidParameter,
            format!("Parameter [{parameter}] must be of type [{kind}]"),
        )
        .with_param("parameter", parameter)
        .with_param("type", kind)
    }

    pub fn invalid_token(token: &str) -> Self {
        Self::new(
            ErrorCode::InvalidMultirequestToken,
            format!("Invalid multirequest token [{token}]"),
        )
        .with_param("token", token)
    }

    pub fn object_not_found(object_type: &str, id: impl Into<Value>) -> Self {
        let id = id.into();
        Self::new(
            ErrorCode::ObjectNotFound,
            format!("{object_type} id [{id}] not found"),
        )
        .with_param("type", object_type)
        .with_param("id", id)
    }

    pub fn reflection_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReflectionFailed, message)
    }

    pub fn storage() -> Self {
        Self::new(ErrorCode::InternalDbError, "Internal database error")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    /// Wire form: an untyped object keeping `code`, `message` and `parameters`
    /// as named fields.
    pub fn to_value(&self) -> Value {
        let mut object = TaggedObject::error_like()
            .with("code", self.code.as_str())
            .with("message", self.message.as_str());
        if !self.parameters.is_empty() {
            object = object.with("parameters", Value::Map(self.parameters.clone()));
        }
        Value::Object(object)
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RestError {}

impl From<RestError> for Value {
    fn from(err: RestError) -> Self {
        err.to_value()
    }
}

/// Result type alias for request-time operations
pub type RestResult<T> = std::result::Result<T, RestError>;

/// A declared kind that cannot be resolved against its owner's symbol table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationError {
    /// Controller or class declaring the member
    pub owner: String,
    /// Action argument, return slot or property name
    pub member: String,
    /// Offending kind name
    pub kind: String,
}

impl RegistrationError {
    pub fn new(owner: &str, member: &str, kind: &str) -> Self {
        Self {
            owner: owner.to_string(),
            member: member.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Type [{}] of [{}.{}] must be defined statically on [{}]",
            self.kind, self.owner, self.member, self.owner
        )
    }
}

impl std::error::Error for RegistrationError {}

impl From<RegistrationError> for RestError {
    fn from(err: RegistrationError) -> Self {
        RestError::reflection_failed(err.to_string())
    }
}
