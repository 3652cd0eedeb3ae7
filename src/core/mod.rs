//! Core types shared by every layer of the gateway
//!
//! The error taxonomy, the closed value model and a few free helpers.

pub mod error;
pub mod utils;
pub mod value;

// Re-export commonly used types
pub use error::{ErrorCode, RegistrationError, RestError, RestResult};
pub use value::{Fields, TaggedObject, Value};
