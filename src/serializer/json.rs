use log::error;
use serde::Serialize;

use crate::core::Value;

use super::{ResponseSerializer, APPLICATION_JSON};

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a Value>,
}

/// Data-JSON serializer: `{"result": ..., "error": ...}`.
#[derive(Default)]
pub struct JsonSerializer {
    result: Option<Value>,
    error: Option<Value>,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseSerializer for JsonSerializer {
    fn configure(&mut self, result: Option<Value>, error: Option<Value>) {
        self.result = result;
        self.error = error;
    }

    fn content_type(&self) -> &'static str {
        APPLICATION_JSON
    }

    fn serialize(&self) -> Vec<u8> {
        let envelope = Envelope {
            result: self.result.as_ref(),
            error: self.error.as_ref(),
        };
        serde_json::to_vec(&envelope).unwrap_or_else(|e| {
            error!("Failed to serialize JSON response: {e}");
            b"{}".to_vec()
        })
    }
}
