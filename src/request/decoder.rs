//! Path decoding
//!
//! Recognized paths, in priority order:
//!
//! - `/` is the schema request
//! - `/service/multirequest/<k>/<v>/...` is a batch
//! - `/service/<service>/action/<action>/<k>/<v>/...` is a single action call
//!
//! Anything else is `INVALID_URL`. Keys containing `:` address nested maps,
//! which is how batch entries (`1:service`) and object arguments
//! (`user:firstName`) are written in a path.

use log::debug;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::{
    core::{Fields, RestError, RestResult, Value},
    service::ServiceRegistry,
};

use super::{BatchRequest, Request, Route, SingleRequest};

static MULTIREQUEST_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^/service/multirequest(?:/(.*))?$").expect("valid multirequest pattern")
});

static ACTION_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^/service/([^/]+)/action/([^/]+)(?:/(.*))?$").expect("valid action pattern")
});

const KEY_SEPARATOR: char = ':';

/// Most segments a nested path key may have.
pub const MAX_KEY_DEPTH: usize = 32;

/// Turns request paths into routes against a set of registered services.
pub struct PathDecoder<'a> {
    services: &'a ServiceRegistry,
}

impl<'a> PathDecoder<'a> {
    pub fn new(services: &'a ServiceRegistry) -> Self {
        Self { services }
    }

    /// Whether `path` asks for the schema document.
    pub fn is_schema(path: &str) -> bool {
        matches!(strip_query(path), "" | "/")
    }

    /// Decodes `path`; `body` holds parameters submitted as structured data
    /// and is the base map the path pairs are merged into.
    pub fn decode(&self, path: &str, body: Option<Fields>) -> RestResult<Route> {
        if Self::is_schema(path) {
            return Ok(Route::Schema);
        }
        let path = strip_query(path);

        let mut params = body.unwrap_or_default();

        if let Some(captures) = MULTIREQUEST_PATH.captures(path) {
            let segments = captures.get(1).map_or("", |m| m.as_str());
            path_to_params(segments, &mut params)?;
            return self.decode_batch(params).map(|batch| Route::Request(Request::Batch(batch)));
        }

        let captures = ACTION_PATH
            .captures(path)
            .ok_or_else(RestError::invalid_url)?;
        let service = decode_segment(&captures[1]);
        let action = decode_segment(&captures[2]);
        let segments = captures.get(3).map_or("", |m| m.as_str());
        path_to_params(segments, &mut params)?;

        let single = self.resolve(&service, &action, params)?;
        Ok(Route::Request(Request::Single(single)))
    }

    fn resolve(&self, service: &str, action: &str, params: Fields) -> RestResult<SingleRequest> {
        let handle = self
            .services
            .get(service)
            .ok_or_else(|| RestError::service_not_found(service))?;
        if handle.action(action).is_none() {
            return Err(RestError::action_not_found(service, action));
        }
        Ok(SingleRequest {
            service: handle.clone(),
            action: action.to_string(),
            params,
        })
    }

    fn decode_batch(&self, params: Fields) -> RestResult<BatchRequest> {
        let mut indexed: Vec<(i64, String, Fields)> = params
            .into_iter()
            .filter_map(|(key, value)| {
                let index = key.parse::<i64>().ok()?;
                let fields = match value {
                    Value::Map(fields) => fields,
                    Value::Object(object) => object.fields,
                    _ => return None,
                };
                Some((index, key, fields))
            })
            .collect();
        indexed.sort_by_key(|(index, _, _)| *index);

        let mut entries = Vec::with_capacity(indexed.len());
        for (_, key, fields) in indexed {
            let service = required_text(&fields, "service")
                .ok_or_else(|| RestError::service_not_defined(&key))?;
            let action = required_text(&fields, "action")
                .ok_or_else(|| RestError::action_not_defined(&key))?;
            debug!("Decoded multi-request entry [{key}]: {service}.{action}");
            entries.push(self.resolve(&service, &action, fields)?);
        }

        Ok(BatchRequest { entries })
    }
}

fn required_text(fields: &Fields, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::to_text)
        .filter(|text| !text.is_empty())
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or_default()
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Consumes `segments` pairwise as `(key, value)` into `params`. A trailing
/// unpaired segment is ignored; a key nested deeper than [`MAX_KEY_DEPTH`]
/// is `INVALID_URL`.
pub fn path_to_params(segments: &str, params: &mut Fields) -> RestResult<()> {
    let mut parts = segments.split('/');
    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        if key.is_empty() {
            continue;
        }
        let key = decode_segment(key);
        let keys: Vec<&str> = key.splitn(MAX_KEY_DEPTH + 1, KEY_SEPARATOR).collect();
        if keys.len() > MAX_KEY_DEPTH {
            debug!("Rejected path key nested deeper than {MAX_KEY_DEPTH} levels");
            return Err(RestError::invalid_url());
        }
        insert_path(params, &keys, Value::String(decode_segment(value)));
    }
    Ok(())
}

fn insert_path(target: &mut Fields, keys: &[&str], value: Value) {
    let Some((last, parents)) = keys.split_last() else {
        return;
    };

    let mut fields = target;
    for key in parents {
        let slot = fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Map(Fields::new()));
        if slot.fields().is_none() {
            *slot = Value::Map(Fields::new());
        }
        let Some(nested) = slot.fields_mut() else {
            return;
        };
        fields = nested;
    }

    // a scalar from the path never replaces structured body data
    if fields.get(*last).and_then(Value::fields).is_none() {
        fields.insert(last.to_string(), value);
    }
}
