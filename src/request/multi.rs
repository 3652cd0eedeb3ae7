//! Multi-request engine
//!
//! Entries run strictly one after another. Before an entry is dispatched its
//! parameters are rewritten: every string of the form `{results:N:path}` is
//! replaced with the value found by walking the result of the Nth completed
//! entry along `path`. A failed entry occupies its own slot and never stops
//! the batch.

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    core::{value::OBJECT_TYPE_FIELD, Fields, RestError, RestResult, TaggedObject, Value},
    service::dispatch,
};

use super::SingleRequest;

static RESULT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{results:(\d+):(.+)\}$").expect("valid token pattern"));

const PATH_SEPARATOR: char = ':';

/// Type tag of one entry's outcome on the wire.
pub const RESPONSE_TYPE: &str = "RestResponse";

/// Outcome of one batch entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Result(Value),
    Error(RestError),
}

impl Response {
    pub fn result(&self) -> Option<&Value> {
        match self {
            Response::Result(value) => Some(value),
            Response::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    pub fn into_value(self) -> Value {
        let response = TaggedObject::typed(RESPONSE_TYPE);
        let response = match self {
            Response::Result(value) => response.with("result", value),
            Response::Error(err) => response.with("error", err),
        };
        Value::Object(response)
    }
}

impl From<RestResult<Value>> for Response {
    fn from(outcome: RestResult<Value>) -> Self {
        match outcome {
            Ok(value) => Response::Result(value),
            Err(err) => Response::Error(err),
        }
    }
}

/// Rewrites back-reference tokens against the responses produced so far.
pub struct TokenResolver<'a> {
    responses: &'a [Response],
}

impl<'a> TokenResolver<'a> {
    pub fn new(responses: &'a [Response]) -> Self {
        Self { responses }
    }

    /// Resolves every token in `params`, descending into lists and maps.
    pub fn resolve_fields(&self, params: Fields) -> RestResult<Fields> {
        params
            .into_iter()
            .map(|(key, value)| Ok((key, self.resolve(value)?)))
            .collect()
    }

    pub fn resolve(&self, value: Value) -> RestResult<Value> {
        match value {
            Value::String(text) => match RESULT_TOKEN.captures(&text) {
                Some(captures) => self.lookup(&text, &captures[1], &captures[2]),
                None => Ok(Value::String(text)),
            },
            Value::List(items) => items
                .into_iter()
                .map(|item| self.resolve(item))
                .collect::<RestResult<Vec<_>>>()
                .map(Value::List),
            Value::Map(fields) => self.resolve_fields(fields).map(Value::Map),
            Value::Object(mut object) => {
                object.fields = self.resolve_fields(object.fields)?;
                Ok(Value::Object(object))
            }
            scalar => Ok(scalar),
        }
    }

    fn lookup(&self, token: &str, index: &str, path: &str) -> RestResult<Value> {
        let invalid = || RestError::invalid_token(token);

        // 1-based over completed entries
        let position = index
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(invalid)?;
        let result = self
            .responses
            .get(position)
            .and_then(Response::result)
            .ok_or_else(invalid)?;

        let resolved = walk(result, path.split(PATH_SEPARATOR)).ok_or_else(invalid)?;
        debug!("Resolved token [{token}] to [{resolved}]");
        Ok(resolved)
    }
}

fn walk<'s>(value: &Value, mut segments: impl Iterator<Item = &'s str>) -> Option<Value> {
    let Some(segment) = segments.next() else {
        return Some(value.clone());
    };
    match value {
        Value::List(items) => {
            let index = segment.parse::<usize>().ok()?;
            walk(items.get(index)?, segments)
        }
        Value::Object(object) if segment == OBJECT_TYPE_FIELD && object.object_type.is_some() => {
            let tag = Value::from(object.object_type.clone());
            walk(&tag, segments)
        }
        Value::Map(fields) => walk(fields.get(segment)?, segments),
        Value::Object(object) => walk(object.fields.get(segment)?, segments),
        _ => None,
    }
}

/// Executes `entries` in order and returns one response per entry.
pub async fn execute_batch(entries: Vec<SingleRequest>) -> Vec<Response> {
    info!("Executing multi-request of {} entries", entries.len());
    let mut responses: Vec<Response> = Vec::with_capacity(entries.len());

    for (position, entry) in entries.into_iter().enumerate() {
        let resolved = TokenResolver::new(&responses).resolve_fields(entry.params);
        let outcome = match resolved {
            Ok(params) => dispatch(&entry.service, &entry.action, &params).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &outcome {
            warn!(
                "Multi-request entry {} [{}.{}] failed: {err}",
                position + 1,
                entry.service.name(),
                entry.action
            );
        }
        responses.push(outcome.into());
    }

    responses
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        core::ErrorCode,
        reflect::ControllerDecl,
        service::{Arguments, Controller, ServiceHandle, ServiceRegistry},
    };

    struct People;

    #[async_trait]
    impl Controller for People {
        fn declare(decl: &mut ControllerDecl) {
            decl.action("first").returns("string");
            decl.action("greet").param("name", "string").returns("string");
            decl.action("fail");
        }

        async fn invoke(&self, action: &str, args: Arguments) -> RestResult<Value> {
            match action {
                "first" => Ok(Value::from_json(
                    json!({"firstName": "Ann", "tags": ["x", "y"]}),
                )),
                "greet" => Ok(Value::from(format!(
                    "hello {}",
                    args.string("name")?.unwrap_or_default()
                ))),
                _ => Err(RestError::object_not_found("Person", 0)),
            }
        }
    }

    fn people() -> ServiceHandle {
        let mut registry = ServiceRegistry::new();
        registry.register("people", People).unwrap().clone()
    }

    fn entry(service: &ServiceHandle, action: &str, params: serde_json::Value) -> SingleRequest {
        SingleRequest {
            service: service.clone(),
            action: action.to_string(),
            params: Value::from_json(params).fields().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_walk_paths() {
        let responses = [Response::Result(Value::from_json(json!({
            "objectType": "UsersList",
            "objects": [{"objectType": "User", "id": 4}],
            "totalCount": 1
        })))];
        let resolver = TokenResolver::new(&responses);
        assert_eq!(
            resolver.resolve(Value::from("{results:1:objects:0:id}")).unwrap(),
            Value::Int(4)
        );
        assert_eq!(
            resolver.resolve(Value::from("{results:1:objectType}")).unwrap(),
            Value::from("UsersList")
        );
        assert_eq!(
            resolver.resolve(Value::from("prefix {results:1:totalCount}")).unwrap(),
            Value::from("prefix {results:1:totalCount}")
        );

        for token in [
            "{results:0:totalCount}",
            "{results:2:totalCount}",
            "{results:1:missing}",
            "{results:1:totalCount:deeper}",
            "{results:1:objects:9:id}",
        ] {
            let err = resolver.resolve(Value::from(token)).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidMultirequestToken, "{token}");
            assert_eq!(err.parameters.get("token"), Some(&Value::from(token)));
        }
    }

    #[test]
    fn test_nested_tokens_are_resolved() {
        let responses = [Response::Result(Value::from_json(json!({"id": 9})))];
        let resolver = TokenResolver::new(&responses);
        let resolved = resolver
            .resolve(Value::from_json(json!({"user": {"ids": ["{results:1:id}", 3]}})))
            .unwrap();
        assert_eq!(resolved, Value::from_json(json!({"user": {"ids": [9, 3]}})));
    }

    #[tokio::test]
    async fn test_batch_substitutes_prior_results() {
        let people = people();
        let responses = execute_batch(vec![
            entry(&people, "first", json!({})),
            entry(&people, "greet", json!({"name": "{results:1:firstName}"})),
        ])
        .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1], Response::Result(Value::from("hello Ann")));
    }

    #[tokio::test]
    async fn test_failed_entry_is_isolated() {
        let people = people();
        let responses = execute_batch(vec![
            entry(&people, "fail", json!({})),
            entry(&people, "greet", json!({"name": "{results:1:firstName}"})),
            entry(&people, "greet", json!({"name": "Bo"})),
        ])
        .await;
        assert_eq!(responses.len(), 3);
        assert!(responses[0].is_error());
        match &responses[1] {
            Response::Error(err) => assert_eq!(err.code, ErrorCode::InvalidMultirequestToken),
            other => panic!("expected token error, got {other:?}"),
        }
        assert_eq!(responses[2], Response::Result(Value::from("hello Bo")));
    }

    #[test]
    fn test_response_wire_form() {
        let value = Response::Result(Value::Int(1)).into_value();
        assert_eq!(value.to_json(), json!({"objectType": "RestResponse", "result": 1}));

        let value = Response::Error(RestError::invalid_url()).into_value();
        assert_eq!(
            value.to_json(),
            json!({"objectType": "RestResponse", "error": {"code": "INVALID_URL", "message": "Invalid URL"}})
        );
    }
}
