//! Request handling from raw path and body to serialized bytes.
//!
//! [`Gateway`] has no socket of its own; [`server::GatewayApp`] feeds it from
//! pingora and writes the [`GatewayResponse`] back.

use std::{panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use http::{Method, StatusCode};
use log::{error, info, warn};

use crate::{
    core::{Fields, RestError, Value},
    request::{PathDecoder, Route},
    schema::SchemaBuilder,
    serializer::{for_accept, ResponseSerializer, SchemaXmlSerializer, APPLICATION_JSON},
    service::ServiceRegistry,
};

pub mod server;

pub use server::{gateway_service, GatewayApp};

/// The parts of an HTTP request the gateway reads.
#[derive(Clone, Debug)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl GatewayRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            accept: None,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// A POST carrying a JSON body.
    pub fn post_json(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::POST,
            content_type: Some(APPLICATION_JSON.to_string()),
            body: body.into(),
            ..Self::get(path)
        }
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    fn has_json_body(&self) -> bool {
        self.method == Method::POST
            && !self.body.is_empty()
            && self
                .content_type
                .as_deref()
                .is_some_and(|value| value.to_ascii_lowercase().starts_with(APPLICATION_JSON))
    }

    /// Parameters submitted in the body, if any.
    fn body_params(&self) -> Result<Option<Fields>, RestError> {
        if !self.has_json_body() {
            return Ok(None);
        }
        let json: serde_json::Value = serde_json::from_slice(&self.body).map_err(|e| {
            warn!("Unparsable body on [{}]: {e}", self.path);
            RestError::internal("Invalid request body")
        })?;
        match Value::from_json(json) {
            value @ (Value::Map(_) | Value::Object(_)) => Ok(value.fields().cloned()),
            _ => Err(RestError::internal("Invalid request body")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    fn success(mut serializer: Box<dyn ResponseSerializer>, result: Value) -> Self {
        serializer.configure(Some(result), None);
        Self {
            status: StatusCode::OK,
            content_type: serializer.content_type(),
            body: serializer.serialize(),
        }
    }

    fn failure(mut serializer: Box<dyn ResponseSerializer>, err: RestError) -> Self {
        let status = err.status();
        serializer.configure(None, Some(err.to_value()));
        Self {
            status,
            content_type: serializer.content_type(),
            body: serializer.serialize(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Schema-XML for the schema path, the `Accept` choice otherwise.
fn serializer_for(request: &GatewayRequest) -> Box<dyn ResponseSerializer> {
    if PathDecoder::is_schema(&request.path) {
        Box::new(SchemaXmlSerializer::new())
    } else {
        for_accept(request.accept.as_deref())
    }
}

pub struct Gateway {
    services: Arc<ServiceRegistry>,
}

impl Gateway {
    pub fn new(services: ServiceRegistry) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Handles one request. Never fails: every error, a panic included, is
    /// written as an error response.
    pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
        match AssertUnwindSafe(self.respond(&request)).catch_unwind().await {
            Ok(response) => {
                info!("{} {} -> {}", request.method, request.path, response.status);
                response
            }
            Err(_) => {
                error!("Request [{}] panicked", request.path);
                self.reject(&request, RestError::internal("Internal server error"))
            }
        }
    }

    /// Answers `request` with `err` without running it.
    pub fn reject(&self, request: &GatewayRequest, err: RestError) -> GatewayResponse {
        let response = GatewayResponse::failure(serializer_for(request), err);
        info!("{} {} -> {}", request.method, request.path, response.status);
        response
    }

    async fn respond(&self, request: &GatewayRequest) -> GatewayResponse {
        // the schema never depends on the body
        if PathDecoder::is_schema(&request.path) {
            return self.schema();
        }

        let serializer = for_accept(request.accept.as_deref());
        let body = match request.body_params() {
            Ok(body) => body,
            Err(err) => return GatewayResponse::failure(serializer, err),
        };

        let route = match PathDecoder::new(&self.services).decode(&request.path, body) {
            Ok(route) => route,
            Err(err) => {
                warn!("Rejected [{}]: {err}", request.path);
                return GatewayResponse::failure(serializer, err);
            }
        };

        match route {
            Route::Schema => self.schema(),
            Route::Request(req) => match req.execute().await {
                Ok(result) => GatewayResponse::success(serializer, result),
                Err(err) => {
                    warn!("Request [{}] failed: {err}", request.path);
                    GatewayResponse::failure(serializer, err)
                }
            },
        }
    }

    fn schema(&self) -> GatewayResponse {
        let mut serializer = SchemaXmlSerializer::new();
        match SchemaBuilder::new().build(&self.services) {
            Ok(document) => {
                serializer.set_document(document);
                GatewayResponse::success(Box::new(serializer), Value::Null)
            }
            Err(err) => {
                error!("Schema build failed: {err}");
                GatewayResponse::failure(Box::new(serializer), err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::RestResult,
        serializer::APPLICATION_XML,
        reflect::ControllerDecl,
        service::{Arguments, Controller},
    };

    struct Boom;

    #[async_trait]
    impl Controller for Boom {
        fn declare(decl: &mut ControllerDecl) {
            decl.action("explode");
        }

        async fn invoke(&self, _action: &str, _args: Arguments) -> RestResult<Value> {
            panic!("boom")
        }
    }

    fn gateway() -> Gateway {
        let mut services = ServiceRegistry::new();
        services.register("boom", Boom).unwrap();
        Gateway::new(services)
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let response = gateway()
            .handle(GatewayRequest::get("/service/boom/action/explode"))
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("INTERNAL_SERVER_ERROR"));
    }

    #[tokio::test]
    async fn test_invalid_body() {
        for body in ["{not json", "[1, 2]"] {
            let response = gateway()
                .handle(GatewayRequest::post_json("/service/boom/action/explode", body))
                .await;
            assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(response.text().contains("Invalid request body"));
        }
    }

    #[tokio::test]
    async fn test_schema_ignores_body() {
        let response = gateway()
            .handle(GatewayRequest::post_json("/", "{not json").with_accept(APPLICATION_JSON))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, APPLICATION_XML);
        assert!(response.text().contains(r#"<service id="boom" name="boom">"#));
    }

    #[test]
    fn test_rejection_on_schema_path_is_xml() {
        let gateway = gateway();
        let response = gateway.reject(
            &GatewayRequest::get("/").with_accept(APPLICATION_JSON),
            RestError::internal("Internal server error"),
        );
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.content_type, APPLICATION_XML);
        assert!(response.text().starts_with("<xml><error><code>INTERNAL_SERVER_ERROR</code>"));

        let response = gateway.reject(
            &GatewayRequest::get("/service/boom/action/explode"),
            RestError::internal("Invalid request body"),
        );
        assert_eq!(response.content_type, APPLICATION_JSON);
    }

    #[test]
    fn test_body_ignored_without_json_content_type() {
        let mut request = GatewayRequest::post_json("/", "{not json");
        request.content_type = Some("text/plain".to_string());
        assert_eq!(request.body_params(), Ok(None));
    }
}
