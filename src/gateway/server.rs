use std::sync::Arc;

use async_trait::async_trait;
use http::{header, Response, StatusCode};
use log::{error, warn};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use pingora_error::Result;

use crate::{config::Listener, core::RestError};

use super::{Gateway, GatewayRequest, GatewayResponse};

/// pingora application answering every request through a [`Gateway`].
pub struct GatewayApp {
    gateway: Arc<Gateway>,
}

impl GatewayApp {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

/// Builds the listening service with one TCP endpoint per listener.
pub fn gateway_service(gateway: Arc<Gateway>, listeners: &[Listener]) -> Service<GatewayApp> {
    let mut service = Service::new("pingrest gateway".to_string(), GatewayApp::new(gateway));
    for listener in listeners {
        service.add_tcp(&listener.address.to_string());
    }
    service
}

#[async_trait]
impl ServeHttp for GatewayApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let request = {
            let req_header = http_session.req_header();
            let header_value = |name: header::HeaderName| {
                req_header
                    .headers
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            GatewayRequest {
                method: req_header.method.clone(),
                path: req_header.uri.path().to_string(),
                accept: header_value(header::ACCEPT),
                content_type: header_value(header::CONTENT_TYPE),
                body: Vec::new(),
            }
        };

        let body = read_request_body(http_session).await;
        let response = answer(&self.gateway, request, body).await;
        Response::builder()
            .status(response.status)
            .header(header::CONTENT_TYPE, response.content_type)
            .header(header::CONTENT_LENGTH, response.body.len())
            .body(response.body)
            .unwrap_or_else(|e| {
                error!("Failed to build response: {e}");
                let mut fallback = Response::new(Vec::new());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

/// Runs `request` once its body is read; a body that could not be read is
/// rejected without dispatching.
async fn answer(
    gateway: &Gateway,
    mut request: GatewayRequest,
    body: Result<Vec<u8>>,
) -> GatewayResponse {
    match body {
        Ok(body) => {
            request.body = body;
            gateway.handle(request).await
        }
        Err(e) => {
            warn!("Failed to read body of [{}]: {e}", request.path);
            gateway.reject(&request, RestError::internal("Invalid request body"))
        }
    }
}

async fn read_request_body(http_session: &mut ServerSession) -> Result<Vec<u8>> {
    let mut body_data = Vec::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body_data.extend_from_slice(&bytes);
    }
    Ok(body_data)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pingora_error::{Error, ErrorType::ReadError};

    use super::*;
    use crate::{
        core::{RestResult, Value},
        reflect::ControllerDecl,
        service::{Arguments, Controller, ServiceRegistry},
    };

    static CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Counter;

    #[async_trait]
    impl Controller for Counter {
        fn declare(decl: &mut ControllerDecl) {
            decl.action("bump").param("by", "int").default_value(1);
        }

        async fn invoke(&self, _action: &str, _args: Arguments) -> RestResult<Value> {
            Ok(Value::Int(CALLS.fetch_add(1, Ordering::SeqCst) as i64 + 1))
        }
    }

    fn gateway() -> Gateway {
        let mut services = ServiceRegistry::new();
        services.register("counter", Counter).unwrap();
        Gateway::new(services)
    }

    #[tokio::test]
    async fn test_unreadable_body_is_not_dispatched() {
        let gateway = gateway();
        let request = GatewayRequest::post_json("/service/counter/action/bump/by/2", "");
        let before = CALLS.load(Ordering::SeqCst);

        let response = answer(
            &gateway,
            request.clone(),
            Error::e_explain(ReadError, "connection reset"),
        )
        .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("Invalid request body"));
        assert_eq!(CALLS.load(Ordering::SeqCst), before);

        let response = answer(&gateway, request, Ok(br#"{"by": 3}"#.to_vec())).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(CALLS.load(Ordering::SeqCst), before + 1);
    }
}
