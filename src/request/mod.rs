//! Decoded requests and their execution.

use log::debug;

use crate::{
    core::{Fields, RestResult, Value},
    service::{dispatch, ServiceHandle},
};

pub mod decoder;
pub mod multi;

pub use decoder::{path_to_params, PathDecoder};
pub use multi::{execute_batch, Response, TokenResolver};

/// What a request path selects.
#[derive(Debug)]
pub enum Route {
    /// The schema document
    Schema,
    Request(Request),
}

#[derive(Debug)]
pub enum Request {
    Single(SingleRequest),
    Batch(BatchRequest),
}

/// One action call against an already-resolved service.
#[derive(Clone, Debug)]
pub struct SingleRequest {
    pub service: ServiceHandle,
    pub action: String,
    pub params: Fields,
}

/// Ordered action calls whose parameters may reference earlier results.
#[derive(Clone, Debug, Default)]
pub struct BatchRequest {
    pub entries: Vec<SingleRequest>,
}

impl SingleRequest {
    pub async fn execute(&self) -> RestResult<Value> {
        dispatch(&self.service, &self.action, &self.params).await
    }
}

impl BatchRequest {
    pub async fn execute(self) -> Vec<Response> {
        execute_batch(self.entries).await
    }
}

impl Request {
    /// Runs the request. A batch always succeeds as a whole; each entry's
    /// outcome is one `RestResponse` object in the returned list.
    pub async fn execute(self) -> RestResult<Value> {
        match self {
            Request::Single(single) => single.execute().await,
            Request::Batch(batch) => {
                let responses = batch.execute().await;
                debug!("Multi-request produced {} response(s)", responses.len());
                Ok(Value::List(
                    responses.into_iter().map(Response::into_value).collect(),
                ))
            }
        }
    }
}
