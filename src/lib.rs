//! A self-describing RPC gateway.
//!
//! Clients call `service.action` operations through paths of the form
//! `/service/{name}/action/{name}/{key}/{value}/...`, chain several calls in
//! one multi-request, and read the whole API back as a schema document at `/`.

pub mod config;
pub mod core;
pub mod domain;
pub mod gateway;
pub mod logging;
pub mod reflect;
pub mod request;
pub mod schema;
pub mod serializer;
pub mod service;
pub mod storage;
