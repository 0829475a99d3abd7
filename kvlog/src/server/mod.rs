//! HTTP server for the log.
//!
//! This module exposes the request protocol over HTTP: a single endpoint
//! accepts tagged JSON requests and returns tagged JSON replies, alongside
//! Prometheus metrics and health checks.

mod config;
mod error;
pub mod handlers;
mod http;
pub mod metrics;
mod middleware;

pub use config::{CliArgs, LogServerConfig, StorageArgs};
pub use error::ApiError;
pub use http::{LogServer, router};
