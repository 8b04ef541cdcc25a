//! HTTP gateway for the capability registry.

pub mod config;
pub mod logging;
pub mod routes;
pub mod server;
