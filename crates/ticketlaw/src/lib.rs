//! Core library for the traffic-ticket defense marketplace.
//!
//! Workflows own their domain models, repository traits, service facades,
//! and HTTP routers; the `api` service binds them to real infrastructure.

pub mod access;
pub mod config;
pub mod error;
pub mod http;
pub mod telemetry;
pub mod workflows;
