//! Runtime glue: validated configuration and tracing/telemetry wiring.

pub mod config;
pub mod telemetry;
