//! Runtime glue: validated service configuration and telemetry.

pub mod config;
pub mod telemetry;
