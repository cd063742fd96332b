//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod render;
pub mod storage;
pub mod telemetry;
