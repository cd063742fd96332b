//! Application services: the conversion lifecycle and the seams it depends on.

pub mod conversion;
pub mod error;
pub mod render;
pub mod storage;
