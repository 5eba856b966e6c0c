//! Core data types

pub mod device;
pub mod record;
