//! Core data types shared across the SDK.

pub mod entity;
pub mod event;
pub mod log;
