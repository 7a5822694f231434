//! HTTP surface: health check and cycle trigger.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;
