//! HTTP API: router, session resolver, trial gate and handlers.

pub mod app;
pub mod context;
pub mod middleware;
