//! HTTP service for posting and reading comments.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod app;
pub mod config;
pub mod handlers;
pub mod state;

pub use app::build_router;
