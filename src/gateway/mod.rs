//! Axum HTTP surface for the pipeline.
//!
//! - `POST /api/story-gap` runs one request through [`StoryGapPipeline`]
//! - `GET /health` reports liveness
//!
//! Request bodies are size-limited and every request is bounded by a
//! timeout that must cover the whole oracle retry chain.

mod handlers;
mod server;

pub use server::{build_app, run_gateway, run_gateway_with_listener};

use crate::story::StoryGapPipeline;
use std::sync::Arc;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StoryGapPipeline>,
}

#[cfg(test)]
mod tests;
