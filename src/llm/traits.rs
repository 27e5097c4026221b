use super::types::CompletionRequest;
use crate::error::LlmError;
use std::future::Future;
use std::pin::Pin;

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;

/// A text-generation backend. Implementations make exactly one network call
/// per `complete`; retry and fallback live in the layers above.
pub trait Provider: Send + Sync {
    /// Provider identifier (e.g. "openai", "scripted").
    fn name(&self) -> &str;

    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
}
