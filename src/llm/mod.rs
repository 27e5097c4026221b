// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod scrub;
pub mod traits;
pub mod types;

// ── Decorator layers ────────────────────────────────────────────────────────
pub mod fallback;

// ── Provider implementations ────────────────────────────────────────────────
pub mod compatible;

pub use compatible::OpenAiCompatibleProvider;
pub use fallback::ModelChain;
pub use scrub::{sanitize_api_error, scrub_secret_patterns};
pub use traits::{CompletionFuture, Provider};
pub use types::{ChatMessage, CompletionRequest, MessageRole, SamplingParams};
