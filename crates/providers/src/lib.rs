pub mod classify;
pub mod openai_compat;
pub mod registry;
pub mod traits;
pub mod util;

// Re-exports for convenience.
pub use openai_compat::OpenAiCompatClient;
pub use registry::ProviderRegistry;
pub use traits::{
    CandidateCompletion, CompletionClient, CompletionParams, CompletionRequest,
    CompletionResponse, FinishReason,
};
