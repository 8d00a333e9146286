//! Query orchestration for tutorgate: the help pipeline, the tutoring chat
//! state machine, and the prompt protocols both are built from.

pub mod help;
pub mod llm;
pub mod prompts;
pub mod scoring;
pub mod tutor;

pub use help::{HelpInputs, HelpPipeline, QueryRecord, Sufficiency};
pub use llm::LlmHandle;
pub use prompts::Protocol;
pub use scoring::{select_best, AvoidSet};
