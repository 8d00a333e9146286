//! Tutoring chats: session state, persistence, the per-round runner and
//! guided-tutor setup.

mod runner;
mod session;
pub mod setup;
mod store;

pub use runner::{AnalysisOutcome, TurnOutcome, TutorRunner};
pub use session::{
    ChatMode, ChatSession, GuidedTutor, LearningObjective, ObjectiveProgress, ObjectiveStatus,
    ProgressAnalysis,
};
pub use store::{ChatStore, JsonChatStore, MemoryChatStore};
