use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Help queries
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpConfig {
    /// Candidates requested for the main answer.
    #[serde(default = "d_candidates")]
    pub candidates: u32,
    /// Keywords students' answers should not mention, one per line.
    #[serde(default)]
    pub avoid: String,
    /// Run the topics follow-up after every help query.
    #[serde(default)]
    pub extract_topics: bool,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            candidates: d_candidates(),
            avoid: String::new(),
            extract_topics: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tutor chats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// One JSON document per chat is written here.
    #[serde(default = "d_chat_dir")]
    pub chat_dir: PathBuf,
    /// Objective count asked of the setup protocol.
    #[serde(default = "d_objectives")]
    pub objectives: usize,
    #[serde(default = "d_questions")]
    pub questions_per_objective: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            chat_dir: d_chat_dir(),
            objectives: d_objectives(),
            questions_per_objective: d_questions(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_candidates() -> u32 {
    2
}
fn d_chat_dir() -> PathBuf {
    PathBuf::from("./data/chats")
}
fn d_objectives() -> usize {
    5
}
fn d_questions() -> usize {
    4
}
