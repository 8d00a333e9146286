//! Tutoring chat state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tg_domain::error::{Error, Result};
use tg_domain::message::{Message, Role};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guided tutor definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl LearningObjective {
    pub fn new(name: impl Into<String>, questions: Vec<String>) -> Self {
        Self {
            name: name.into(),
            questions,
        }
    }
}

/// An instructor-authored guided tutor: the topic plus the objective and
/// question rubric every chat started from it follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidedTutor {
    pub name: String,
    pub topic: String,
    /// Learning context given by the instructor.
    #[serde(default)]
    pub context: String,
    /// Extracted text of an optional reference document.
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub objectives: Vec<LearningObjective>,
}

impl GuidedTutor {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            context: context.into(),
            document: None,
            objectives: Vec::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Progress analysis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveStatus {
    #[serde(rename = "not started")]
    NotStarted,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "moved on")]
    MovedOn,
}

impl ObjectiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectiveStatus::NotStarted => "not started",
            ObjectiveStatus::InProgress => "in progress",
            ObjectiveStatus::Completed => "completed",
            ObjectiveStatus::MovedOn => "moved on",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    pub objective: String,
    pub status: ObjectiveStatus,
}

/// The model's latest read on a guided chat. Replaced wholesale each turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressAnalysis {
    pub summary: String,
    pub progress: Vec<ObjectiveProgress>,
}

impl ProgressAnalysis {
    /// Parse a JSON-mode analysis reply.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Parse(format!("progress analysis: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Inquiry,
    Guided,
}

impl ChatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatMode::Inquiry => "inquiry",
            ChatMode::Guided => "guided",
        }
    }
}

/// One tutoring conversation.
///
/// `messages` holds only the turns the student and tutor actually
/// exchanged; system prompts are rebuilt for every call and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub class_id: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    pub mode: ChatMode,
    /// Frozen at creation for guided chats, empty for inquiry chats.
    #[serde(default)]
    pub objectives: Vec<LearningObjective>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub analysis: Option<ProgressAnalysis>,
    /// Raw provider payloads, one per completion made for this chat.
    #[serde(default)]
    pub usages: Vec<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    fn new(
        user_id: String,
        class_id: Option<String>,
        topic: String,
        context: Option<String>,
        mode: ChatMode,
        objectives: Vec<LearningObjective>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            class_id,
            topic,
            context,
            mode,
            objectives,
            messages: Vec::new(),
            analysis: None,
            usages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// An open-ended chat on a student-chosen topic.
    pub fn inquiry(
        user_id: impl Into<String>,
        class_id: Option<String>,
        topic: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self::new(
            user_id.into(),
            class_id,
            topic.into(),
            context,
            ChatMode::Inquiry,
            Vec::new(),
        )
    }

    /// A chat following `tutor`'s rubric. The objectives are copied, so
    /// later edits to the tutor do not affect this chat.
    pub fn guided(user_id: impl Into<String>, class_id: Option<String>, tutor: &GuidedTutor) -> Self {
        Self::new(
            user_id.into(),
            class_id,
            tutor.topic.clone(),
            Some(tutor.context.clone()),
            ChatMode::Guided,
            tutor.objectives.clone(),
        )
    }

    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
        self.updated_at = Utc::now();
    }

    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_parses_status_labels() {
        let text = r#"{"summary":"Working on loops.","progress":[
            {"objective":"Write a for loop","status":"in progress"},
            {"objective":"Trace a while loop","status":"not started"},
            {"objective":"Nest loops","status":"moved on"}
        ]}"#;
        let analysis = ProgressAnalysis::parse(text).unwrap();
        assert_eq!(analysis.progress[0].status, ObjectiveStatus::InProgress);
        assert_eq!(analysis.progress[2].status, ObjectiveStatus::MovedOn);
    }

    #[test]
    fn analysis_with_unknown_status_is_a_parse_error() {
        let text = r#"{"summary":"x","progress":[{"objective":"a","status":"half done"}]}"#;
        assert!(matches!(ProgressAnalysis::parse(text), Err(Error::Parse(_))));
        assert!(matches!(ProgressAnalysis::parse("not json"), Err(Error::Parse(_))));
    }

    #[test]
    fn guided_chat_copies_objectives() {
        let mut tutor = GuidedTutor::new("loops", "Loops", "CS1");
        tutor.objectives.push(LearningObjective::new("Write a for loop", vec![]));
        let chat = ChatSession::guided("u1", Some("c1".into()), &tutor);
        tutor.objectives.clear();
        assert_eq!(chat.objectives.len(), 1);
        assert_eq!(chat.mode, ChatMode::Guided);
        assert_eq!(chat.context.as_deref(), Some("CS1"));
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut chat = ChatSession::inquiry("u1", None, "recursion", Some("CS1".into()));
        chat.push_turn(Role::Assistant, "What is a base case?");
        chat.push_turn(Role::User, "when it ```stops```");
        chat.push_turn(Role::Assistant, "Right. And then?");
        let json = serde_json::to_string(&chat).unwrap();
        let back: ChatSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.messages, chat.messages);
        assert_eq!(back, chat);
        assert_eq!(back.user_turns(), 1);
        assert_eq!(back.last_assistant_text(), Some("Right. And then?"));
    }
}
