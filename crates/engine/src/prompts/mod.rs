//! Prompt protocols.
//!
//! Every model call the engine makes is described by one [`Protocol`]
//! variant. A variant borrows the inputs it needs and knows how to render
//! its message list and which sampling parameters it wants.

mod help;
mod tutor;

use tg_domain::message::Message;
use tg_providers::CompletionParams;

use crate::help::HelpInputs;
use crate::scoring::AvoidSet;
use crate::tutor::{ChatSession, GuidedTutor};

pub use tutor::OPENING_REQUEST;

#[derive(Debug, Clone, Copy)]
pub enum Protocol<'a> {
    /// Does the query carry enough detail to help? Expects "OK." or a
    /// clarification request.
    Sufficiency { inputs: &'a HelpInputs },
    /// The educational explanation, `candidates` variants at once.
    MainAnswer {
        inputs: &'a HelpInputs,
        avoid: &'a AvoidSet,
        candidates: u32,
    },
    /// Rewrite `text` without code blocks.
    Cleanup { text: &'a str },
    /// JSON array of concepts the student struggled with.
    Topics { inputs: &'a HelpInputs, main: &'a str },
    /// Brainstorm `brainstorm` objectives, then narrow them to `keep`.
    ObjectiveGeneration {
        tutor: &'a GuidedTutor,
        brainstorm: usize,
        keep: usize,
    },
    /// Assessment questions for `tutor.objectives[index]`.
    QuestionGeneration {
        tutor: &'a GuidedTutor,
        index: usize,
        count: usize,
    },
    /// One open-ended Socratic tutoring turn.
    InquiryTutor { session: &'a ChatSession },
    /// One turn of a rubric-driven tutoring chat.
    GuidedTutor { session: &'a ChatSession },
    /// JSON progress analysis of a guided chat.
    Analysis { session: &'a ChatSession },
}

impl Protocol<'_> {
    /// Stable name for logs and trace events.
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Sufficiency { .. } => "sufficiency",
            Protocol::MainAnswer { .. } => "main_answer",
            Protocol::Cleanup { .. } => "cleanup",
            Protocol::Topics { .. } => "topics",
            Protocol::ObjectiveGeneration { .. } => "objective_generation",
            Protocol::QuestionGeneration { .. } => "question_generation",
            Protocol::InquiryTutor { .. } => "inquiry_tutor",
            Protocol::GuidedTutor { .. } => "guided_tutor",
            Protocol::Analysis { .. } => "analysis",
        }
    }

    /// The opening message list sent to the provider.
    pub fn build_messages(&self) -> Vec<Message> {
        match *self {
            Protocol::Sufficiency { inputs } => help::sufficiency_messages(inputs),
            Protocol::MainAnswer { inputs, avoid, .. } => help::main_messages(inputs, avoid),
            Protocol::Cleanup { text } => vec![Message::user(help::cleanup_prompt(text))],
            Protocol::Topics { inputs, main } => help::topics_messages(inputs, main),
            Protocol::ObjectiveGeneration {
                tutor, brainstorm, ..
            } => vec![
                Message::system(tutor::objectives_system(tutor)),
                Message::user(format!("Generate {brainstorm} learning objectives.")),
            ],
            Protocol::QuestionGeneration { tutor, index, count } => vec![
                Message::system(tutor::questions_system(tutor)),
                Message::user(tutor::questions_prompt(tutor, index, count)),
            ],
            Protocol::InquiryTutor { session } => {
                tutor::with_transcript(tutor::inquiry_system(session), session)
            }
            Protocol::GuidedTutor { session } => {
                tutor::with_transcript(tutor::guided_system(session), session)
            }
            Protocol::Analysis { session } => {
                let mut messages = vec![Message::system(tutor::guided_system(session))];
                messages.extend(session.messages.iter().cloned());
                messages.push(Message::system(tutor::ANALYZE_INSTRUCTIONS));
                messages
            }
        }
    }

    /// User prompts sent one after another, each after the model's reply to
    /// the previous one. Empty for single-shot protocols.
    pub fn follow_up_prompts(&self) -> Vec<String> {
        match *self {
            Protocol::ObjectiveGeneration { keep, .. } => vec![tutor::narrow_objectives_prompt(keep)],
            _ => Vec::new(),
        }
    }

    pub fn candidates(&self) -> u32 {
        match *self {
            Protocol::MainAnswer { candidates, .. } => candidates.max(1),
            _ => 1,
        }
    }

    pub fn json_mode(&self) -> bool {
        matches!(
            self,
            Protocol::ObjectiveGeneration { .. }
                | Protocol::QuestionGeneration { .. }
                | Protocol::Analysis { .. }
        )
    }

    /// `base` with this protocol's candidate count and response format.
    pub fn completion_params(&self, base: &CompletionParams) -> CompletionParams {
        let params = base.clone().with_n(self.candidates());
        if self.json_mode() {
            params.json()
        } else {
            params
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_domain::message::Role;

    fn inputs() -> HelpInputs {
        HelpInputs {
            language: "python".into(),
            code: "print(x)".into(),
            error: "NameError: name 'x' is not defined\n".into(),
            issue: String::new(),
            context: None,
        }
    }

    #[test]
    fn main_answer_requests_candidates_without_json() {
        let i = inputs();
        let avoid = AvoidSet::default();
        let p = Protocol::MainAnswer {
            inputs: &i,
            avoid: &avoid,
            candidates: 2,
        };
        let params = p.completion_params(&CompletionParams::default());
        assert_eq!(params.n, 2);
        assert!(!params.json_mode);
        assert_eq!(params.temperature, 0.25);
    }

    #[test]
    fn question_generation_is_a_single_json_call() {
        let tutor = GuidedTutor::new("loops", "Loops", "");
        let base = CompletionParams {
            max_tokens: 500,
            ..CompletionParams::default()
        };
        let params = Protocol::QuestionGeneration {
            tutor: &tutor,
            index: 0,
            count: 3,
        }
        .completion_params(&base);
        assert_eq!(params.n, 1);
        assert!(params.json_mode);
        assert_eq!(params.max_tokens, 500);
    }

    #[test]
    fn help_messages_are_system_user_system() {
        let i = inputs();
        let roles: Vec<Role> = Protocol::Sufficiency { inputs: &i }
            .build_messages()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::System]);
    }

    #[test]
    fn objective_generation_is_multi_step_json() {
        let tutor = GuidedTutor::new("loops", "Loops", "Intro CS, week 3");
        let p = Protocol::ObjectiveGeneration {
            tutor: &tutor,
            brainstorm: 20,
            keep: 5,
        };
        assert!(p.json_mode());
        let messages = p.build_messages();
        assert_eq!(messages[1].content, "Generate 20 learning objectives.");
        let follow = p.follow_up_prompts();
        assert_eq!(follow.len(), 1);
        assert!(follow[0].starts_with("Narrow that down to 5 fundamental"));
    }

    #[test]
    fn cleanup_is_a_single_user_message() {
        let messages = Protocol::Cleanup { text: "```x```" }.build_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].content.contains("---\n```x```\n---\nRewritten:\n"));
    }
}
