use std::fmt::Write as _;

use tg_domain::message::{Message, Role};

use crate::tutor::{ChatSession, GuidedTutor};

/// Sent in place of a student message when the tutor speaks first.
pub const OPENING_REQUEST: &str = "Please generate an initial message for the user.";

const SOCRATIC_GUIDELINES: &str = "\
You are an AI tutor trained to follow the best practices in teaching and learning, grounded in evidence-based educational research.
Your role is to assist students who are seeking help with their coursework or projects, but you must do so in a way that promotes learning and doesn't provide direct solutions to class exercises. Here are your guidelines:

1. Adapt explanations to the student's level of understanding, offering analogies, examples, and step-by-step guidance.
2. Never provide complete code solutions or direct answers to class exercises that would rob the student of the learning experience.
   a. If the student is asking for a syntax pattern or generic example not connected to a specific problem, though, it is okay to provide that.
3. Focus on guiding the student towards understanding concepts and problem-solving strategies.
4. Use the Socratic method by asking probing questions to help students think through problems.
5. Provide hints, explanations of relevant concepts, syntax rules, and suggestions for resources when appropriate.
6. Encourage good coding practices.

When a student asks a question, follow this process:

1. Analyze the question to identify the core concept or problem the student is struggling with.
2. Consider what foundational knowledge the student might be missing.
3. Think about how you can guide the student towards the solution without giving it away.
4. In your conversation, include:
   a. Clarifying questions (as needed)
   b. Explanations of relevant concepts
   c. Generic syntax patterns and rules the student may not know
   d. Hints or suggestions to guide their thinking
   e. Encouragement to attempt the problem themselves
5. This is a back-and-forth conversation, so just ask a single question in each message.  Wait for the answer to a given question before asking another.
6. Use markdown formatting, including ` for inline code.
7. Use TeX syntax for mathematical formulas, wrapping them in \\(...\\) or \\[...\\] as appropriate.

Do not provide direct solutions or complete code snippets. Instead, focus on guiding the student's learning process.
   a. If the student is asking for a syntax pattern or generic example not connected to a specific problem, though, it is okay to provide that.
";

const GUIDED_INTRO: &str = "\
You are an AI tutor trained to follow the best practices in teaching and learning, grounded in evidence-based educational research.
Your role is to assist students with learning and practicing a specific topic, following a plan that has been defined by the instructor.
";

const GUIDED_RULES: &str = "\
**Guidelines:**
1. Work on one learning objective at a time.
  a. Carefully and slowly assess the student's understanding at every step, and proceed to the next only when the student has demonstrated a solid grasp of the current one.
  b. The student may start with no understanding of a particular objective.  Always start by asking the student to give their own understanding of a topic, if any, before using any specific questions, and teach them anything they don't know yet.
  c. Do not use a student's self report of understanding; always check their understanding via asking questions and carefully considering their responses.  It is better to be careful than to move on mistakenly when a student still hasn't fully grasped something.
  d. If a student's answer is vague or ambiguous, ask for more detail.
  e. Only ask questions whose answer has *not* already been provided or discussed in the chat.  Do not ask the student to explain something you just explained to them.
  f. Before moving to either a new objective or another question within an objective, see if the student has any remaining questions or outstanding confusion first.
2. Keep the conversation natural.  This should be a conversation and a tutorial, not a rigid quiz or formal assessment.  Ask only **one** question at a time.
3. Use the Socratic method by asking probing questions to help students think through things.
4. Adapt explanations to the student's demonstrated level of understanding, offering analogies, examples, and step-by-step guidance.
5. When discussing programming and code, provide concrete code examples rather than describing code with words.
6. Do not allow the chat to move away from the topic and objectives defined above for this chat, unless the new topic is directly connected to the discussion so far.

**Response Format:**
1. Use markdown formatting, including ` for inline code and ``` for blocks, but avoid headings and overly-formal presentation.
2. For mathematical formulas, use TeX syntax, wrapping each in \\(...\\) or \\[...\\] as appropriate.
";

pub(super) const ANALYZE_INSTRUCTIONS: &str = "\
Respond with a JSON object containing analysis items:
 - 'summary': a string summarizing the entire conversation so far with a focus on the learning objectives and the progress the student has made in each
 - 'progress': a list with an item for every learning objective, each of which is a dictionary containing:
   - 'objective': the learning objective text (do not number them)
   - 'status': a string from the set: \"in progress\" (if the tutor's most recent message involves this objective), \"completed\" (if the tutor has finished working through the objective), \"moved on\" (if the tutor moved on from the objective before completing it because of the student's responses), or \"not started\"
";

const QUESTION_DESIGN: &str = "\
## Question design

Think carefully about how each question can assess understanding effectively without implying or even hinting at the correct answer.  Students could respond correctly based on what they think is implied even if they haven't understood something.
- Avoid yes/no questions.
- Avoid questions in which the answer is obviously part of the question.
- Avoid questions that have been answered in one of the previous questions.

If the topic is related to programming: In addition to asking conceptual questions, you can ask questions about example code or ask the student to write code.  It's often better to involve concrete code than to ask or discuss things more abstractly.  Some questions can have example code that is non-obvious or maybe even a little \"tricky.\"

## Response formatting, guidelines

Always respond in the form of a JSON object containing a single key \"questions\" holding an array of strings, with one question per string.
- Use markdown formatting inside each string, including ``` for multi-line code blocks.
- Do not number the questions.
- Ensure every question is phrased as a question, not as a directive or command.  E.g., instead of \"Explain how X does Y\", write \"How does X do Y?\"
";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(super) fn inquiry_system(session: &ChatSession) -> String {
    let mut out = String::from(SOCRATIC_GUIDELINES);
    let _ = write!(
        out,
        "\nThe topic of this chat from the student is: <topic>{}</topic>\n\n\
         If the topic is broad and it could take more than one chat session to cover all aspects of it, first ask the student to clarify what, specifically, they are attempting to learn about it.\n",
        session.topic
    );
    if let Some(context) = session.context.as_deref().filter(|c| !c.trim().is_empty()) {
        let _ = write!(
            out,
            "\nThe student's instructor provided additional context that may be relevant to this chat:\n<context>\n{context}\n</context>"
        );
    }
    out.trim_end().to_owned()
}

pub(super) fn guided_system(session: &ChatSession) -> String {
    let mut out = String::from(GUIDED_INTRO);
    let _ = write!(
        out,
        "\nThe topic of this chat is:\n<topic>\n{}\n</topic>\n\n\
         The learning context given by the instructor is:\n<learning_context>\n{}\n</learning_context>\n\n\
         Here are the specific learning objectives along with assessment questions for each.\n\n",
        session.topic,
        session.context.as_deref().unwrap_or_default(),
    );
    for (i, objective) in session.objectives.iter().enumerate() {
        let _ = write!(out, "<objective>\n{}. {}\n\n", i + 1, objective.name);
        for question in &objective.questions {
            let _ = write!(out, "<question>\n{question}\n</question>\n");
        }
        out.push_str("</objective>\n");
    }
    out.push('\n');
    out.push_str(GUIDED_RULES);
    out
}

/// System prompt, then the stored turns, then the opening request when the
/// transcript does not end on a student turn.
pub(super) fn with_transcript(system: String, session: &ChatSession) -> Vec<Message> {
    let mut messages = Vec::with_capacity(session.messages.len() + 2);
    messages.push(Message::system(system));
    messages.extend(session.messages.iter().cloned());
    if session.messages.last().map(|m| m.role) != Some(Role::User) {
        messages.push(Message::user(OPENING_REQUEST));
    }
    messages
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tutor setup
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn push_document(out: &mut String, tutor: &GuidedTutor) {
    if let Some(document) = tutor.document.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = write!(
            out,
            "The instructor has provided this document as additional context:\n<document>\n{document}\n</document>\n\n"
        );
    }
}

pub(super) fn objectives_system(tutor: &GuidedTutor) -> String {
    let mut out = format!(
        "You are an automated tutoring system.  Your goal here is to generate a set of learning objectives for the topic given by the instructor: <topic>{}</topic>\n\n\
         The instructor has provided this learning context: <learning_context>{}</learning_context>\n\n",
        tutor.topic, tutor.context
    );
    push_document(&mut out, tutor);
    out.push_str("Always respond in the form of a JSON object containing a single key \"objectives\" holding an array of strings, with one learning objective per string.\n");
    out
}

pub(super) fn narrow_objectives_prompt(keep: usize) -> String {
    format!(
        "Narrow that down to {keep} fundamental learning objectives to create a list of the most critical and earliest objectives a student would have when first studying the topic.  Order them in the most sensible order for a student encountering and mastering each sequentially, taking into account potential dependencies and otherwise ordering them in order of increasing complexity.  Do not include any that are a subset of a previous objective."
    )
}

pub(super) fn questions_system(tutor: &GuidedTutor) -> String {
    let mut out = format!(
        "You are an automated tutoring system.  Your goal here is to generate a set of questions, based on a learning objective, that you might use to assess a student's understanding and mastery of that learning objective.\n\n\
         The instructor has provided this learning context:\n<learning_context>\n{}\n</learning_context>\n\n",
        tutor.context
    );
    push_document(&mut out, tutor);
    out.push_str(QUESTION_DESIGN);
    out
}

pub(super) fn questions_prompt(tutor: &GuidedTutor, index: usize, count: usize) -> String {
    let names: Vec<&str> = tutor.objectives.iter().map(|o| o.name.as_str()).collect();
    let objective = names.get(index).copied().unwrap_or_default();
    let previous = names.get(..index).unwrap_or_default();
    let following = names.get(index + 1..).unwrap_or_default();

    let mut out = format!("Learning objective: {objective}.\n");
    if !previous.is_empty() {
        out.push_str("The student has already demonstrated understanding and mastery of previous objectives:\n");
        for name in previous {
            let _ = writeln!(out, " - {name}");
        }
        out.push('\n');
    }
    if !following.is_empty() {
        out.push_str("The student will later encounter these following objectives, which should NOT be covered in these questions:\n");
        for name in following {
            let _ = writeln!(out, " - {name}");
        }
        out.push('\n');
    }
    let _ = write!(out, "Generate {count} questions.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutor::{ChatMode, LearningObjective};

    fn guided_session() -> ChatSession {
        let mut tutor = GuidedTutor::new("loops", "Loops", "Intro CS");
        tutor.objectives = vec![
            LearningObjective::new("Write a for loop", vec!["What does range(3) yield?".into()]),
            LearningObjective::new("Trace a while loop", vec![]),
        ];
        ChatSession::guided("u1", None, &tutor)
    }

    #[test]
    fn guided_system_numbers_objectives_and_lists_questions() {
        let session = guided_session();
        let system = guided_system(&session);
        assert!(system.contains("<objective>\n1. Write a for loop\n\n<question>\nWhat does range(3) yield?\n</question>\n</objective>\n"));
        assert!(system.contains("<objective>\n2. Trace a while loop\n\n</objective>\n\n**Guidelines:**"));
        assert!(system.contains("<learning_context>\nIntro CS\n</learning_context>"));
    }

    #[test]
    fn opening_request_only_when_no_pending_student_turn() {
        let mut session = guided_session();
        let messages = with_transcript("sys".into(), &session);
        assert_eq!(messages.last().unwrap().content, OPENING_REQUEST);

        session.messages.push(Message::assistant("Hi! What do you know about loops?"));
        session.messages.push(Message::user("not much"));
        let messages = with_transcript("sys".into(), &session);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages.last().unwrap().content, "not much");
    }

    #[test]
    fn inquiry_system_includes_topic_and_optional_context() {
        let mut session = ChatSession::inquiry("u1", None, "recursion", None);
        assert_eq!(session.mode, ChatMode::Inquiry);
        let system = inquiry_system(&session);
        assert!(system.contains("<topic>recursion</topic>"));
        assert!(!system.contains("<context>"));
        assert!(system.ends_with("learn about it."));

        session.context = Some("CS1, Python".into());
        assert!(inquiry_system(&session).ends_with("<context>\nCS1, Python\n</context>"));
    }

    #[test]
    fn questions_prompt_splits_previous_and_following() {
        let mut tutor = GuidedTutor::new("t", "Topic", "ctx");
        tutor.objectives = ["a", "b", "c"]
            .iter()
            .map(|n| LearningObjective::new(*n, vec![]))
            .collect();
        let prompt = questions_prompt(&tutor, 1, 4);
        assert!(prompt.starts_with("Learning objective: b.\n"));
        assert!(prompt.contains("previous objectives:\n - a\n"));
        assert!(prompt.contains("in these questions:\n - c\n"));
        assert!(prompt.ends_with("Generate 4 questions."));

        let first = questions_prompt(&tutor, 0, 4);
        assert!(!first.contains("previous objectives"));
    }

    #[test]
    fn document_is_included_when_present() {
        let mut tutor = GuidedTutor::new("t", "Topic", "ctx");
        assert!(!objectives_system(&tutor).contains("<document>"));
        tutor.document = Some("Chapter 4 notes".into());
        assert!(objectives_system(&tutor).contains("<document>\nChapter 4 notes\n</document>"));
        assert!(questions_system(&tutor).contains("<document>\nChapter 4 notes\n</document>"));
    }
}
