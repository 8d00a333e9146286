use std::fmt::Write as _;

use tg_domain::message::Message;

use crate::help::HelpInputs;
use crate::scoring::AvoidSet;

const MAIN_JOB: &str = "to respond to a student's query as a helpful expert teacher";
const SUFFICIENCY_JOB: &str =
    "to evaluate whether a student's query contains sufficient detail for you to provide assistance";
const ERROR_ONLY_ISSUE: &str = "Please help me understand this error.";

const MAIN_INSTRUCTIONS: &str = "\
If the student query is off-topic, respond with an error.

Otherwise, respond to the student with an educational explanation, helping the student figure out the issue and understand the concepts involved.  If the student query includes an error message, tell the student what it means, giving a detailed explanation to help the student understand the message.  Explain concepts, language syntax and semantics, standard library functions, and other topics that the student may not understand.  Be positive and encouraging!

- Do not write a corrected or updated version of the student's code.  You must not write code for the student.
- Use Markdown formatting, including ` for inline code.
- Use TeX syntax for mathematical formulas, wrapping them in \\(...\\) or \\[...\\] as appropriate.
- Do not write a heading for the response.
- Do not write any example code blocks.
- If the student wrote in a language other than English, always respond in the student's own language.
";

const MAIN_CLOSING: &str = "
How would you respond to the student to guide them and explain concepts without providing example code?
";

const SUFFICIENCY_INSTRUCTIONS: &str = "\
Do not tell the student how to solve the issue or correct their code.

Please assess their query and tell them whether it contains sufficient detail for you to potentially provide help (write \"OK.\") or not (ask for clarification).  You can make reasonable assumptions about missing details.  Only ask for clarification if the query is completely ambiguous or unclear.
 - If the query is sufficient and you are able to help, say \"OK.\"
 - Or, if you cannot help without additional information, write directly to the student and clearly describe the additional information you need.  Ask for the most important piece of information, and do not overwhelm the student with minor details.
";

const TOPICS_REQUEST: &str = "Please give me a list of specific concepts I appear to be having difficulty with in the above exchange.  Write each as a single-sentence description.";
const TOPICS_FORMAT: &str =
    "Respond with a JSON-formatted array of strings with NO other text, like: [\"Item1\",\"Item2\",\"Item3\",\"Item4\"]";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query rendering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Student fields after whitespace cleanup, with the issue filled in when
/// only an error message was given.
struct Query<'a> {
    language: &'a str,
    code: &'a str,
    error: &'a str,
    issue: &'a str,
    context: Option<&'a str>,
}

impl<'a> Query<'a> {
    fn from_inputs(inputs: &'a HelpInputs) -> Self {
        let error = inputs.error.trim_end();
        let mut issue = inputs.issue.trim_end();
        if !error.is_empty() && issue.is_empty() {
            issue = ERROR_ONLY_ISSUE;
        }
        Self {
            language: inputs.language.trim(),
            code: &inputs.code,
            error,
            issue,
            context: inputs.context.as_deref().filter(|c| !c.trim().is_empty()),
        }
    }

    fn wants_issue(&self) -> bool {
        !self.issue.is_empty() || self.error.is_empty()
    }

    fn system(&self, job: &str) -> String {
        let mut out = format!(
            "You are a system for assisting students learning CS and programming.  Your job here is {job}.\n\nA query contains:\n"
        );
        if !self.language.is_empty() {
            out.push_str(" - the programming language they are using (in \"<lang>\")\n");
        }
        if !self.code.is_empty() {
            out.push_str(" - a relevant snippet of their code (in \"<code>\")\n");
        }
        if !self.error.is_empty() {
            out.push_str(" - an error message they are seeing (in \"<error>\")\n");
        }
        if self.wants_issue() {
            out.push_str(" - an issue or question and how they want assistance (in \"<issue>\")\n");
        }
        if let Some(context) = self.context {
            let _ = write!(
                out,
                "Additional context provided by the instructor:\n<context>\n{context}\n</context>\n"
            );
        }
        out
    }

    fn user(&self) -> String {
        let mut out = String::new();
        if !self.language.is_empty() {
            let _ = writeln!(out, "<lang>{}</lang>", self.language);
        }
        if !self.code.is_empty() {
            let _ = write!(out, "<code>\n{}\n</code>\n", self.code);
        }
        if !self.error.is_empty() {
            let _ = write!(out, "<error>\n{}\n</error>\n", self.error);
        }
        if self.wants_issue() {
            let _ = write!(out, "<issue>\n{}\n</issue>\n", self.issue);
        }
        out
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Protocol messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(super) fn main_messages(inputs: &HelpInputs, avoid: &AvoidSet) -> Vec<Message> {
    let query = Query::from_inputs(inputs);
    let mut instructions = String::from(MAIN_INSTRUCTIONS);
    if !avoid.is_empty() {
        let terms: Vec<String> = avoid.iter().map(|t| format!("`{t}`")).collect();
        let _ = writeln!(
            instructions,
            "- Do not mention or suggest using any of the following: {}.",
            terms.join(", ")
        );
    }
    instructions.push_str(MAIN_CLOSING);
    vec![
        Message::system(query.system(MAIN_JOB)),
        Message::user(query.user()),
        Message::system(instructions),
    ]
}

pub(super) fn sufficiency_messages(inputs: &HelpInputs) -> Vec<Message> {
    let query = Query::from_inputs(inputs);
    vec![
        Message::system(query.system(SUFFICIENCY_JOB)),
        Message::user(query.user()),
        Message::system(SUFFICIENCY_INSTRUCTIONS),
    ]
}

pub(super) fn cleanup_prompt(text: &str) -> String {
    format!(
        "The following was written to help a student in a CS class.  However, any example code (such as in ``` Markdown delimiters) can give the student an assignment's answer rather than help them figure it out themselves.  We need to provide help without including example code.  To do this, rewrite the following to remove any code blocks so that the response explains what the student should do but does not provide solution code.\n---\n{text}\n---\nRewritten:\n"
    )
}

pub(super) fn topics_messages(inputs: &HelpInputs, main: &str) -> Vec<Message> {
    let query = Query::from_inputs(inputs);
    vec![
        Message::system(query.system(MAIN_JOB)),
        Message::user(query.user()),
        Message::assistant(main),
        Message::user(TOPICS_REQUEST),
        Message::system(TOPICS_FORMAT),
    ]
}
