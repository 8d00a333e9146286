//! Model-assisted authoring of guided tutors.
//!
//! Unlike the chat round, setup has no fallback content: provider failures
//! and unparseable replies are returned to the instructor as errors.

use futures_util::future::try_join_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use tg_domain::error::{Error, Result};

use super::session::{GuidedTutor, LearningObjective};
use crate::llm::LlmHandle;
use crate::prompts::Protocol;

/// Floor for the brainstorm step before narrowing.
const MIN_BRAINSTORM: usize = 20;

#[derive(Deserialize)]
struct ObjectivesReply {
    objectives: Vec<String>,
}

#[derive(Deserialize)]
struct QuestionsReply {
    questions: Vec<String>,
}

/// Brainstorm a wide list of objectives for `tutor.topic`, then narrow it
/// to the `count` most fundamental, in teaching order.
pub async fn generate_objectives(
    llm: &LlmHandle,
    tutor: &GuidedTutor,
    count: usize,
    cancel: &CancellationToken,
) -> Result<Vec<LearningObjective>> {
    let protocol = Protocol::ObjectiveGeneration {
        tutor,
        brainstorm: MIN_BRAINSTORM.max(count + 10),
        keep: count,
    };
    let response = llm.try_multi_completion(&protocol, cancel).await?;
    let reply: ObjectivesReply = serde_json::from_str(response.text())
        .map_err(|e| Error::Parse(format!("objectives: {e}")))?;

    tracing::info!(
        tutor = %tutor.name,
        objectives = reply.objectives.len(),
        "generated learning objectives"
    );
    Ok(reply
        .objectives
        .into_iter()
        .map(|name| LearningObjective::new(name, Vec::new()))
        .collect())
}

/// Generate `count` assessment questions for every objective of `tutor`.
///
/// Objectives are handled concurrently; each request names the objectives
/// before and after it so questions do not overlap. On success every
/// objective's question list is replaced.
pub async fn generate_questions(
    llm: &LlmHandle,
    tutor: &mut GuidedTutor,
    count: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let snapshot: &GuidedTutor = tutor;
    let requests = (0..snapshot.objectives.len()).map(|index| async move {
        let protocol = Protocol::QuestionGeneration {
            tutor: snapshot,
            index,
            count,
        };
        let response = llm.try_completion(&protocol, cancel).await?;
        let reply: QuestionsReply = serde_json::from_str(response.text()).map_err(|e| {
            Error::Parse(format!("questions for objective {}: {e}", index + 1))
        })?;
        Ok::<_, Error>(reply.questions)
    });
    let questions = try_join_all(requests).await?;

    for (objective, questions) in tutor.objectives.iter_mut().zip(questions) {
        objective.questions = questions;
    }
    Ok(())
}
