//! `tutorgate tutor`: authoring guided tutors.
//!
//! Setup calls use the caller's access without spending quota; a failed or
//! unparseable generation leaves nothing written.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use tg_access::ResolveOptions;
use tg_domain::tenant::TenantContext;
use tg_engine::tutor::setup::{generate_objectives, generate_questions};
use tg_engine::tutor::GuidedTutor;

use crate::bootstrap::App;
use crate::guard::{with_access, Guarded};

/// Options for `tutor new`, mirroring its flags.
#[derive(Debug)]
pub struct NewTutor {
    pub name: String,
    pub topic: String,
    pub context: String,
    pub document: Option<PathBuf>,
    pub objectives: Option<usize>,
    pub questions: Option<usize>,
    pub out: PathBuf,
}

pub async fn new_tutor(
    app: &App,
    ctx: &TenantContext,
    opts: NewTutor,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let mut tutor = GuidedTutor::new(opts.name, opts.topic, opts.context);
    if let Some(path) = &opts.document {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        tutor.document = Some(text);
    }
    let objectives = opts.objectives.unwrap_or(app.config.tutor.objectives);
    let questions = opts
        .questions
        .unwrap_or(app.config.tutor.questions_per_objective);
    let out = opts.out;

    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let llm = app.tutor.handle(&access)?;

        eprintln!("Generating {objectives} learning objectives...");
        tutor.objectives = generate_objectives(&llm, &tutor, objectives, cancel).await?;
        eprintln!("Generating {questions} questions per objective...");
        generate_questions(&llm, &mut tutor, questions, cancel).await?;

        super::write_document(&out, &tutor)?;
        print_rubric(&tutor);
        eprintln!("wrote {}", out.display());
        Ok(())
    })
    .await
}

/// Regenerate every objective's questions, rewriting the file in place.
pub async fn regenerate_questions(
    app: &App,
    ctx: &TenantContext,
    path: &Path,
    count: Option<usize>,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let mut tutor: GuidedTutor = super::read_document(path)?;
    let count = count.unwrap_or(app.config.tutor.questions_per_objective);

    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let llm = app.tutor.handle(&access)?;
        generate_questions(&llm, &mut tutor, count, cancel).await?;
        super::write_document(path, &tutor)?;
        print_rubric(&tutor);
        Ok(())
    })
    .await
}

fn print_rubric(tutor: &GuidedTutor) {
    println!("{}: {}", tutor.name, tutor.topic);
    for (i, objective) in tutor.objectives.iter().enumerate() {
        println!("{}. {}", i + 1, objective.name);
        for question in &objective.questions {
            println!("   - {question}");
        }
    }
}
