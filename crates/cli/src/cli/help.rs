//! `tutorgate help` and `tutorgate topics`.

use std::path::{Path, PathBuf};

use clap::Args;
use tokio_util::sync::CancellationToken;

use tg_access::ResolveOptions;
use tg_domain::tenant::TenantContext;
use tg_engine::{HelpInputs, QueryRecord, Sufficiency};

use crate::bootstrap::App;
use crate::guard::{with_access, Guarded};

#[derive(Debug, Args)]
pub struct HelpArgs {
    /// Programming language of the code.
    #[arg(long, default_value = "")]
    pub language: String,
    /// The code in question.
    #[arg(long, default_value = "", conflicts_with = "code_file")]
    pub code: String,
    /// Read the code from a file instead.
    #[arg(long)]
    pub code_file: Option<PathBuf>,
    /// Error message, if any.
    #[arg(long, default_value = "")]
    pub error: String,
    /// What the student needs help with.
    #[arg(long, default_value = "")]
    pub issue: String,
    /// Instructor context for the class or assignment.
    #[arg(long)]
    pub context: Option<String>,
    /// Also extract the topics the query touched on.
    #[arg(long)]
    pub topics: bool,
    /// Print the full query record as JSON.
    #[arg(long)]
    pub json: bool,
    /// Use the system credential instead of the tenant's.
    #[arg(long)]
    pub system_key: bool,
}

impl HelpArgs {
    fn inputs(&self) -> anyhow::Result<HelpInputs> {
        let code = match &self.code_file {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?,
            None => self.code.clone(),
        };
        if code.trim().is_empty() && self.error.trim().is_empty() && self.issue.trim().is_empty() {
            anyhow::bail!("nothing to ask about: give --code, --error or --issue");
        }
        Ok(HelpInputs {
            language: self.language.clone(),
            code,
            error: self.error.clone(),
            issue: self.issue.clone(),
            context: self.context.clone(),
        })
    }
}

/// Run one help query, spending one unit of the tenant's quota.
pub async fn run(
    app: &App,
    ctx: &TenantContext,
    args: HelpArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let inputs = args.inputs()?;
    let want_topics = args.topics || app.config.help.extract_topics;
    let json = args.json;
    let opts = if args.system_key {
        ResolveOptions::system()
    } else {
        ResolveOptions::spending()
    };

    with_access(&app.resolver, ctx, opts, move |access| async move {
        let mut record = app
            .help
            .run_help_query(&access, inputs, &app.avoid, cancel)
            .await?;
        if want_topics {
            record.topics = Some(app.help.extract_topics(&access, &record, cancel).await?);
        }
        print_record(&record, json)
    })
    .await
}

/// Extract topics for a record saved by `help --json`. Not metered.
pub async fn topics(
    app: &App,
    ctx: &TenantContext,
    record_path: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let raw = std::fs::read_to_string(record_path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", record_path.display()))?;
    let record: QueryRecord = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", record_path.display()))?;

    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let topics = app.help.extract_topics(&access, &record, cancel).await?;
        if topics.is_empty() {
            eprintln!("(no topics found)");
        }
        for topic in topics {
            println!("{topic}");
        }
        Ok(())
    })
    .await
}

fn print_record(record: &QueryRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    if let Sufficiency::NeedsClarification(request) = record.sufficiency() {
        println!("{request}\n");
        println!("---\n");
    }
    println!("{}", record.main);
    if let Some(topics) = &record.topics {
        if !topics.is_empty() {
            println!("\nTopics: {}", topics.join(", "));
        }
    }
    Ok(())
}
