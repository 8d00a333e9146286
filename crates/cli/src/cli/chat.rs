//! `tutorgate chat`: tutoring chats, one-shot or interactive.
//!
//! `say` without a message opens a readline loop that sends each line as a
//! student turn and prints the tutor's reply. Chat turns resolve access but
//! are not metered.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use tg_access::ResolveOptions;
use tg_domain::message::Role;
use tg_domain::tenant::TenantContext;
use tg_engine::tutor::{AnalysisOutcome, ChatSession, GuidedTutor, TurnOutcome};

use crate::bootstrap::App;
use crate::guard::{with_access, Guarded};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat creation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn new_inquiry(
    app: &App,
    ctx: &TenantContext,
    topic: String,
    context: Option<String>,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let outcome = app
            .tutor
            .create_inquiry_chat(&access, ctx, &topic, context, cancel)
            .await?;
        print_created(&outcome);
        Ok(())
    })
    .await
}

pub async fn new_guided(
    app: &App,
    ctx: &TenantContext,
    tutor_path: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let tutor: GuidedTutor = super::read_document(tutor_path)?;
    if tutor.objectives.is_empty() {
        anyhow::bail!(
            "tutor '{}' has no objectives; run `tutorgate tutor new` first",
            tutor.name
        );
    }

    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let outcome = app
            .tutor
            .create_guided_chat(&access, ctx, &tutor, cancel)
            .await?;
        print_created(&outcome);
        Ok(())
    })
    .await
}

fn print_created(outcome: &TurnOutcome) {
    eprintln!("chat: {}", outcome.session.id);
    print_reply(outcome);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Send one message, or open the interactive loop when `message` is `None`.
pub async fn say(
    app: &App,
    ctx: &TenantContext,
    chat_id: &str,
    message: Option<String>,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let chat = load_owned(app, ctx, chat_id).await?;
    match message {
        Some(text) => send(app, ctx, &chat.id, &text, cancel).await,
        None => repl(app, ctx, &chat, cancel).await,
    }
}

async fn send(
    app: &App,
    ctx: &TenantContext,
    chat_id: &str,
    text: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    with_access(&app.resolver, ctx, ResolveOptions::default(), move |access| async move {
        let outcome = app
            .tutor
            .run_turn(&access, chat_id, Some(text), cancel)
            .await?;
        print_reply(&outcome);
        Ok(())
    })
    .await
}

fn print_reply(outcome: &TurnOutcome) {
    if let Some(reply) = outcome.session.last_assistant_text() {
        println!("{reply}\n");
    }
    match &outcome.analysis {
        AnalysisOutcome::NotApplicable => {}
        AnalysisOutcome::Updated => {
            if let Some(analysis) = &outcome.session.analysis {
                eprintln!("\x1B[2m[progress: {}]\x1B[0m", analysis.summary);
            }
        }
        AnalysisOutcome::Skipped(e) => {
            eprintln!("\x1B[2m[progress not updated: {e}]\x1B[0m");
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interactive loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn repl(
    app: &App,
    ctx: &TenantContext,
    chat: &ChatSession,
    cancel: &CancellationToken,
) -> anyhow::Result<Guarded<()>> {
    let mut rl = rustyline::DefaultEditor::new()?;

    // Welcome goes to stderr so stdout holds only the conversation.
    eprintln!("tutorgate chat ({}: {})", chat.mode.as_str(), chat.topic);
    eprintln!("Chat: {}  |  Type /help for commands, Ctrl+D to exit", chat.id);
    eprintln!();
    print_transcript(chat);

    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(app, ctx, &chat.id, trimmed).await {
                        break;
                    }
                    continue;
                }

                match send(app, ctx, &chat.id, trimmed, cancel).await {
                    Ok(Guarded::Allowed(())) => {}
                    Ok(denied) => return Ok(denied),
                    Err(e) => {
                        eprintln!("\x1B[31merror: {e}\x1B[0m");
                        if cancel.is_cancelled() {
                            break;
                        }
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    eprintln!("Goodbye!");
    Ok(Guarded::Allowed(()))
}

/// Process a slash command. Returns `true` if the loop should exit.
async fn handle_slash_command(app: &App, ctx: &TenantContext, chat_id: &str, input: &str) -> bool {
    let cmd = input.split_whitespace().next().unwrap_or(input);
    match cmd {
        "/exit" | "/quit" => return true,

        "/progress" => match load_owned(app, ctx, chat_id).await {
            Ok(chat) => print_progress(&chat),
            Err(e) => eprintln!("\x1B[31merror: {e}\x1B[0m"),
        },

        "/clear" => {
            eprint!("\x1B[2J\x1B[1;1H");
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /progress        Show the latest progress analysis");
            eprintln!("  /clear           Clear the screen");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }
    false
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Read-only commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn show(app: &App, ctx: &TenantContext, chat_id: &str) -> anyhow::Result<()> {
    let chat = load_owned(app, ctx, chat_id).await?;
    println!("{} chat on {}", chat.mode.as_str(), chat.topic);
    println!();
    print_transcript(&chat);
    print_progress(&chat);
    Ok(())
}

pub async fn list(app: &App, ctx: &TenantContext, limit: usize) -> anyhow::Result<()> {
    let chats = app.tutor.store().list_for_user(&ctx.user_id, limit).await?;
    if chats.is_empty() {
        eprintln!("(no chats)");
    }
    for chat in chats {
        println!(
            "{}  {:<8} {:>3} turns  {}  {}",
            chat.id,
            chat.mode.as_str(),
            chat.user_turns(),
            chat.updated_at.format("%Y-%m-%d %H:%M"),
            chat.topic,
        );
    }
    Ok(())
}

/// Load a chat, hiding chats that belong to someone else.
async fn load_owned(app: &App, ctx: &TenantContext, chat_id: &str) -> anyhow::Result<ChatSession> {
    let chat = app.tutor.store().load(chat_id).await?;
    if chat.user_id != ctx.user_id && !ctx.is_admin {
        anyhow::bail!("not found: chat '{chat_id}'");
    }
    Ok(chat)
}

fn print_transcript(chat: &ChatSession) {
    for turn in &chat.messages {
        let who = match turn.role {
            Role::User => "you",
            Role::Assistant => "tutor",
            Role::System => continue,
        };
        println!("{who}> {}\n", turn.content);
    }
}

fn print_progress(chat: &ChatSession) {
    let Some(analysis) = &chat.analysis else {
        return;
    };
    println!("Progress: {}", analysis.summary);
    for item in &analysis.progress {
        println!("  - {} ({})", item.objective, item.status.as_str());
    }
}
