use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tg_cli::bootstrap;
use tg_cli::cli::{self, ChatCommand, Cli, Command, ConfigCommand, TutorCommand};
use tg_cli::guard::Guarded;
use tg_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        Command::Version => {
            println!("tutorgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        command => {
            let (config, _) = cli::load_config()?;
            init_tracing(&config.observability);
            let app = bootstrap::build_app(Arc::new(config)).await?;
            let ctx = args.tenant.context();

            // Ctrl+C cancels whatever model call is in flight.
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let outcome = match command {
                Command::Help(args) => cli::help::run(&app, &ctx, args, &cancel).await?,
                Command::Topics { record } => cli::help::topics(&app, &ctx, &record, &cancel).await?,
                Command::Chat(ChatCommand::NewInquiry { topic, context }) => {
                    cli::chat::new_inquiry(&app, &ctx, topic, context, &cancel).await?
                }
                Command::Chat(ChatCommand::NewGuided { tutor }) => {
                    cli::chat::new_guided(&app, &ctx, &tutor, &cancel).await?
                }
                Command::Chat(ChatCommand::Say { chat_id, message }) => {
                    cli::chat::say(&app, &ctx, &chat_id, message, &cancel).await?
                }
                Command::Chat(ChatCommand::Show { chat_id }) => {
                    cli::chat::show(&app, &ctx, &chat_id).await?;
                    Guarded::Allowed(())
                }
                Command::Chat(ChatCommand::List { limit }) => {
                    cli::chat::list(&app, &ctx, limit).await?;
                    Guarded::Allowed(())
                }
                Command::Tutor(TutorCommand::New {
                    name,
                    topic,
                    context,
                    document,
                    objectives,
                    questions,
                    out,
                }) => {
                    let opts = cli::tutor::NewTutor {
                        name,
                        topic,
                        context,
                        document,
                        objectives,
                        questions,
                        out,
                    };
                    cli::tutor::new_tutor(&app, &ctx, opts, &cancel).await?
                }
                Command::Tutor(TutorCommand::Questions { tutor, count }) => {
                    cli::tutor::regenerate_questions(&app, &ctx, &tutor, count, &cancel).await?
                }
                // Handled before bootstrap.
                Command::Version | Command::Config(_) => Guarded::Allowed(()),
            };

            if let Guarded::Denied(denied) = outcome {
                println!("{}", denied.user_message());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

/// Logs go to stderr; stdout carries only command output.
///
/// `RUST_LOG` overrides `observability.log_filter`.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    if obs.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}
