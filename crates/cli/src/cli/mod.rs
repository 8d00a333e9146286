pub mod chat;
pub mod config;
pub mod help;
pub mod tutor;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use tg_domain::config::Config;
use tg_domain::tenant::{AuthProviderKind, ClassRole, TenantContext};

/// tutorgate: LLM-backed programming help and tutoring.
#[derive(Debug, Parser)]
#[command(name = "tutorgate", version, about, disable_help_subcommand = true)]
pub struct Cli {
    #[command(flatten)]
    pub tenant: TenantArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask for help with code, an error message or an issue.
    Help(help::HelpArgs),
    /// Extract the concepts a saved help query touched on.
    Topics {
        /// A query record written by `help --json`.
        record: PathBuf,
    },
    /// Tutoring chats.
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Author guided tutors.
    #[command(subcommand)]
    Tutor(TutorCommand),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ChatCommand {
    /// Start an open-ended chat on a topic.
    NewInquiry {
        topic: String,
        /// Extra learning context for the tutor.
        #[arg(long)]
        context: Option<String>,
    },
    /// Start a chat that follows a guided tutor's objectives.
    NewGuided {
        /// Guided tutor definition (`.toml` or `.json`).
        tutor: PathBuf,
    },
    /// Send a message to a chat. Without a message, opens an interactive
    /// session.
    Say {
        chat_id: String,
        message: Option<String>,
    },
    /// Print a chat's transcript and progress.
    Show { chat_id: String },
    /// List your most recent chats.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum TutorCommand {
    /// Generate objectives and questions for a new guided tutor and write
    /// its definition to a file.
    New {
        /// Short identifier for the tutor.
        name: String,
        topic: String,
        #[arg(long, default_value = "")]
        context: String,
        /// Reference document to include in the setup prompts.
        #[arg(long)]
        document: Option<PathBuf>,
        /// Objective count (defaults to `tutor.objectives`).
        #[arg(long)]
        objectives: Option<usize>,
        /// Questions per objective (defaults to `tutor.questions_per_objective`).
        #[arg(long)]
        questions: Option<usize>,
        /// Output path (`.toml` or `.json`).
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Regenerate the questions of an existing tutor definition in place.
    Questions {
        tutor: PathBuf,
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tenant flags
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who is acting, given on the command line.
#[derive(Debug, Clone, Args)]
pub struct TenantArgs {
    #[arg(long, global = true, default_value = "local")]
    pub user: String,
    /// Active class id.
    #[arg(long, global = true)]
    pub class: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = AuthArg::Local)]
    pub auth: AuthArg,
    /// Role inside `--class`.
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::Student)]
    pub role: RoleArg,
    #[arg(long, global = true)]
    pub admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthArg {
    Local,
    Demo,
    ExternalAnonymous,
    ExternalIdentified,
    Lti,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Student,
    Instructor,
}

impl From<AuthArg> for AuthProviderKind {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Local => AuthProviderKind::Local,
            AuthArg::Demo => AuthProviderKind::Demo,
            AuthArg::ExternalAnonymous => AuthProviderKind::ExternalAnonymous,
            AuthArg::ExternalIdentified => AuthProviderKind::ExternalIdentified,
            AuthArg::Lti => AuthProviderKind::Lti,
        }
    }
}

impl From<RoleArg> for ClassRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Student => ClassRole::Student,
            RoleArg::Instructor => ClassRole::Instructor,
        }
    }
}

impl TenantArgs {
    pub fn context(&self) -> TenantContext {
        let mut ctx = TenantContext::user(self.user.clone(), self.auth.into());
        ctx.is_admin = self.admin;
        match &self.class {
            Some(class_id) => ctx.in_class(class_id.clone(), self.role.into()),
            None => ctx,
        }
    }
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `TG_CONFIG` (or `config.toml`).
/// A missing file yields the defaults. Returns the config and the path used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("TG_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}

// ── Document helpers ─────────────────────────────────────────────────

/// Read a TOML or JSON document, chosen by file extension (TOML otherwise).
pub fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    if is_json(path) {
        serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
    } else {
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
    }
}

pub fn write_document<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let raw = if is_json(path) {
        serde_json::to_string_pretty(value)?
    } else {
        toml::to_string_pretty(value)?
    };
    std::fs::write(path, raw).map_err(|e| anyhow::anyhow!("writing {}: {e}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_flags_build_a_class_context() {
        let cli = Cli::parse_from([
            "tutorgate", "--user", "stu-1", "--auth", "lti", "--class", "cs1", "version",
        ]);
        let ctx = cli.tenant.context();
        assert_eq!(ctx.user_id, "stu-1");
        assert_eq!(ctx.auth_provider, AuthProviderKind::Lti);
        assert_eq!(ctx.class_id.as_deref(), Some("cs1"));
        assert!(ctx.is_student());
    }

    #[test]
    fn role_is_ignored_without_a_class() {
        let cli = Cli::parse_from(["tutorgate", "--role", "instructor", "version"]);
        let ctx = cli.tenant.context();
        assert_eq!(ctx.class_id, None);
        assert_eq!(ctx.role, None);
        assert_eq!(ctx.auth_provider, AuthProviderKind::Local);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "tutorgate", "chat", "say", "abc", "hello", "--user", "u2", "--auth", "demo",
        ]);
        assert_eq!(cli.tenant.user, "u2");
        assert_eq!(cli.tenant.auth, AuthArg::Demo);
        match cli.command {
            Command::Chat(ChatCommand::Say { chat_id, message }) => {
                assert_eq!(chat_id, "abc");
                assert_eq!(message.as_deref(), Some("hello"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.help.candidates, 2);
    }

    #[test]
    fn documents_round_trip_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let tutor = tg_engine::tutor::GuidedTutor::new("loops", "Loops", "week 3");
        for name in ["t.toml", "t.json"] {
            let path = dir.path().join(name);
            write_document(&path, &tutor).unwrap();
            let back: tg_engine::tutor::GuidedTutor = read_document(&path).unwrap();
            assert_eq!(back, tutor);
        }
    }
}
