use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rozgar",
    version,
    about = "Job assistance chat for the Punjab employment portal"
)]
pub struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path, overriding settings
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Log filter directive when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat with the job assistant (default)
    Chat(ChatArgs),
    /// Search job listings
    Jobs(JobsArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Check account credentials
    Login(LoginArgs),
    /// Translate job-related text with the configured model
    Translate(TranslateArgs),
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Conversation language: en, hi or pa
    #[arg(long)]
    pub language: Option<String>,

    /// Model id, overriding settings
    #[arg(long)]
    pub model: Option<String>,

    /// Do not offer job tools to the model
    #[arg(long)]
    pub no_tools: bool,
}

#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Matches title, company or requirements
    #[arg(long, default_value = "")]
    pub keyword: String,

    #[arg(long, default_value = "")]
    pub location: String,

    /// Job type such as Full-time or Part-time
    #[arg(long = "type", default_value = "")]
    pub job_type: String,

    /// Education level such as 10th, 12th or Graduate
    #[arg(long, default_value = "")]
    pub education: String,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = rozgar_storage::DEFAULT_JOB_PAGE_LIMIT)]
    pub limit: u32,

    /// Print the page as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    /// Read from ROZGAR_PASSWORD when omitted
    #[arg(long, env = "ROZGAR_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long)]
    pub education: String,

    #[arg(long, default_value = "")]
    pub phone: String,

    #[arg(long, default_value = "")]
    pub city: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Read from ROZGAR_PASSWORD when omitted
    #[arg(long, env = "ROZGAR_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args, Debug, Default)]
pub struct TranslateArgs {
    /// Text to translate
    #[arg(required_unless_present = "languages")]
    pub text: Option<String>,

    /// Target language code
    #[arg(long, required_unless_present = "languages")]
    pub to: Option<String>,

    /// Source language code, detected when omitted
    #[arg(long)]
    pub from: Option<String>,

    /// Kind of text, such as "job description" or "resume"
    #[arg(long)]
    pub context: Option<String>,

    /// Model id, overriding settings
    #[arg(long)]
    pub model: Option<String>,

    /// List supported language codes and exit
    #[arg(long)]
    pub languages: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print effective settings with the API key redacted
    Show,
    /// Update persisted settings
    Set(ConfigSetArgs),
    /// Print the settings file location
    Path,
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// groq, openai or openai-compatible
    #[arg(long)]
    pub provider: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u64>,

    #[arg(long)]
    pub language: Option<String>,

    #[arg(long)]
    pub database_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["rozgar"]);

        assert!(matches!(cli, Ok(Cli { command: None, .. })));
    }

    #[test]
    fn jobs_filters_parse() {
        let cli = Cli::try_parse_from([
            "rozgar",
            "jobs",
            "--keyword",
            "clerk",
            "--type",
            "Full-time",
            "--limit",
            "3",
        ]);

        let Ok(Cli {
            command: Some(Command::Jobs(args)),
            ..
        }) = cli
        else {
            panic!("jobs subcommand should parse");
        };
        assert_eq!(args.keyword, "clerk");
        assert_eq!(args.job_type, "Full-time");
        assert_eq!(args.page, 1);
        assert_eq!(args.limit, 3);
    }

    #[test]
    fn config_set_parses_optional_fields() {
        let cli = Cli::try_parse_from(["rozgar", "config", "set", "--language", "pa"]);

        let Ok(Cli {
            command: Some(Command::Config(ConfigCommand::Set(args))),
            ..
        }) = cli
        else {
            panic!("config set should parse");
        };
        assert_eq!(args.language.as_deref(), Some("pa"));
        assert!(args.api_key.is_none());
    }

    #[test]
    fn translate_needs_text_and_target_unless_listing() {
        let listing = Cli::try_parse_from(["rozgar", "translate", "--languages"]);
        let missing_target = Cli::try_parse_from(["rozgar", "translate", "Junior Clerk"]);
        let full = Cli::try_parse_from([
            "rozgar",
            "translate",
            "Junior Clerk",
            "--to",
            "hi",
            "--context",
            "job title",
        ]);

        assert!(matches!(
            listing,
            Ok(Cli {
                command: Some(Command::Translate(TranslateArgs { languages: true, .. })),
                ..
            })
        ));
        assert!(missing_target.is_err());
        let Ok(Cli {
            command: Some(Command::Translate(args)),
            ..
        }) = full
        else {
            panic!("translate should parse");
        };
        assert_eq!(args.text.as_deref(), Some("Junior Clerk"));
        assert_eq!(args.to.as_deref(), Some("hi"));
        assert_eq!(args.context.as_deref(), Some("job title"));
        assert!(args.from.is_none());
    }
}
