use std::sync::Arc;

use rozgar_llm::{SessionId, ToolExecutor, create_provider, portal_tools};
use rozgar_storage::{JobFilter, JobPage, JobStore, SqliteStorage};
use serde_json::json;
use snafu::ResultExt;

use crate::accounts::{AccountService, RegisterInput, UserProfile};
use crate::chat::{ChatController, Language};
use crate::cli::{
    ChatArgs, Cli, Command, ConfigCommand, ConfigSetArgs, JobsArgs, LoginArgs, RegisterArgs,
    TranslateArgs,
};
use crate::error::{
    AccountSnafu, AppResult, EncodeOutputSnafu, ListJobsSnafu, NoProviderSnafu, OpenStorageSnafu,
    ProviderSnafu, SettingsSnafu, TranslateSnafu, WorkerSnafu,
};
use crate::settings::{AppSettings, SettingsStore};
use crate::terminal;
use crate::tools::PortalToolExecutor;
use crate::translate::{SUPPORTED_LANGUAGES, TranslateRequest, Translation, translate};

/// Runs one CLI invocation. A bare invocation starts the chat.
pub async fn run(cli: Cli) -> AppResult<()> {
    let settings = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::load(),
    };
    let database_location = cli
        .database
        .filter(|location| !location.trim().is_empty())
        .unwrap_or_else(|| settings.database_location());

    match cli.command.unwrap_or_else(|| Command::Chat(ChatArgs::default())) {
        Command::Chat(args) => run_chat(&settings, &database_location, args).await,
        Command::Jobs(args) => run_jobs(&database_location, args).await,
        Command::Register(args) => run_register(&database_location, args).await,
        Command::Login(args) => run_login(&database_location, args).await,
        Command::Translate(args) => run_translate(&settings, args).await,
        Command::Config(command) => run_config(&settings, command),
    }
}

async fn open_storage(location: &str) -> AppResult<Arc<SqliteStorage>> {
    let storage = SqliteStorage::open(location)
        .await
        .context(OpenStorageSnafu {
            stage: "open-sqlite-storage",
            location,
        })?;
    tracing::debug!(location, "job database ready");
    Ok(Arc::new(storage))
}

async fn run_chat(settings: &SettingsStore, database_location: &str, args: ChatArgs) -> AppResult<()> {
    let current = settings.settings();
    let storage = open_storage(database_location).await?;
    let executor: Arc<dyn ToolExecutor> = Arc::new(PortalToolExecutor::new(storage));

    let provider = match current.provider_config() {
        Some(config) => match create_provider(config, Some(executor)) {
            Ok(provider) => Some(provider),
            Err(error) => {
                tracing::error!(error = %error, "failed to create provider");
                eprintln!("Provider unavailable: {error}");
                None
            }
        },
        None => {
            tracing::warn!("no API key in settings or environment");
            None
        }
    };

    let tools = if args.no_tools { Vec::new() } else { portal_tools() };
    let mut options = current.request_options(tools);
    if let Some(model) = args.model.filter(|model| !model.trim().is_empty()) {
        options.model_id = Some(model);
    }
    let language = args
        .language
        .as_deref()
        .map(Language::from_code)
        .unwrap_or(current.language);

    let session_id = SessionId::new(u64::from(std::process::id()));
    tracing::info!(
        session_id = session_id.0,
        language = language.code(),
        provider_ready = provider.is_some(),
        "chat session started"
    );

    let mut controller = ChatController::new(session_id, language, provider, options);
    terminal::run_chat(&mut controller).await
}

fn job_filter(args: &JobsArgs) -> JobFilter {
    JobFilter::default()
        .with_keyword(args.keyword.as_str())
        .with_location(args.location.as_str())
        .with_job_type(args.job_type.as_str())
        .with_education(args.education.as_str())
        .with_page(args.page, args.limit)
}

async fn run_jobs(database_location: &str, args: JobsArgs) -> AppResult<()> {
    let storage = open_storage(database_location).await?;
    let filter = job_filter(&args);

    let page = tokio::task::spawn_blocking(move || storage.list_jobs(filter))
        .await
        .context(WorkerSnafu {
            stage: "list-jobs-join",
        })?
        .context(ListJobsSnafu {
            stage: "list-jobs",
        })?;

    if args.json {
        let encoded = serde_json::to_string_pretty(&job_page_json(&page)).context(
            EncodeOutputSnafu {
                stage: "encode-job-page",
            },
        )?;
        println!("{encoded}");
    } else {
        print!("{}", format_job_page(&page));
    }
    Ok(())
}

fn job_page_json(page: &JobPage) -> serde_json::Value {
    json!({
        "jobs": page.jobs,
        "pagination": {
            "page": page.page,
            "limit": page.limit,
            "total": page.total,
            "totalPages": page.total_pages,
            "hasNext": page.has_next,
            "hasPrev": page.has_prev,
        },
    })
}

fn format_job_page(page: &JobPage) -> String {
    if page.jobs.is_empty() {
        return "No jobs match these filters.\n".to_string();
    }

    let mut output = format!(
        "Page {} of {} ({} jobs)\n",
        page.page, page.total_pages, page.total
    );
    for job in &page.jobs {
        output.push_str(&format!(
            "\n{} at {}\n  {} | {} | {}\n  Salary: {}\n  Posted: {}\n",
            job.title,
            job.company,
            job.location,
            job.job_type,
            job.education,
            job.salary,
            job.posted_on
        ));
    }
    output
}

async fn run_register(database_location: &str, args: RegisterArgs) -> AppResult<()> {
    let storage = open_storage(database_location).await?;
    let service = AccountService::new(storage);

    let profile = service
        .register(RegisterInput {
            name: args.name,
            email: args.email,
            password: args.password,
            phone: args.phone,
            education: args.education,
            city: args.city,
        })
        .await
        .context(AccountSnafu {
            stage: "register-account",
        })?;

    println!("Registered {}", describe_profile(&profile));
    Ok(())
}

async fn run_login(database_location: &str, args: LoginArgs) -> AppResult<()> {
    let storage = open_storage(database_location).await?;
    let service = AccountService::new(storage);

    let profile = service
        .authenticate(&args.email, &args.password)
        .await
        .context(AccountSnafu {
            stage: "authenticate-account",
        })?;

    println!("Welcome back, {}", describe_profile(&profile));
    Ok(())
}

fn describe_profile(profile: &UserProfile) -> String {
    let mut description = format!("{} <{}>", profile.name, profile.email);
    if !profile.city.is_empty() {
        description.push_str(&format!(" from {}", profile.city));
    }
    description
}

async fn run_translate(settings: &SettingsStore, args: TranslateArgs) -> AppResult<()> {
    if args.languages {
        print!("{}", format_languages());
        return Ok(());
    }

    let request = translate_request(args.text, args.to, args.from, args.context);
    request.validate().context(TranslateSnafu {
        stage: "validate-translate-request",
    })?;

    let current = settings.settings();
    let Some(config) = current.provider_config() else {
        return NoProviderSnafu {
            stage: "translate-provider",
        }
        .fail();
    };
    let provider = create_provider(config, None).context(ProviderSnafu {
        stage: "translate-provider",
    })?;
    let model = args
        .model
        .or_else(|| Some(current.model.clone()))
        .filter(|model| !model.trim().is_empty());

    let translation = translate(provider.as_ref(), model.as_deref(), request)
        .await
        .context(TranslateSnafu {
            stage: "translate",
        })?;

    if args.json {
        let encoded = serde_json::to_string_pretty(&translation).context(EncodeOutputSnafu {
            stage: "encode-translation",
        })?;
        println!("{encoded}");
    } else {
        println!("{}", format_translation(&translation));
    }
    Ok(())
}

fn translate_request(
    text: Option<String>,
    to: Option<String>,
    from: Option<String>,
    context: Option<String>,
) -> TranslateRequest {
    let mut request = TranslateRequest::new(text.unwrap_or_default(), to.unwrap_or_default());
    if let Some(from) = from {
        request = request.with_source_language(from);
    }
    if let Some(context) = context {
        request = request.with_context(context);
    }
    request
}

fn format_languages() -> String {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, name)| format!("{code}  {name}\n"))
        .collect()
}

fn format_translation(translation: &Translation) -> String {
    format!(
        "{}\n\n({} -> {}, {})",
        translation.translated_text,
        translation.source_language,
        translation.target_language,
        translation.context
    )
}

fn run_config(settings: &SettingsStore, command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Path => {
            println!("{}", settings.config_path().display());
        }
        ConfigCommand::Show => {
            let redacted = settings.settings().redacted();
            let encoded = serde_json::to_string_pretty(&redacted).context(EncodeOutputSnafu {
                stage: "encode-settings",
            })?;
            println!("{encoded}");
        }
        ConfigCommand::Set(args) => {
            let updated = apply_settings_changes((*settings.file_settings()).clone(), args);
            settings.update(updated).context(SettingsSnafu {
                stage: "update-settings",
            })?;
            println!("Saved settings to {}", settings.config_path().display());
        }
    }
    Ok(())
}

fn apply_settings_changes(mut settings: AppSettings, args: ConfigSetArgs) -> AppSettings {
    if let Some(provider_id) = args.provider {
        settings.provider_id = provider_id;
    }
    if let Some(api_key) = args.api_key {
        settings.api_key = api_key;
    }
    if let Some(endpoint) = args.endpoint {
        settings.endpoint = endpoint;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }
    if let Some(temperature) = args.temperature {
        settings.temperature = Some(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        settings.max_tokens = Some(max_tokens);
    }
    if let Some(language) = args.language {
        settings.language = Language::from_code(&language);
    }
    if let Some(database_path) = args.database_path {
        settings.database_path = database_path;
    }
    settings
}
