use rozgar_llm::ProviderError;
use rozgar_storage::StorageError;
use snafu::Snafu;

use crate::accounts::AccountError;
use crate::settings::SettingsError;
use crate::translate::TranslateError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("failed to open job database at '{location}'"))]
    OpenStorage {
        stage: &'static str,
        location: String,
        source: StorageError,
    },
    #[snafu(display("job listing failed on `{stage}`"))]
    ListJobs {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("settings update failed on `{stage}`"))]
    Settings {
        stage: &'static str,
        source: SettingsError,
    },
    #[snafu(display("account request failed"))]
    Account {
        stage: &'static str,
        source: AccountError,
    },
    #[snafu(display("no API key in settings or environment"))]
    NoProvider { stage: &'static str },
    #[snafu(display("provider setup failed on `{stage}`"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("translation failed"))]
    Translate {
        stage: &'static str,
        source: TranslateError,
    },
    #[snafu(display("background task failed on `{stage}`"))]
    Worker {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
    #[snafu(display("terminal i/o failed on `{stage}`"))]
    Terminal {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("failed to encode output on `{stage}`"))]
    EncodeOutput {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("invalid log filter '{directive}'"))]
    LogFilter {
        stage: &'static str,
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },
}

pub type AppResult<T> = Result<T, AppError>;
