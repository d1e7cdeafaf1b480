use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use rozgar_llm::{
    ProviderConfig, RIG_GROQ_PROVIDER_ID, RIG_OPENAI_PROVIDER_ID, ToolSchema,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::{Language, RequestOptions};

pub const DEFAULT_PROVIDER_ID: &str = RIG_GROQ_PROVIDER_ID;
pub const SETTINGS_DIRECTORY_NAME: &str = "rozgar";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DATABASE_FILE_NAME: &str = "rozgar.db";
pub const ENV_PREFIX: &str = "ROZGAR_";
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    /// Blank means the provider's default endpoint.
    #[serde(default)]
    pub endpoint: String,
    /// Blank means the provider's default model.
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub language: Language,
    /// Blank means `rozgar.db` next to the settings file.
    #[serde(default)]
    pub database_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: String::new(),
            model: String::new(),
            temperature: None,
            max_tokens: None,
            language: Language::En,
            database_path: String::new(),
        }
    }
}

impl AppSettings {
    /// Provider config from settings, falling back to `GROQ_API_KEY` and
    /// then `OPENAI_API_KEY` from the process environment.
    pub fn provider_config(&self) -> Option<ProviderConfig> {
        self.provider_config_with(|name| std::env::var(name).ok())
    }

    pub fn provider_config_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Option<ProviderConfig> {
        if !self.api_key.trim().is_empty() {
            return Some(ProviderConfig::new(
                &self.provider_id,
                &self.api_key,
                &self.endpoint,
            ));
        }

        let env_value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(api_key) = env_value(GROQ_API_KEY_ENV) {
            tracing::debug!("using {GROQ_API_KEY_ENV} from environment");
            return Some(ProviderConfig::new(RIG_GROQ_PROVIDER_ID, api_key, ""));
        }

        if let Some(api_key) = env_value(OPENAI_API_KEY_ENV) {
            tracing::debug!("using {OPENAI_API_KEY_ENV} from environment");
            let endpoint = env_value(OPENAI_BASE_URL_ENV).unwrap_or_default();
            return Some(ProviderConfig::new(RIG_OPENAI_PROVIDER_ID, api_key, endpoint));
        }

        None
    }

    pub fn request_options(&self, tools: Vec<ToolSchema>) -> RequestOptions {
        RequestOptions {
            model_id: Some(self.model.clone()).filter(|model| !model.is_empty()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    /// Copy safe to print: the API key keeps only its last four characters.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if !redacted.api_key.is_empty() {
            let visible = redacted
                .api_key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<String>();
            redacted.api_key = format!("****{visible}");
        }
        redacted
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = if self.provider_id.trim().is_empty() {
            default_provider_id()
        } else {
            self.provider_id.trim().to_string()
        };
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();
        self.model = self.model.trim().to_string();
        self.database_path = self.database_path.trim().to_string();
        self
    }
}

/// Settings file plus process overrides.
///
/// The file layer is what `update` edits and persists. Overrides (the
/// `ROZGAR_*` environment by default) sit on top of it in `settings()` and
/// never reach the file.
pub struct SettingsStore {
    file_settings: Arc<ArcSwap<AppSettings>>,
    settings: Arc<ArcSwap<AppSettings>>,
    overrides: Figment,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".rozgar"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads defaults, then the JSON file, then `ROZGAR_*` environment overrides.
    pub fn new(config_path: PathBuf) -> Self {
        Self::with_env(config_path, Env::prefixed(ENV_PREFIX))
    }

    pub fn with_env(config_path: PathBuf, env: Env) -> Self {
        Self::with_overrides(config_path, Figment::from(env))
    }

    pub fn with_overrides(config_path: PathBuf, overrides: Figment) -> Self {
        let file_settings = Self::load_file(&config_path);
        let settings = Self::apply_overrides(&file_settings, &overrides);
        Self {
            file_settings: Arc::new(ArcSwap::from_pointee(file_settings)),
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            overrides,
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    /// Effective settings, overrides included.
    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    /// Settings as stored in the file, without overrides.
    pub fn file_settings(&self) -> Arc<AppSettings> {
        self.file_settings.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn database_location(&self) -> String {
        let settings = self.settings();
        if !settings.database_path.is_empty() {
            return settings.database_path.clone();
        }

        self.config_path
            .parent()
            .map(|parent| parent.join(DATABASE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
            .display()
            .to_string()
    }

    /// Replaces the file layer, writes it out and re-applies overrides.
    pub fn update(&self, file_settings: AppSettings) -> Result<(), SettingsError> {
        let file_settings = file_settings.normalized();
        self.persist(&file_settings)?;
        let settings = Self::apply_overrides(&file_settings, &self.overrides);
        self.file_settings.store(Arc::new(file_settings));
        self.settings.store(Arc::new(settings));
        Ok(())
    }

    fn load_file(path: &Path) -> AppSettings {
        let mut figment = Figment::from(Serialized::defaults(AppSettings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        match figment.extract::<AppSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AppSettings::default()
            }
        }
    }

    fn apply_overrides(file_settings: &AppSettings, overrides: &Figment) -> AppSettings {
        let merged = Figment::from(Serialized::defaults(file_settings.clone()))
            .merge(overrides.clone())
            .extract::<AppSettings>();
        match merged {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!("ignoring invalid settings overrides: {}", error);
                file_settings.clone()
            }
        }
    }

    fn persist(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn default_provider_id() -> String {
    DEFAULT_PROVIDER_ID.to_string()
}
