use rozgar_llm::{
    LlmProvider, ProviderError, ProviderMessage, ProviderStreamHandle, SessionId, StreamRequest,
    StreamTarget, TurnId,
};
use serde::Serialize;
use snafu::{ResultExt, Snafu, ensure};

/// Target languages accepted by `translate`, as (code, English name).
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("ru", "Russian"),
];

pub const TRANSLATOR_PREAMBLE: &str = "You are a professional translator specializing in job-related content. Translate the provided text accurately while maintaining professional tone and context. Consider cultural nuances and industry-specific terminology.";

pub const TRANSLATE_MAX_TOKENS: u64 = 1000;
pub const DEFAULT_CONTEXT: &str = "job-related";
pub const AUTO_DETECTED_SOURCE: &str = "auto-detected";

pub fn language_name(code: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

pub fn supported_codes() -> String {
    SUPPORTED_LANGUAGES
        .iter()
        .map(|(code, _)| *code)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TranslateError {
    #[snafu(display("{field} is required"))]
    MissingField {
        stage: &'static str,
        field: &'static str,
    },
    #[snafu(display("unsupported language '{code}', expected one of: {supported}"))]
    UnsupportedLanguage {
        stage: &'static str,
        code: String,
        supported: String,
    },
    #[snafu(display("translation request failed on `{stage}`: {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
    pub source_language: Option<String>,
    pub context: Option<String>,
}

impl TranslateRequest {
    pub fn new(text: impl Into<String>, target_language: impl AsRef<str>) -> Self {
        Self {
            text: text.into(),
            target_language: normalize_code(target_language.as_ref()),
            source_language: None,
            context: None,
        }
    }

    pub fn with_source_language(mut self, source_language: impl AsRef<str>) -> Self {
        let code = normalize_code(source_language.as_ref());
        self.source_language = Some(code).filter(|code| !code.is_empty());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into().trim().to_string();
        self.context = Some(context).filter(|context| !context.is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), TranslateError> {
        ensure!(
            !self.text.trim().is_empty(),
            MissingFieldSnafu {
                stage: "validate-translate-request",
                field: "text",
            }
        );
        ensure!(
            !self.target_language.is_empty(),
            MissingFieldSnafu {
                stage: "validate-translate-request",
                field: "target language",
            }
        );

        let requested = std::iter::once(self.target_language.as_str())
            .chain(self.source_language.as_deref());
        for code in requested {
            ensure!(
                language_name(code).is_some(),
                UnsupportedLanguageSnafu {
                    stage: "validate-translate-request",
                    code,
                    supported: supported_codes(),
                }
            );
        }
        Ok(())
    }

    pub fn context(&self) -> &str {
        self.context.as_deref().unwrap_or(DEFAULT_CONTEXT)
    }

    /// The user turn sent to the model. Call after `validate`.
    pub fn prompt(&self) -> String {
        let source = self
            .source_language
            .as_deref()
            .and_then(language_name)
            .unwrap_or("the source language");
        let target = language_name(&self.target_language).unwrap_or(self.target_language.as_str());

        format!(
            "Translate the following {} text from {source} to {target}:\n\n\"{}\"\n\nMaintain professional tone and ensure accuracy for job assistance context.",
            self.context(),
            self.text.trim()
        )
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub context: String,
}

/// Sends one translation exchange through `provider` and waits for the full reply.
pub async fn translate(
    provider: &dyn LlmProvider,
    model_id: Option<&str>,
    request: TranslateRequest,
) -> Result<Translation, TranslateError> {
    request.validate()?;

    let model_id = model_id
        .map(str::trim)
        .filter(|model_id| !model_id.is_empty())
        .unwrap_or_else(|| provider.default_model());
    let target = StreamTarget::new(
        SessionId::new(u64::from(std::process::id())),
        TurnId::new(1),
    );
    let stream_request =
        StreamRequest::new(target, model_id, vec![ProviderMessage::user(request.prompt())])
            .with_preamble(TRANSLATOR_PREAMBLE)
            .with_max_tokens(TRANSLATE_MAX_TOKENS)
            .with_tool_steps(1);

    let ProviderStreamHandle { mut stream, worker } = provider
        .stream_chat(stream_request)
        .context(ProviderSnafu {
            stage: "translate-start",
        })?;
    tokio::spawn(worker);

    let translated_text = stream
        .collect_text()
        .await
        .context(ProviderSnafu {
            stage: "translate-collect",
        })?
        .trim()
        .to_string();
    tracing::debug!(
        target_language = %request.target_language,
        provider_id = provider.id(),
        "translation finished"
    );

    let context = request.context().to_string();
    Ok(Translation {
        original_text: request.text,
        translated_text,
        source_language: request
            .source_language
            .unwrap_or_else(|| AUTO_DETECTED_SOURCE.to_string()),
        target_language: request.target_language,
        context,
    })
}
