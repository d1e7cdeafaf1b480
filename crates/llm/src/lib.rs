use std::sync::Arc;

mod events;
mod provider;
mod rig_adapter;
mod tools;

pub use events::{
    Role, SessionId, StreamEventMapped, StreamEventPayload, StreamTarget, ToolInvocation, TurnId,
};
pub use provider::{
    BoxFuture, DEFAULT_TOOL_STEPS, LlmProvider, ProviderConfig, ProviderError,
    ProviderEventStream, ProviderMessage, ProviderResult, ProviderStreamHandle, ProviderWorker,
    StreamRequest, TOOL_FOLLOW_UP_PROMPT, make_event_stream,
};
pub use rig_adapter::{
    ApiFlavor, DEFAULT_GROQ_ENDPOINT, DEFAULT_GROQ_MODEL, DEFAULT_OPENAI_ENDPOINT,
    DEFAULT_OPENAI_MODEL, RIG_COMPATIBLE_PROVIDER_ID, RIG_GROQ_PROVIDER_ID,
    RIG_OPENAI_PROVIDER_ID, RigProviderAdapter,
};
pub use tools::{
    ExecutionFailedSnafu, INTERVIEW_PREP_TOOL, InvalidArgumentsSnafu, JOB_SEARCH_TOOL,
    RESUME_ANALYSIS_TOOL, ToolError, ToolExecutor, ToolResult, ToolSchema, UnknownToolSnafu,
    portal_tools,
};

pub fn create_provider(
    mut config: ProviderConfig,
    executor: Option<Arc<dyn ToolExecutor>>,
) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_GROQ_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" => {
            config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
            if config.endpoint.is_empty() {
                config.endpoint = DEFAULT_OPENAI_ENDPOINT.to_string();
            }
            Ok(Arc::new(RigProviderAdapter::new(
                config,
                ApiFlavor::Responses,
                executor,
            )?))
        }
        "groq" => {
            if config.endpoint.is_empty() {
                config.endpoint = DEFAULT_GROQ_ENDPOINT.to_string();
            }
            Ok(Arc::new(RigProviderAdapter::new(
                config,
                ApiFlavor::ChatCompletions,
                executor,
            )?))
        }
        "openai-compatible" => Ok(Arc::new(RigProviderAdapter::new(
            config,
            ApiFlavor::ChatCompletions,
            executor,
        )?)),
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
