use std::sync::Arc;

use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage, ToolDefinition};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::{StreamedAssistantContent, StreamingCompletionResponse};
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use crate::events::{Role, StreamEventMapped, StreamEventPayload, StreamTarget, ToolInvocation};
use crate::provider::{
    CompletionsFailedSnafu, EmptyMessageSetSnafu, HttpClientSnafu, LlmProvider,
    MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderMessage, ProviderResult,
    ProviderStreamHandle, ProviderWorker, StreamRequest, make_event_stream,
};
use crate::tools::{ToolExecutor, ToolSchema};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";
pub const RIG_GROQ_PROVIDER_ID: &str = "groq";
pub const RIG_COMPATIBLE_PROVIDER_ID: &str = "openai-compatible";

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Which OpenAI wire dialect the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// OpenAI Responses API.
    Responses,
    /// Classic chat completions, spoken by Groq and most compatible gateways.
    ChatCompletions,
}

enum MappedItem {
    Event(StreamEventPayload),
    ToolCall { tool_name: String, arguments: Value },
}

enum RoundOutcome {
    /// The round's stream ended cleanly.
    Finished {
        text: String,
        invocations: Vec<ToolInvocation>,
    },
    /// Cancelled, failed, or nobody is listening; the worker stops.
    Stopped,
}

pub struct RigProviderAdapter {
    config: ProviderConfig,
    flavor: ApiFlavor,
    executor: Option<Arc<dyn ToolExecutor>>,
}

impl RigProviderAdapter {
    pub fn new(
        config: ProviderConfig,
        flavor: ApiFlavor,
        executor: Option<Arc<dyn ToolExecutor>>,
    ) -> ProviderResult<Self> {
        ensure!(
            config.has_api_key(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self {
            config,
            flavor,
            executor,
        })
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.flavor
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(message: &ProviderMessage) -> Option<RigMessage> {
        match message.role {
            Role::System => None,
            Role::User => Some(RigMessage::user(message.content.clone())),
            Role::Assistant => Some(RigMessage::assistant(message.content.clone())),
        }
    }

    fn merged_preamble(request: &StreamRequest) -> Option<String> {
        let mut preamble_parts = Vec::new();

        if let Some(preamble) = &request.preamble
            && !preamble.trim().is_empty()
        {
            preamble_parts.push(preamble.clone());
        }

        // Rig exposes a single preamble field, so system-role messages are folded into it.
        for message in &request.messages {
            if matches!(message.role, Role::System) && !message.content.trim().is_empty() {
                preamble_parts.push(message.content.clone());
            }
        }

        if preamble_parts.is_empty() {
            None
        } else {
            Some(preamble_parts.join("\n\n"))
        }
    }

    fn to_tool_definition(schema: &ToolSchema) -> ToolDefinition {
        ToolDefinition {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters.clone(),
        }
    }

    async fn open_stream<M>(
        model: M,
        request: &StreamRequest,
    ) -> ProviderResult<StreamingCompletionResponse<M::StreamingResponse>>
    where
        M: CompletionModel,
    {
        let mut messages = request
            .messages
            .iter()
            .filter_map(Self::to_rig_message)
            .collect::<Vec<_>>();

        let Some(prompt) = messages.pop() else {
            tracing::warn!(
                stream_target = ?request.target,
                model_id = %request.model_id,
                total_message_count = request.messages.len(),
                "cannot open stream because no user/assistant messages remain after filtering"
            );
            return EmptyMessageSetSnafu {
                stage: "open-stream-pop-prompt",
                target: request.target,
            }
            .fail();
        };
        let mut builder = model.completion_request(prompt).messages(messages);

        if let Some(preamble) = Self::merged_preamble(request) {
            builder = builder.preamble(preamble);
        }

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        if !request.tools.is_empty() {
            builder = builder.tools(request.tools.iter().map(Self::to_tool_definition).collect());
        }

        builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        target: StreamTarget,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEventMapped::new(
            target,
            StreamEventPayload::Error(error.to_string()),
        ));
    }

    fn text_delta(text: String) -> Option<StreamEventPayload> {
        if text.is_empty() {
            return None;
        }
        Some(StreamEventPayload::Delta(text))
    }

    fn map_stream_item<R>(item: StreamedAssistantContent<R>) -> Option<MappedItem>
    where
        R: Clone + Unpin,
    {
        match item {
            StreamedAssistantContent::Text(text) => Self::text_delta(text.text).map(MappedItem::Event),
            StreamedAssistantContent::ToolCall { tool_call, .. } => Some(MappedItem::ToolCall {
                tool_name: tool_call.function.name,
                arguments: tool_call.function.arguments,
            }),
            // Reasoning is not part of the transcript.
            StreamedAssistantContent::Reasoning(_)
            | StreamedAssistantContent::ReasoningDelta { .. }
            | StreamedAssistantContent::ToolCallDelta { .. }
            | StreamedAssistantContent::Final(_) => None,
        }
    }

    async fn resolve_tool_call(
        executor: Option<&Arc<dyn ToolExecutor>>,
        target: StreamTarget,
        tool_name: String,
        arguments: Value,
    ) -> Option<ToolInvocation> {
        let Some(executor) = executor else {
            // Without an executor the model's arguments are the structured payload.
            return Some(ToolInvocation::new(tool_name, arguments));
        };

        match executor.execute(&tool_name, arguments).await {
            Ok(result) => Some(ToolInvocation::new(tool_name, result)),
            Err(error) => {
                tracing::warn!(
                    stream_target = ?target,
                    tool_name = %tool_name,
                    error = %error,
                    "tool execution failed; dropping invocation"
                );
                None
            }
        }
    }

    /// Streams one completion round and forwards its events.
    async fn drive_round<M>(
        model: M,
        round: &StreamRequest,
        executor: Option<&Arc<dyn ToolExecutor>>,
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> RoundOutcome
    where
        M: CompletionModel,
    {
        let target = round.target;
        let mut stream = match Self::open_stream(model, round).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    stream_target = ?target,
                    model_id = %round.model_id,
                    error = %error,
                    "failed to open provider stream"
                );
                Self::emit_error_event(event_tx, target, error);
                return RoundOutcome::Stopped;
            }
        };

        let mut text = String::new();
        let mut invocations = Vec::new();

        loop {
            tokio::select! {
                _ = &mut *cancel_rx => {
                    tracing::debug!(stream_target = ?target, "provider stream cancelled");
                    stream.cancel();
                    return RoundOutcome::Stopped;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            let payload = match Self::map_stream_item(item) {
                                Some(MappedItem::Event(payload)) => payload,
                                Some(MappedItem::ToolCall { tool_name, arguments }) => {
                                    let Some(invocation) = Self::resolve_tool_call(
                                        executor,
                                        target,
                                        tool_name,
                                        arguments,
                                    )
                                    .await
                                    else {
                                        continue;
                                    };
                                    invocations.push(invocation.clone());
                                    StreamEventPayload::ToolInvocation(invocation)
                                }
                                None => continue,
                            };

                            if let StreamEventPayload::Delta(fragment) = &payload {
                                text.push_str(fragment);
                            }
                            if event_tx.send(StreamEventMapped::new(target, payload)).is_err() {
                                return RoundOutcome::Stopped;
                            }
                        }
                        Some(Err(source)) => {
                            tracing::warn!(
                                stream_target = ?target,
                                error = %source,
                                "provider stream emitted an error chunk"
                            );
                            let error = ProviderError::CompletionsFailed {
                                stage: "stream-chunk",
                                source,
                            };
                            Self::emit_error_event(event_tx, target, error);
                            return RoundOutcome::Stopped;
                        }
                        None => return RoundOutcome::Finished { text, invocations },
                    }
                }
            }
        }
    }

    /// Runs rounds until one ends without tool calls or the round budget is
    /// spent, then emits `Done`.
    async fn drive_stream<M>(
        model: M,
        request: StreamRequest,
        executor: Option<Arc<dyn ToolExecutor>>,
        event_tx: mpsc::UnboundedSender<StreamEventMapped>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) where
        M: CompletionModel,
    {
        let target = request.target;
        let mut round = request;

        loop {
            let outcome = Self::drive_round(
                model.clone(),
                &round,
                executor.as_ref(),
                &event_tx,
                &mut cancel_rx,
            )
            .await;
            let RoundOutcome::Finished { text, invocations } = outcome else {
                return;
            };

            let Some(next) = round.follow_up(&text, &invocations) else {
                break;
            };
            tracing::debug!(
                stream_target = ?target,
                tool_count = invocations.len(),
                rounds_left = next.tool_steps,
                "sending tool results back to the model"
            );
            round = next;
        }

        let _ = event_tx.send(StreamEventMapped::new(target, StreamEventPayload::Done));
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        flavor: ApiFlavor,
        request: StreamRequest,
        executor: Option<Arc<dyn ToolExecutor>>,
        event_tx: mpsc::UnboundedSender<StreamEventMapped>,
        cancel_rx: oneshot::Receiver<()>,
    ) {
        let target = request.target;
        let client = match Self::build_client(&config) {
            Ok(client) => client,
            Err(error) => {
                tracing::error!(
                    stream_target = ?target,
                    provider_id = %config.provider_id,
                    error = %error,
                    "failed to build provider client"
                );
                Self::emit_error_event(&event_tx, target, error);
                return;
            }
        };

        tracing::debug!(
            stream_target = ?target,
            provider_id = %config.provider_id,
            model_id = %request.model_id,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "opening provider stream"
        );

        match flavor {
            ApiFlavor::Responses => {
                let model = client.completion_model(request.model_id.clone());
                Self::drive_stream(model, request, executor, event_tx, cancel_rx).await;
            }
            ApiFlavor::ChatCompletions => {
                let model = client
                    .completions_api()
                    .completion_model(request.model_id.clone());
                Self::drive_stream(model, request, executor, event_tx, cancel_rx).await;
            }
        }
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        match self.flavor {
            ApiFlavor::Responses => "Rig OpenAI",
            ApiFlavor::ChatCompletions => "Rig OpenAI-compatible",
        }
    }

    fn default_model(&self) -> &str {
        match self.flavor {
            ApiFlavor::Responses => DEFAULT_OPENAI_MODEL,
            ApiFlavor::ChatCompletions => DEFAULT_GROQ_MODEL,
        }
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.messages.is_empty(),
            EmptyMessageSetSnafu {
                stage: "stream-chat",
                target: request.target,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.target);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            self.flavor,
            request,
            self.executor.clone(),
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::events::{SessionId, TurnId};
    use crate::provider::BoxFuture;
    use crate::tools::{ToolError, ToolResult};

    fn request(messages: Vec<ProviderMessage>) -> StreamRequest {
        StreamRequest::new(
            target(),
            DEFAULT_GROQ_MODEL,
            messages,
        )
    }

    #[test]
    fn preamble_merges_request_preamble_and_system_messages() {
        let request = request(vec![
            ProviderMessage::new(Role::System, "Answer in Punjabi."),
            ProviderMessage::new(Role::User, "hello"),
        ])
        .with_preamble("You are a job assistant.");

        assert_eq!(
            RigProviderAdapter::merged_preamble(&request).as_deref(),
            Some("You are a job assistant.\n\nAnswer in Punjabi.")
        );
    }

    #[test]
    fn blank_preamble_is_omitted() {
        let request = request(vec![ProviderMessage::new(Role::User, "hello")]).with_preamble("  ");

        assert_eq!(RigProviderAdapter::merged_preamble(&request), None);
    }

    #[test]
    fn adapter_requires_api_key() {
        let config = ProviderConfig::new(RIG_GROQ_PROVIDER_ID, "   ", DEFAULT_GROQ_ENDPOINT);

        let result = RigProviderAdapter::new(config, ApiFlavor::ChatCompletions, None);

        assert!(matches!(result, Err(ProviderError::MissingApiKey { .. })));
    }

    #[test]
    fn stream_chat_rejects_empty_message_set() {
        let config = ProviderConfig::new(RIG_GROQ_PROVIDER_ID, "gsk-test", DEFAULT_GROQ_ENDPOINT);
        let adapter = match RigProviderAdapter::new(config, ApiFlavor::ChatCompletions, None) {
            Ok(adapter) => adapter,
            Err(error) => panic!("adapter should build: {error}"),
        };

        let result = adapter.stream_chat(request(Vec::new()));

        assert!(matches!(result, Err(ProviderError::EmptyMessageSet { .. })));
    }

    struct EchoExecutor {
        fail: bool,
    }

    impl ToolExecutor for EchoExecutor {
        fn execute<'a>(
            &'a self,
            tool_name: &'a str,
            arguments: Value,
        ) -> BoxFuture<'a, ToolResult<Value>> {
            Box::pin(async move {
                if self.fail {
                    return Err(ToolError::ExecutionFailed {
                        stage: "echo-executor",
                        tool_name: tool_name.to_string(),
                        details: "job store offline".to_string(),
                    });
                }
                Ok(json!({ "tool": tool_name, "echo": arguments }))
            })
        }
    }

    fn target() -> StreamTarget {
        StreamTarget::new(SessionId::new(1), TurnId::new(1))
    }

    #[tokio::test]
    async fn executed_tool_result_becomes_the_invocation() {
        let executor: Arc<dyn ToolExecutor> = Arc::new(EchoExecutor { fail: false });

        let invocation = RigProviderAdapter::resolve_tool_call(
            Some(&executor),
            target(),
            "jobSearch".to_string(),
            json!({ "keyword": "clerk" }),
        )
        .await;

        assert_eq!(
            invocation,
            Some(ToolInvocation::new(
                "jobSearch",
                json!({ "tool": "jobSearch", "echo": { "keyword": "clerk" } }),
            ))
        );
    }

    #[tokio::test]
    async fn failing_tool_is_dropped() {
        let executor: Arc<dyn ToolExecutor> = Arc::new(EchoExecutor { fail: true });

        let invocation = RigProviderAdapter::resolve_tool_call(
            Some(&executor),
            target(),
            "jobSearch".to_string(),
            json!({}),
        )
        .await;

        assert_eq!(invocation, None);
    }

    #[tokio::test]
    async fn without_executor_model_arguments_pass_through() {
        let arguments = json!({ "score": 81, "strengths": ["Clear layout"] });

        let invocation = RigProviderAdapter::resolve_tool_call(
            None,
            target(),
            "resumeAnalysis".to_string(),
            arguments.clone(),
        )
        .await;

        assert_eq!(
            invocation,
            Some(ToolInvocation::new("resumeAnalysis", arguments))
        );
    }

    #[test]
    fn empty_text_chunks_are_skipped() {
        assert_eq!(RigProviderAdapter::text_delta(String::new()), None);
        assert_eq!(
            RigProviderAdapter::text_delta("Namaste".to_string()),
            Some(StreamEventPayload::Delta("Namaste".to_string()))
        );
    }
}
