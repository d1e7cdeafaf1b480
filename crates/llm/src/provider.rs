use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

use crate::events::{Role, StreamEventMapped, StreamEventPayload, StreamTarget, ToolInvocation};
use crate::tools::ToolSchema;

/// Completion rounds per turn when tools are offered. A round that ends in
/// tool calls feeds their results into the next round.
pub const DEFAULT_TOOL_STEPS: u8 = 3;

/// User prompt that asks the model to answer from the tool results it just got.
pub const TOOL_FOLLOW_UP_PROMPT: &str =
    "Answer my last message using the tool results above. Keep it short and practical.";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Credentials and address of an OpenAI-compatible chat service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    /// Blank selects the provider's default endpoint.
    pub endpoint: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        let trimmed = |value: String| value.trim().to_string();
        Self {
            provider_id: trimmed(provider_id.into()),
            api_key: trimmed(api_key.into()),
            endpoint: trimmed(endpoint.into()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant reply as later rounds see it: the reply text followed by
    /// one section per tool result, so a reply made only of tool output
    /// still carries it.
    pub fn assistant_reply(text: &str, invocations: &[ToolInvocation]) -> Self {
        let mut sections = Vec::with_capacity(invocations.len() + 1);
        if !text.trim().is_empty() {
            sections.push(text.to_string());
        }
        sections.extend(invocations.iter().map(|invocation| {
            format!("[{} result]\n{}", invocation.tool_name, invocation.result)
        }));
        Self::new(Role::Assistant, sections.join("\n\n"))
    }
}

/// One outbound exchange: the conversation so far plus sampling and tools.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub target: StreamTarget,
    pub model_id: String,
    pub messages: Vec<ProviderMessage>,
    pub preamble: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub tools: Vec<ToolSchema>,
    /// Completion rounds left, this one included.
    pub tool_steps: u8,
}

impl StreamRequest {
    pub fn new(
        target: StreamTarget,
        model_id: impl Into<String>,
        messages: Vec<ProviderMessage>,
    ) -> Self {
        Self {
            target,
            model_id: model_id.into(),
            messages,
            preamble: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            tool_steps: DEFAULT_TOOL_STEPS,
        }
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// At least one round always runs.
    pub fn with_tool_steps(mut self, tool_steps: u8) -> Self {
        self.tool_steps = tool_steps.max(1);
        self
    }

    /// Next round after one that produced `text` and called tools.
    ///
    /// Returns `None` when no tools ran or the round budget is spent. The
    /// final round is sent without tools so the model has to answer in text.
    pub fn follow_up(&self, text: &str, invocations: &[ToolInvocation]) -> Option<Self> {
        if invocations.is_empty() || self.tool_steps <= 1 {
            return None;
        }

        let mut next = self.clone();
        next.tool_steps -= 1;
        next.messages
            .push(ProviderMessage::assistant_reply(text, invocations));
        next.messages.push(ProviderMessage::user(TOOL_FOLLOW_UP_PROMPT));
        if next.tool_steps == 1 {
            next.tools.clear();
        }
        Some(next)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("no API key configured for '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("unknown provider '{provider_id}', expected groq, openai or openai-compatible"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("nothing to send for {target:?}"))]
    EmptyMessageSet {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completion failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("{message}"))]
    StreamFailed {
        stage: &'static str,
        target: StreamTarget,
        message: String,
    },
    #[snafu(display("reply for {target:?} ended without finishing"))]
    StreamClosed {
        stage: &'static str,
        target: StreamTarget,
    },
}

/// Receiving half of one exchange.
///
/// Dropping it tells the worker to stop, which cancels the upstream request.
pub struct ProviderEventStream {
    target: StreamTarget,
    events: mpsc::UnboundedReceiver<StreamEventMapped>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl ProviderEventStream {
    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub async fn recv(&mut self) -> Option<StreamEventMapped> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEventMapped> {
        self.events.try_recv().ok()
    }

    /// Returns false when cancellation was already sent or the worker is gone.
    pub fn cancel(&mut self) -> bool {
        match self.cancel_tx.take() {
            Some(cancel_tx) => cancel_tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Waits for the whole reply and returns its text. Tool invocations are
    /// skipped.
    pub async fn collect_text(&mut self) -> ProviderResult<String> {
        let mut text = String::new();
        while let Some(event) = self.events.recv().await {
            if event.target != self.target {
                continue;
            }
            match event.payload {
                StreamEventPayload::Delta(fragment) => text.push_str(&fragment),
                StreamEventPayload::ToolInvocation(_) => {}
                StreamEventPayload::Done => return Ok(text),
                StreamEventPayload::Error(message) => {
                    return StreamFailedSnafu {
                        stage: "collect-reply-text",
                        target: self.target,
                        message,
                    }
                    .fail();
                }
            }
        }

        StreamClosedSnafu {
            stage: "collect-reply-text",
            target: self.target,
        }
        .fail()
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// A started exchange. The worker must be spawned for events to flow.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

/// Event sender, the matching stream, and the worker's cancel signal.
///
/// Any `LlmProvider` can build its handle from this.
pub fn make_event_stream(
    target: StreamTarget,
) -> (
    mpsc::UnboundedSender<StreamEventMapped>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, events) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let stream = ProviderEventStream {
        target,
        events,
        cancel_tx: Some(cancel_tx),
    };
    (event_tx, stream, cancel_rx)
}
