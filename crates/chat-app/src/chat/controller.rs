use std::collections::VecDeque;
use std::sync::Arc;

use rozgar_llm::{
    LlmProvider, ProviderEventStream, SessionId, StreamRequest, StreamTarget, ToolSchema,
};

use super::language::Language;
use super::session::{Session, SessionUpdate, SubmitRejected};

pub const PROVIDER_NOT_CONFIGURED: &str =
    "Provider is not configured. Set an API key with `rozgar config set --api-key`.";
pub const STREAM_ENDED_EARLY: &str = "provider stream ended before a terminal event";

/// Sampling knobs forwarded with every exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub model_id: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub tools: Vec<ToolSchema>,
}

/// Drives one session against a provider.
///
/// The controller is the single consumer of provider events: each event is
/// applied to the session before the next one is read. Dropping the
/// controller drops the in-flight event stream, which cancels the exchange
/// upstream.
pub struct ChatController {
    session: Session,
    provider: Option<Arc<dyn LlmProvider>>,
    options: RequestOptions,
    active_stream: Option<ProviderEventStream>,
    pending_updates: VecDeque<SessionUpdate>,
}

impl ChatController {
    pub fn new(
        session_id: SessionId,
        language: Language,
        provider: Option<Arc<dyn LlmProvider>>,
        options: RequestOptions,
    ) -> Self {
        Self {
            session: Session::new(session_id, language),
            provider,
            options,
            active_stream: None,
            pending_updates: VecDeque::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_pending_input(&mut self, input: impl Into<String>) {
        self.session.set_pending_input(input);
    }

    pub fn model_id(&self) -> String {
        self.options
            .model_id
            .clone()
            .filter(|model_id| !model_id.trim().is_empty())
            .or_else(|| {
                self.provider
                    .as_ref()
                    .map(|provider| provider.default_model().to_string())
            })
            .unwrap_or_default()
    }

    pub fn change_language(&mut self, language: Language) {
        self.session.change_language(language);
    }

    /// Opens a turn and issues exactly one outbound exchange.
    ///
    /// Must be called from within a Tokio runtime; the provider worker is
    /// spawned onto it and this returns without waiting for the reply.
    pub fn submit(&mut self, text: &str) -> Result<StreamTarget, SubmitRejected> {
        let prepared = self.session.begin_turn(text)?;
        let target = prepared.target;

        let Some(provider) = self.provider.clone() else {
            self.fail_active_turn(target, PROVIDER_NOT_CONFIGURED);
            return Ok(target);
        };

        let mut request = StreamRequest::new(target, self.model_id(), prepared.history)
            .with_preamble(prepared.preamble)
            .with_tools(self.options.tools.clone());
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        match provider.stream_chat(request) {
            Ok(handle) => {
                tokio::spawn(handle.worker);
                self.active_stream = Some(handle.stream);
                tracing::debug!(
                    stream_target = ?target,
                    provider = provider.id(),
                    "exchange started"
                );
            }
            Err(error) => {
                tracing::error!(stream_target = ?target, error = %error, "provider refused stream");
                self.fail_active_turn(target, error.to_string());
            }
        }

        Ok(target)
    }

    /// Waits for the next transcript change of the in-flight turn.
    ///
    /// Returns `None` once no turn is in flight and nothing is queued.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        if let Some(update) = self.pending_updates.pop_front() {
            return Some(update);
        }

        loop {
            let stream = self.active_stream.as_mut()?;
            let stream_target = stream.target();

            let Some(event) = stream.recv().await else {
                self.active_stream = None;
                return self.session.fail_turn(stream_target, STREAM_ENDED_EARLY);
            };

            let Some(update) = self.session.apply_event(event) else {
                continue;
            };
            if update.is_terminal() {
                self.active_stream = None;
            }
            return Some(update);
        }
    }

    /// Drains every remaining update of the in-flight turn.
    pub async fn finish_turn(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    /// Cancels the in-flight exchange upstream and closes the open reply.
    pub fn cancel(&mut self) -> Option<SessionUpdate> {
        if let Some(mut stream) = self.active_stream.take() {
            stream.cancel();
        }
        self.pending_updates.clear();
        self.session.cancel_turn()
    }

    fn fail_active_turn(&mut self, target: StreamTarget, error: impl Into<String>) {
        if let Some(update) = self.session.fail_turn(target, error) {
            self.pending_updates.push_back(update);
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        if let Some(mut stream) = self.active_stream.take() {
            tracing::debug!(stream_target = ?stream.target(), "controller dropped mid-turn");
            stream.cancel();
        }
    }
}
