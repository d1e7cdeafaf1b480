use std::fmt;

use rozgar_llm::{
    ProviderMessage, SessionId, StreamEventMapped, StreamEventPayload, StreamTarget,
    ToolInvocation, TurnId,
};

use super::language::Language;
use super::message::{
    Message, MessageId, MessageStatus, Role, TurnState, TurnTransition, TurnTransitionRejection,
};

/// Why a submit was refused. The transcript is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    EmptyInput,
    AwaitingReply,
}

impl fmt::Display for SubmitRejected {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => formatter.write_str("message is empty"),
            Self::AwaitingReply => formatter.write_str("still waiting for the previous reply"),
        }
    }
}

impl std::error::Error for SubmitRejected {}

/// Everything needed to issue the outbound exchange for a freshly opened turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTurn {
    pub target: StreamTarget,
    pub assistant_message_id: MessageId,
    pub history: Vec<ProviderMessage>,
    pub preamble: &'static str,
}

/// Observable transcript change produced by applying one event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Fragment {
        message_id: MessageId,
        text: String,
    },
    ToolInvocation {
        message_id: MessageId,
        invocation: ToolInvocation,
    },
    Committed {
        message_id: MessageId,
    },
    Failed {
        message_id: MessageId,
        error: String,
    },
    Cancelled {
        message_id: MessageId,
    },
}

impl SessionUpdate {
    /// Returns true for updates that close the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Committed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// One conversation's transcript and turn bookkeeping.
///
/// Messages are append-only; only the assistant message of the in-flight turn
/// is ever mutated.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    messages: Vec<Message>,
    language: Language,
    pending_input: String,
    is_awaiting_reply: bool,
    turn_state: TurnState,
    last_error: Option<String>,
    open_message_id: Option<MessageId>,
    next_message_id: u64,
    next_turn_id: u64,
}

impl Session {
    pub fn new(id: SessionId, language: Language) -> Self {
        Self {
            id,
            messages: vec![Message::welcome(language.welcome_message())],
            language,
            pending_input: String::new(),
            is_awaiting_reply: false,
            turn_state: TurnState::Idle,
            last_error: None,
            open_message_id: None,
            next_message_id: 1,
            next_turn_id: 1,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn set_pending_input(&mut self, input: impl Into<String>) {
        self.pending_input = input.into();
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.is_awaiting_reply
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn_state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn active_target(&self) -> Option<StreamTarget> {
        self.turn_state.active_target()
    }

    /// Only future system instructions and UI strings change.
    pub fn change_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Opens a turn for `text`: appends the user message and an empty
    /// streaming assistant message, and returns the request material.
    pub fn begin_turn(&mut self, text: &str) -> Result<PreparedTurn, SubmitRejected> {
        if text.trim().is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }
        if self.is_awaiting_reply {
            return Err(SubmitRejected::AwaitingReply);
        }

        let turn_id = TurnId::new(self.next_turn_id);
        let target = StreamTarget::new(self.id, turn_id);
        self.turn_state = match self.turn_state.apply(TurnTransition::Submit(target)) {
            Ok(state) => state,
            Err(TurnTransitionRejection::AlreadyInFlight { .. }) => {
                return Err(SubmitRejected::AwaitingReply);
            }
            Err(rejection) => {
                tracing::warn!(?rejection, "unexpected turn rejection on submit");
                return Err(SubmitRejected::AwaitingReply);
            }
        };
        self.next_turn_id = self.next_turn_id.saturating_add(1);

        let user_message_id = self.alloc_message_id();
        let assistant_message_id = self.alloc_message_id();
        self.messages.push(Message::user(user_message_id, text));
        self.messages
            .push(Message::assistant_streaming(assistant_message_id, turn_id));

        self.open_message_id = Some(assistant_message_id);
        self.pending_input.clear();
        self.is_awaiting_reply = true;
        self.last_error = None;

        tracing::debug!(stream_target = ?target, %user_message_id, %assistant_message_id, "turn opened");

        Ok(PreparedTurn {
            target,
            assistant_message_id,
            history: self.history_for_provider(),
            preamble: self.language.system_instruction(),
        })
    }

    /// Applies one provider event. Returns `None` for stale events.
    pub fn apply_event(&mut self, event: StreamEventMapped) -> Option<SessionUpdate> {
        if !self.turn_state.accepts_stream_event(event.target) {
            tracing::trace!(stream_target = ?event.target, "dropping stale stream event");
            return None;
        }

        match event.payload {
            StreamEventPayload::Delta(text) => {
                let message_id = self.mark_streaming(event.target)?;
                let message = self.open_message_mut(event.target.turn_id)?;
                message.content.push_str(&text);
                Some(SessionUpdate::Fragment { message_id, text })
            }
            StreamEventPayload::ToolInvocation(invocation) => {
                let message_id = self.mark_streaming(event.target)?;
                let message = self.open_message_mut(event.target.turn_id)?;
                message.tool_invocations.push(invocation.clone());
                Some(SessionUpdate::ToolInvocation {
                    message_id,
                    invocation,
                })
            }
            StreamEventPayload::Done => self.commit_turn(event.target),
            StreamEventPayload::Error(error) => self.fail_turn(event.target, error),
        }
    }

    pub fn commit_turn(&mut self, target: StreamTarget) -> Option<SessionUpdate> {
        let message_id = self.finish_turn(
            TurnTransition::Commit(target),
            target,
            MessageStatus::Done,
        )?;
        Some(SessionUpdate::Committed { message_id })
    }

    /// Ends the turn with `error`, keeping any partial content.
    pub fn fail_turn(
        &mut self,
        target: StreamTarget,
        error: impl Into<String>,
    ) -> Option<SessionUpdate> {
        let error = error.into();
        let message_id = self.finish_turn(
            TurnTransition::Fail {
                target,
                message: error.clone(),
            },
            target,
            MessageStatus::Error(error.clone()),
        )?;
        tracing::warn!(stream_target = ?target, error = %error, "turn failed");
        self.last_error = Some(error.clone());
        Some(SessionUpdate::Failed { message_id, error })
    }

    pub fn cancel_turn(&mut self) -> Option<SessionUpdate> {
        let target = self.turn_state.active_target()?;
        let message_id = self.finish_turn(
            TurnTransition::Cancel(target),
            target,
            MessageStatus::Cancelled,
        )?;
        tracing::info!(stream_target = ?target, "turn cancelled");
        Some(SessionUpdate::Cancelled { message_id })
    }

    /// Ordered history for the next exchange.
    ///
    /// Skips the welcome message, the open placeholder and replies that
    /// ended with neither text nor tool results. Tool results travel with
    /// their assistant reply.
    pub fn history_for_provider(&self) -> Vec<ProviderMessage> {
        self.messages
            .iter()
            .filter(|message| !message.local_only)
            .filter(|message| !matches!(message.status, MessageStatus::Streaming(_)))
            .filter(|message| {
                !message.content.trim().is_empty() || !message.tool_invocations.is_empty()
            })
            .map(|message| match message.role {
                Role::User => ProviderMessage::user(message.content.clone()),
                Role::Assistant => {
                    ProviderMessage::assistant_reply(&message.content, &message.tool_invocations)
                }
            })
            .collect()
    }

    fn mark_streaming(&mut self, target: StreamTarget) -> Option<MessageId> {
        match self.turn_state.apply(TurnTransition::Stream(target)) {
            Ok(state) => self.turn_state = state,
            Err(rejection) => {
                tracing::debug!(?rejection, "stream transition rejected");
                return None;
            }
        }
        self.open_message_id
    }

    fn finish_turn(
        &mut self,
        transition: TurnTransition,
        target: StreamTarget,
        status: MessageStatus,
    ) -> Option<MessageId> {
        match self.turn_state.apply(transition) {
            Ok(state) => self.turn_state = state,
            Err(rejection) => {
                tracing::debug!(?rejection, "terminal transition rejected");
                return None;
            }
        }

        let message_id = self.open_message_id.take()?;
        if let Some(message) = self.open_message_mut(target.turn_id) {
            message.status = status;
        }
        self.is_awaiting_reply = false;
        Some(message_id)
    }

    fn open_message_mut(&mut self, turn_id: TurnId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.is_open_for(turn_id))
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use rozgar_llm::Role as WireRole;

    use super::*;

    fn session() -> Session {
        Session::new(SessionId::new(1), Language::En)
    }

    fn event(target: StreamTarget, payload: StreamEventPayload) -> StreamEventMapped {
        StreamEventMapped::new(target, payload)
    }

    fn delta(target: StreamTarget, text: &str) -> StreamEventMapped {
        event(target, StreamEventPayload::Delta(text.to_string()))
    }

    fn begin(session: &mut Session, text: &str) -> PreparedTurn {
        match session.begin_turn(text) {
            Ok(prepared) => prepared,
            Err(rejection) => panic!("submit should be accepted: {rejection}"),
        }
    }

    #[test]
    fn new_session_holds_only_the_welcome_message() {
        let session = Session::new(SessionId::new(4), Language::Pa);

        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].id, MessageId::WELCOME);
        assert_eq!(
            session.messages()[0].content,
            Language::Pa.welcome_message()
        );
        assert!(session.history_for_provider().is_empty());
    }

    #[test]
    fn begin_turn_appends_user_and_placeholder() {
        let mut session = session();
        session.set_pending_input("Find clerk jobs");

        let prepared = begin(&mut session, "Find clerk jobs");

        assert!(session.is_awaiting_reply());
        assert!(session.pending_input().is_empty());
        assert_eq!(session.messages().len(), 3);
        assert_eq!(session.messages()[1].role, Role::User);
        assert_eq!(
            session.messages()[2].status,
            MessageStatus::Streaming(prepared.target.turn_id)
        );
        assert_eq!(
            prepared.history,
            vec![ProviderMessage::new(WireRole::User, "Find clerk jobs")]
        );
        assert_eq!(prepared.preamble, Language::En.system_instruction());
    }

    #[test]
    fn blank_input_is_rejected() {
        let mut session = session();

        assert_eq!(session.begin_turn("   "), Err(SubmitRejected::EmptyInput));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn submit_while_awaiting_reply_leaves_transcript_unchanged() {
        let mut session = session();
        begin(&mut session, "first");
        let before = session.messages().to_vec();

        assert_eq!(
            session.begin_turn("second"),
            Err(SubmitRejected::AwaitingReply)
        );
        assert_eq!(session.messages(), before.as_slice());
    }

    #[test]
    fn fragments_accumulate_in_arrival_order() {
        let mut session = session();
        let prepared = begin(&mut session, "hi");

        for chunk in ["Hel", "lo", " world"] {
            assert!(session.apply_event(delta(prepared.target, chunk)).is_some());
        }
        let committed = session.apply_event(event(prepared.target, StreamEventPayload::Done));

        assert_eq!(
            committed,
            Some(SessionUpdate::Committed {
                message_id: prepared.assistant_message_id
            })
        );
        let Some(reply) = session.message(prepared.assistant_message_id) else {
            panic!("assistant message should exist");
        };
        assert_eq!(reply.content, "Hello world");
        assert_eq!(reply.status, MessageStatus::Done);
        assert!(!session.is_awaiting_reply());
    }

    #[test]
    fn tool_invocations_attach_to_the_open_reply() {
        let mut session = session();
        let prepared = begin(&mut session, "jobs in Mohali");
        let invocation =
            ToolInvocation::new("jobSearch", serde_json::json!({ "totalFound": 0 }));

        let update = session.apply_event(event(
            prepared.target,
            StreamEventPayload::ToolInvocation(invocation.clone()),
        ));

        assert!(matches!(update, Some(SessionUpdate::ToolInvocation { .. })));
        let Some(reply) = session.message(prepared.assistant_message_id) else {
            panic!("assistant message should exist");
        };
        assert_eq!(reply.tool_invocations, vec![invocation]);
    }

    #[test]
    fn tool_only_reply_stays_in_the_next_history() {
        let mut session = session();
        let first = begin(&mut session, "find clerk jobs in Mohali");
        let invocation = ToolInvocation::new(
            "jobSearch",
            serde_json::json!({ "totalFound": 1, "results": [{ "title": "Junior Clerk" }] }),
        );
        session.apply_event(event(
            first.target,
            StreamEventPayload::ToolInvocation(invocation),
        ));
        session.apply_event(event(first.target, StreamEventPayload::Done));

        let second = begin(&mut session, "tell me more about the first one");

        let roles = second
            .history
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![WireRole::User, WireRole::Assistant, WireRole::User]
        );
        assert!(second.history[1].content.starts_with("[jobSearch result]"));
        assert!(second.history[1].content.contains("Junior Clerk"));
    }

    #[test]
    fn failure_keeps_partial_content_and_clears_awaiting() {
        let mut session = session();
        let prepared = begin(&mut session, "hi");
        session.apply_event(delta(prepared.target, "Hel"));
        session.apply_event(delta(prepared.target, "lo"));

        let update = session.apply_event(event(
            prepared.target,
            StreamEventPayload::Error("connection reset".to_string()),
        ));

        assert!(matches!(update, Some(SessionUpdate::Failed { .. })));
        assert!(!session.is_awaiting_reply());
        assert_eq!(session.last_error(), Some("connection reset"));
        let Some(reply) = session.message(prepared.assistant_message_id) else {
            panic!("assistant message should exist");
        };
        assert_eq!(reply.content, "Hello");
        assert_eq!(
            reply.status,
            MessageStatus::Error("connection reset".to_string())
        );
    }

    #[test]
    fn events_for_an_old_turn_are_ignored() {
        let mut session = session();
        let first = begin(&mut session, "one");
        session.apply_event(event(first.target, StreamEventPayload::Done));
        let second = begin(&mut session, "two");

        let stale = session.apply_event(delta(first.target, "late"));

        assert_eq!(stale, None);
        let Some(reply) = session.message(second.assistant_message_id) else {
            panic!("assistant message should exist");
        };
        assert!(reply.content.is_empty());
    }

    #[test]
    fn committed_turns_alternate_roles_after_welcome() {
        let mut session = session();
        for prompt in ["one", "two", "three"] {
            let prepared = begin(&mut session, prompt);
            session.apply_event(delta(prepared.target, "ok"));
            session.apply_event(event(prepared.target, StreamEventPayload::Done));
        }
        let failed = begin(&mut session, "four");
        session.fail_turn(failed.target, "timeout");

        let roles = session.messages()[1..]
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>();
        for (index, role) in roles.iter().enumerate() {
            let expected = if index % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            assert_eq!(*role, expected);
        }
        assert_eq!(roles.len(), 8);
    }

    #[test]
    fn changing_language_keeps_existing_content() {
        let mut session = session();
        let prepared = begin(&mut session, "hello");
        session.apply_event(delta(prepared.target, "Hi there"));
        session.apply_event(event(prepared.target, StreamEventPayload::Done));
        let before = session.messages().to_vec();

        session.change_language(Language::Hi);

        assert_eq!(session.messages(), before.as_slice());
        let next = begin(&mut session, "नौकरी");
        assert_eq!(next.preamble, Language::Hi.system_instruction());
        assert_eq!(next.history.len(), 3);
    }

    #[test]
    fn cancel_closes_the_open_reply() {
        let mut session = session();
        let prepared = begin(&mut session, "hi");
        session.apply_event(delta(prepared.target, "partial"));

        let update = session.cancel_turn();

        assert_eq!(
            update,
            Some(SessionUpdate::Cancelled {
                message_id: prepared.assistant_message_id
            })
        );
        assert_eq!(session.turn_state(), &TurnState::Cancelled(prepared.target));
        assert!(!session.is_awaiting_reply());
        assert_eq!(session.cancel_turn(), None);
    }
}
