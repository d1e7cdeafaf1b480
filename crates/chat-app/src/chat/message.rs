use std::fmt;

use rozgar_llm::{StreamTarget, ToolInvocation, TurnId};

/// Stable identifier for one transcript message.
///
/// Id zero is reserved for the synthesized welcome message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const WELCOME: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn is_welcome(self) -> bool {
        self == Self::WELCOME
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_welcome() {
            formatter.write_str("welcome")
        } else {
            write!(formatter, "msg-{}", self.0)
        }
    }
}

/// Transcript speaker. System instructions never become transcript messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl From<Role> for rozgar_llm::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Done,
    Streaming(TurnId),
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub status: MessageStatus,
    /// Shown in the transcript but never sent to the provider.
    pub local_only: bool,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            tool_invocations: Vec::new(),
            status,
            local_only: false,
        }
    }

    pub fn welcome(content: impl Into<String>) -> Self {
        Self {
            local_only: true,
            ..Self::new(MessageId::WELCOME, Role::Assistant, content, MessageStatus::Done)
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, MessageStatus::Done)
    }

    /// Creates an assistant placeholder while streaming.
    pub fn assistant_streaming(id: MessageId, turn_id: TurnId) -> Self {
        Self::new(
            id,
            Role::Assistant,
            String::new(),
            MessageStatus::Streaming(turn_id),
        )
    }

    /// Returns true while fragments for `turn_id` may still be appended.
    pub fn is_open_for(&self, turn_id: TurnId) -> bool {
        matches!(self.status, MessageStatus::Streaming(active) if active == turn_id)
    }
}

/// Turn lifecycle for one session.
///
/// `Committed`, `Failed` and `Cancelled` behave as `Idle` for the next submit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Submitting(StreamTarget),
    Streaming(StreamTarget),
    Committed(StreamTarget),
    Failed {
        target: StreamTarget,
        message: String,
    },
    Cancelled(StreamTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Submit(StreamTarget),
    /// First provider event observed for the turn.
    Stream(StreamTarget),
    Commit(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Cancel(StreamTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransitionRejection {
    AlreadyInFlight {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveTurn,
    TurnMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type TurnTransitionResult = Result<TurnState, TurnTransitionRejection>;

impl TurnState {
    /// Returns the in-flight target while submitting or streaming.
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::Submitting(target) | Self::Streaming(target) => Some(*target),
            Self::Idle | Self::Committed(_) | Self::Failed { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.active_target().is_some()
    }

    /// Returns true when incoming stream data matches the in-flight turn.
    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        self.active_target() == Some(target)
    }

    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match transition {
            TurnTransition::Submit(target) => self.apply_submit(target),
            TurnTransition::Stream(target) => {
                self.apply_in_flight(target, || Self::Streaming(target))
            }
            TurnTransition::Commit(target) => {
                self.apply_in_flight(target, || Self::Committed(target))
            }
            TurnTransition::Fail { target, message } => {
                self.apply_in_flight(target, || Self::Failed { target, message })
            }
            TurnTransition::Cancel(target) => {
                self.apply_in_flight(target, || Self::Cancelled(target))
            }
        }
    }

    fn apply_submit(&self, target: StreamTarget) -> TurnTransitionResult {
        match self.active_target() {
            Some(active) => Err(TurnTransitionRejection::AlreadyInFlight {
                active,
                attempted: target,
            }),
            None => Ok(Self::Submitting(target)),
        }
    }

    fn apply_in_flight(
        &self,
        target: StreamTarget,
        next: impl FnOnce() -> Self,
    ) -> TurnTransitionResult {
        match self.active_target() {
            Some(active) if active == target => Ok(next()),
            Some(active) => Err(TurnTransitionRejection::TurnMismatch {
                active,
                attempted: target,
            }),
            None => Err(TurnTransitionRejection::NoActiveTurn),
        }
    }
}

#[cfg(test)]
mod tests {
    use rozgar_llm::SessionId;

    use super::*;

    fn target(turn: u64) -> StreamTarget {
        StreamTarget::new(SessionId::new(1), TurnId::new(turn))
    }

    #[test]
    fn message_ids_display_like_transcript_keys() {
        assert_eq!(MessageId::WELCOME.to_string(), "welcome");
        assert_eq!(MessageId::new(7).to_string(), "msg-7");
    }

    #[test]
    fn welcome_message_is_local_only() {
        let welcome = Message::welcome("Hello!");

        assert!(welcome.local_only);
        assert_eq!(welcome.role, Role::Assistant);
        assert_eq!(welcome.status, MessageStatus::Done);
    }

    #[test]
    fn turn_runs_submit_stream_commit() {
        let state = TurnState::Idle;

        let Ok(state) = state.apply(TurnTransition::Submit(target(1))) else {
            panic!("idle turn should accept submit");
        };
        let Ok(state) = state.apply(TurnTransition::Stream(target(1))) else {
            panic!("submitting turn should start streaming");
        };
        let Ok(state) = state.apply(TurnTransition::Commit(target(1))) else {
            panic!("streaming turn should commit");
        };

        assert_eq!(state, TurnState::Committed(target(1)));
        assert!(!state.is_in_flight());
    }

    #[test]
    fn submitting_turn_may_commit_an_empty_reply() {
        let state = TurnState::Submitting(target(2));

        assert_eq!(
            state.apply(TurnTransition::Commit(target(2))),
            Ok(TurnState::Committed(target(2)))
        );
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let state = TurnState::Streaming(target(1));

        assert_eq!(
            state.apply(TurnTransition::Submit(target(2))),
            Err(TurnTransitionRejection::AlreadyInFlight {
                active: target(1),
                attempted: target(2),
            })
        );
    }

    #[test]
    fn terminal_states_accept_a_new_submit() {
        for state in [
            TurnState::Committed(target(1)),
            TurnState::Failed {
                target: target(1),
                message: "boom".to_string(),
            },
            TurnState::Cancelled(target(1)),
        ] {
            assert_eq!(
                state.apply(TurnTransition::Submit(target(2))),
                Ok(TurnState::Submitting(target(2)))
            );
        }
    }

    #[test]
    fn stale_target_is_a_mismatch() {
        let state = TurnState::Streaming(target(3));

        assert!(!state.accepts_stream_event(target(2)));
        assert_eq!(
            state.apply(TurnTransition::Cancel(target(2))),
            Err(TurnTransitionRejection::TurnMismatch {
                active: target(3),
                attempted: target(2),
            })
        );
    }

    #[test]
    fn idle_turn_has_nothing_to_fail() {
        assert_eq!(
            TurnState::Idle.apply(TurnTransition::Fail {
                target: target(1),
                message: "late".to_string(),
            }),
            Err(TurnTransitionRejection::NoActiveTurn)
        );
    }
}
