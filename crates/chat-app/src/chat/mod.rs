pub mod controller;
pub mod language;
/// Transcript entities and the turn state machine.
pub mod message;
pub mod session;
pub mod tool_result;

pub use controller::{ChatController, RequestOptions};
pub use language::Language;
pub use message::{
    Message, MessageId, MessageStatus, Role, TurnState, TurnTransition, TurnTransitionRejection,
    TurnTransitionResult,
};
pub use session::{PreparedTurn, Session, SessionUpdate, SubmitRejected};
pub use tool_result::{
    InterviewPrepView, JobCard, JobSearchView, ResumeAnalysisView, ToolResultView,
    render_tool_result, tool_label,
};
