use serde_json::{Value, json};
use snafu::Snafu;

use crate::provider::BoxFuture;

pub const JOB_SEARCH_TOOL: &str = "jobSearch";
pub const RESUME_ANALYSIS_TOOL: &str = "resumeAnalysis";
pub const INTERVIEW_PREP_TOOL: &str = "interviewPrep";

/// Provider-agnostic tool declaration sent alongside a stream request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ToolError {
    #[snafu(display("tool '{tool_name}' is not known to this executor"))]
    UnknownTool {
        stage: &'static str,
        tool_name: String,
    },
    #[snafu(display("tool '{tool_name}' received invalid arguments: {details}"))]
    InvalidArguments {
        stage: &'static str,
        tool_name: String,
        details: String,
    },
    #[snafu(display("tool '{tool_name}' failed on `{stage}`: {details}"))]
    ExecutionFailed {
        stage: &'static str,
        tool_name: String,
        details: String,
    },
}

/// Runs a model-requested tool and produces the payload attached to the reply.
pub trait ToolExecutor: Send + Sync {
    fn execute<'a>(&'a self, tool_name: &'a str, arguments: Value) -> BoxFuture<'a, ToolResult<Value>>;
}

/// Declarations for the job-assistance tools the chat model may call.
pub fn portal_tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::new(
            JOB_SEARCH_TOOL,
            "Search current job listings in Punjab by keyword, location, job type or education level.",
            json!({
                "type": "object",
                "properties": {
                    "keyword": { "type": "string", "description": "Matches title, company or a requirement" },
                    "location": { "type": "string", "description": "City name, e.g. Chandigarh" },
                    "type": { "type": "string", "description": "Full-time or Part-time" },
                    "education": { "type": "string", "description": "10th, 12th, Diploma or Graduate" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 20 }
                }
            }),
        ),
        ToolSchema::new(
            RESUME_ANALYSIS_TOOL,
            "Report a resume assessment: a 0-100 score, strengths, improvements and keyword suggestions.",
            json!({
                "type": "object",
                "properties": {
                    "score": { "type": "integer", "minimum": 0, "maximum": 100 },
                    "strengths": { "type": "array", "items": { "type": "string" } },
                    "improvements": { "type": "array", "items": { "type": "string" } },
                    "keywordSuggestions": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["score"]
            }),
        ),
        ToolSchema::new(
            INTERVIEW_PREP_TOOL,
            "Prepare a list of likely interview questions and tips.",
            json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["general", "behavioral", "technical"] },
                    "jobTitle": { "type": "string" },
                    "count": { "type": "integer", "minimum": 1, "maximum": 5 }
                }
            }),
        ),
    ]
}
