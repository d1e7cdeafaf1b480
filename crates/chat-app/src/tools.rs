use std::sync::Arc;

use rozgar_llm::{
    BoxFuture, ExecutionFailedSnafu, INTERVIEW_PREP_TOOL, InvalidArgumentsSnafu, JOB_SEARCH_TOOL,
    RESUME_ANALYSIS_TOOL, ToolExecutor, ToolResult, UnknownToolSnafu,
};
use rozgar_storage::{DEFAULT_JOB_PAGE_LIMIT, JobFilter, JobStore};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub const DEFAULT_QUESTION_COUNT: usize = 5;

const GENERAL_QUESTIONS: [&str; 5] = [
    "Tell me about yourself.",
    "Why are you interested in this position?",
    "What are your greatest strengths?",
    "Where do you see yourself in 5 years?",
    "Why should we hire you?",
];

const BEHAVIORAL_QUESTIONS: [&str; 5] = [
    "Tell me about a time you overcame a challenge.",
    "Describe a situation where you had to work with a difficult person.",
    "Give an example of when you showed leadership.",
    "Tell me about a time you failed and what you learned.",
    "Describe a time you had to adapt to change.",
];

const TECHNICAL_QUESTIONS: [&str; 5] = [
    "Walk me through your problem-solving process.",
    "How do you stay updated with industry trends?",
    "Describe your experience with [relevant technology].",
    "How would you approach [job-specific scenario]?",
    "What tools and methodologies do you prefer and why?",
];

const INTERVIEW_TIPS: [&str; 4] = [
    "Research the organisation and the role before the interview.",
    "Answer behavioral questions with the STAR method: situation, task, action, result.",
    "Keep copies of your resume, certificates and ID ready.",
    "Prepare two or three questions to ask the interviewer.",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct JobSearchArgs {
    keyword: String,
    location: String,
    #[serde(rename = "type")]
    job_type: String,
    education: String,
    limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InterviewPrepArgs {
    #[serde(rename = "type")]
    interview_type: Option<String>,
    job_title: Option<String>,
    count: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ResumeAnalysisArgs {
    score: Option<f64>,
    strengths: Vec<String>,
    improvements: Vec<String>,
    keyword_suggestions: Vec<String>,
}

/// Executes the portal tools locally: job search against the job store,
/// interview prep from the built-in question bank, and resume scoring as
/// produced by the model.
pub struct PortalToolExecutor {
    jobs: Arc<dyn JobStore>,
}

impl PortalToolExecutor {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    async fn job_search(&self, arguments: Value) -> ToolResult<Value> {
        let args: JobSearchArgs = parse_arguments(JOB_SEARCH_TOOL, arguments)?;
        let filter = JobFilter::default()
            .with_keyword(args.keyword)
            .with_location(args.location)
            .with_job_type(args.job_type)
            .with_education(args.education)
            .with_page(1, args.limit.unwrap_or(DEFAULT_JOB_PAGE_LIMIT));

        let jobs = Arc::clone(&self.jobs);
        let page = tokio::task::spawn_blocking(move || jobs.list_jobs(filter))
            .await
            .map_err(|error| {
                ExecutionFailedSnafu {
                    stage: "job-search-join",
                    tool_name: JOB_SEARCH_TOOL,
                    details: error.to_string(),
                }
                .build()
            })?
            .map_err(|error| {
                ExecutionFailedSnafu {
                    stage: "job-search-list",
                    tool_name: JOB_SEARCH_TOOL,
                    details: error.to_string(),
                }
                .build()
            })?;

        let results = serde_json::to_value(&page.jobs).map_err(|error| {
            ExecutionFailedSnafu {
                stage: "job-search-encode",
                tool_name: JOB_SEARCH_TOOL,
                details: error.to_string(),
            }
            .build()
        })?;

        tracing::debug!(total = page.total, returned = page.jobs.len(), "job search executed");
        Ok(json!({
            "totalFound": page.total,
            "results": results,
        }))
    }
}

impl ToolExecutor for PortalToolExecutor {
    fn execute<'a>(
        &'a self,
        tool_name: &'a str,
        arguments: Value,
    ) -> BoxFuture<'a, ToolResult<Value>> {
        Box::pin(async move {
            match tool_name {
                JOB_SEARCH_TOOL => self.job_search(arguments).await,
                INTERVIEW_PREP_TOOL => interview_prep(arguments),
                RESUME_ANALYSIS_TOOL => resume_analysis(arguments),
                _ => UnknownToolSnafu {
                    stage: "tool-dispatch",
                    tool_name,
                }
                .fail(),
            }
        })
    }
}

fn interview_prep(arguments: Value) -> ToolResult<Value> {
    let args: InterviewPrepArgs = parse_arguments(INTERVIEW_PREP_TOOL, arguments)?;
    let interview_type = args
        .interview_type
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "general".to_string());
    let bank = match interview_type.as_str() {
        "behavioral" => &BEHAVIORAL_QUESTIONS,
        "technical" => &TECHNICAL_QUESTIONS,
        _ => &GENERAL_QUESTIONS,
    };
    let count = args.count.unwrap_or(DEFAULT_QUESTION_COUNT);

    Ok(json!({
        "interviewType": interview_type,
        "jobTitle": args.job_title.filter(|title| !title.trim().is_empty()).unwrap_or_else(|| "General".to_string()),
        "questions": bank.iter().take(count).collect::<Vec<_>>(),
        "tips": INTERVIEW_TIPS,
    }))
}

fn resume_analysis(arguments: Value) -> ToolResult<Value> {
    let args: ResumeAnalysisArgs = parse_arguments(RESUME_ANALYSIS_TOOL, arguments)?;
    let mut result = json!({
        "strengths": args.strengths,
        "improvements": args.improvements,
        "keywordSuggestions": args.keyword_suggestions,
    });
    if let Some(score) = args.score.filter(|score| score.is_finite()) {
        result["score"] = Value::from(score.clamp(0.0, 100.0).round() as u64);
    }
    Ok(result)
}

fn parse_arguments<T>(tool_name: &'static str, arguments: Value) -> ToolResult<T>
where
    T: DeserializeOwned + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }

    serde_json::from_value(arguments).map_err(|error| {
        InvalidArgumentsSnafu {
            stage: "parse-tool-arguments",
            tool_name,
            details: error.to_string(),
        }
        .build()
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rozgar_llm::ToolError;
    use rozgar_storage::{JobId, JobPage, JobRecord, NewJob, StorageResult};

    use super::*;

    #[derive(Default)]
    struct RecordingJobStore {
        filters: Mutex<Vec<JobFilter>>,
    }

    impl JobStore for RecordingJobStore {
        fn list_jobs(&self, filter: JobFilter) -> StorageResult<JobPage> {
            if let Ok(mut filters) = self.filters.lock() {
                filters.push(filter.clone());
            }
            let job = JobRecord {
                id: JobId::new_v7(),
                title: "Accountant".to_string(),
                company: "Finance Corp".to_string(),
                location: "Patiala".to_string(),
                job_type: "Full-time".to_string(),
                education: "Graduate".to_string(),
                salary: "₹25,000 - ₹40,000".to_string(),
                description: "Maintain financial records.".to_string(),
                requirements: vec!["Tally".to_string()],
                posted_on: "2024-01-10".to_string(),
            };
            Ok(JobPage::new(vec![job], filter.page, filter.limit, 1))
        }

        fn insert_job(&self, _input: NewJob) -> StorageResult<JobRecord> {
            unreachable!("job search never inserts listings")
        }
    }

    fn executor() -> (Arc<RecordingJobStore>, PortalToolExecutor) {
        let store = Arc::new(RecordingJobStore::default());
        let executor = PortalToolExecutor::new(store.clone());
        (store, executor)
    }

    #[tokio::test]
    async fn job_search_maps_arguments_to_a_filter() {
        let (store, executor) = executor();

        let result = executor
            .execute(
                "jobSearch",
                json!({ "keyword": "accountant", "type": "Full-time", "limit": 3 }),
            )
            .await;

        let result = match result {
            Ok(result) => result,
            Err(error) => panic!("job search should succeed: {error}"),
        };
        assert_eq!(result["totalFound"], json!(1));
        assert_eq!(result["results"][0]["title"], json!("Accountant"));
        assert_eq!(result["results"][0]["type"], json!("Full-time"));

        let filters = match store.filters.lock() {
            Ok(filters) => filters.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        assert_eq!(
            filters,
            vec![
                JobFilter::default()
                    .with_keyword("accountant")
                    .with_job_type("Full-time")
                    .with_page(1, 3)
            ]
        );
    }

    #[tokio::test]
    async fn interview_prep_uses_the_question_bank() {
        let (_store, executor) = executor();

        let result = executor
            .execute("interviewPrep", json!({ "type": "Behavioral", "count": 2 }))
            .await;

        let Ok(result) = result else {
            panic!("interview prep should succeed");
        };
        assert_eq!(result["interviewType"], json!("behavioral"));
        assert_eq!(result["jobTitle"], json!("General"));
        assert_eq!(
            result["questions"],
            json!([BEHAVIORAL_QUESTIONS[0], BEHAVIORAL_QUESTIONS[1]])
        );
        assert_eq!(result["tips"].as_array().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn unknown_interview_type_falls_back_to_general_questions() {
        let (_store, executor) = executor();

        let result = executor.execute("interviewPrep", Value::Null).await;

        let Ok(result) = result else {
            panic!("interview prep should succeed");
        };
        assert_eq!(result["interviewType"], json!("general"));
        assert_eq!(result["questions"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn resume_score_is_clamped() {
        let (_store, executor) = executor();

        let result = executor
            .execute(
                "resumeAnalysis",
                json!({ "score": 112.4, "strengths": ["Concise summary"] }),
            )
            .await;

        let Ok(result) = result else {
            panic!("resume analysis should succeed");
        };
        assert_eq!(result["score"], json!(100));
        assert_eq!(result["strengths"], json!(["Concise summary"]));
        assert_eq!(result["keywordSuggestions"], json!([]));
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported() {
        let (_store, executor) = executor();

        let result = executor
            .execute("jobSearch", json!({ "limit": "ten" }))
            .await;

        assert!(matches!(
            result,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_tools_are_rejected() {
        let (_store, executor) = executor();

        let result = executor.execute("weather", json!({})).await;

        assert!(matches!(result, Err(ToolError::UnknownTool { .. })));
    }
}
