use std::fmt;

use rozgar_llm::{INTERVIEW_PREP_TOOL, JOB_SEARCH_TOOL, RESUME_ANALYSIS_TOOL};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCard {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSearchView {
    pub total_found: Option<u64>,
    pub results: Vec<JobCard>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeAnalysisView {
    /// Clamped to 0..=100.
    pub score: Option<u8>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub keyword_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterviewPrepView {
    pub interview_type: Option<String>,
    pub questions: Vec<String>,
    pub tips: Vec<String>,
}

/// Display structure for one tool result.
///
/// Known tools get typed variants whose fields are all optional; anything
/// else keeps the raw payload as pretty JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResultView {
    JobSearch(JobSearchView),
    ResumeAnalysis(ResumeAnalysisView),
    InterviewPrep(InterviewPrepView),
    Raw(String),
}

/// Maps a tool name and its loosely shaped payload onto a fixed template.
///
/// Never fails: missing or wrongly typed fields render as absent.
pub fn render_tool_result(tool_name: &str, result: &Value) -> ToolResultView {
    match tool_name {
        JOB_SEARCH_TOOL => ToolResultView::JobSearch(JobSearchView {
            total_found: result.get("totalFound").and_then(Value::as_u64),
            results: result
                .get("results")
                .and_then(Value::as_array)
                .map(|jobs| jobs.iter().map(job_card).collect())
                .unwrap_or_default(),
        }),
        RESUME_ANALYSIS_TOOL => ToolResultView::ResumeAnalysis(ResumeAnalysisView {
            score: result
                .get("score")
                .and_then(Value::as_f64)
                .and_then(clamp_score),
            strengths: string_list(result, "strengths"),
            improvements: string_list(result, "improvements"),
            keyword_suggestions: string_list(result, "keywordSuggestions"),
        }),
        INTERVIEW_PREP_TOOL => ToolResultView::InterviewPrep(InterviewPrepView {
            interview_type: string_field(result, "interviewType"),
            questions: string_list(result, "questions"),
            tips: string_list(result, "tips"),
        }),
        _ => ToolResultView::Raw(
            serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()),
        ),
    }
}

/// Header shown above a tool result.
pub fn tool_label(tool_name: &str) -> &str {
    match tool_name {
        JOB_SEARCH_TOOL => "Job Search Results",
        RESUME_ANALYSIS_TOOL => "Resume Analysis",
        INTERVIEW_PREP_TOOL => "Interview Preparation",
        other => other,
    }
}

fn job_card(job: &Value) -> JobCard {
    JobCard {
        title: string_field(job, "title"),
        company: string_field(job, "company"),
        location: string_field(job, "location"),
        salary: string_field(job, "salary"),
        description: string_field(job, "description"),
        requirements: string_list(job, "requirements"),
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn clamp_score(score: f64) -> Option<u8> {
    score
        .is_finite()
        .then(|| score.clamp(0.0, 100.0).round() as u8)
}

impl fmt::Display for ToolResultView {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JobSearch(view) => fmt::Display::fmt(view, formatter),
            Self::ResumeAnalysis(view) => fmt::Display::fmt(view, formatter),
            Self::InterviewPrep(view) => fmt::Display::fmt(view, formatter),
            Self::Raw(dump) => formatter.write_str(dump),
        }
    }
}

impl fmt::Display for JobSearchView {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total_found.unwrap_or(self.results.len() as u64);
        writeln!(formatter, "Found {total} jobs:")?;

        for job in &self.results {
            writeln!(formatter)?;
            writeln!(formatter, "  {}", job.title.as_deref().unwrap_or_default())?;
            writeln!(
                formatter,
                "  {} • {}",
                job.company.as_deref().unwrap_or_default(),
                job.location.as_deref().unwrap_or_default()
            )?;
            if let Some(salary) = &job.salary {
                writeln!(formatter, "  {salary}")?;
            }
            if let Some(description) = &job.description {
                writeln!(formatter, "  {description}")?;
            }
            if !job.requirements.is_empty() {
                writeln!(formatter, "  {}", badges(&job.requirements))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ResumeAnalysisView {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.score {
            Some(score) => writeln!(formatter, "Resume Score: {score}/100")?,
            None => writeln!(formatter, "Resume Score: -/100")?,
        }
        write_bullets(formatter, "Strengths:", &self.strengths)?;
        write_bullets(formatter, "Improvements:", &self.improvements)?;
        writeln!(formatter, "Keyword Suggestions:")?;
        if !self.keyword_suggestions.is_empty() {
            writeln!(formatter, "  {}", badges(&self.keyword_suggestions))?;
        }
        Ok(())
    }
}

impl fmt::Display for InterviewPrepView {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            formatter,
            "Interview Questions ({}):",
            self.interview_type.as_deref().unwrap_or_default()
        )?;
        for (index, question) in self.questions.iter().enumerate() {
            writeln!(formatter, "  {}. {question}", index + 1)?;
        }
        write_bullets(formatter, "Tips:", &self.tips)
    }
}

fn write_bullets(formatter: &mut fmt::Formatter<'_>, heading: &str, items: &[String]) -> fmt::Result {
    writeln!(formatter, "{heading}")?;
    for item in items {
        writeln!(formatter, "  - {item}")?;
    }
    Ok(())
}

fn badges(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("[{item}]"))
        .collect::<Vec<_>>()
        .join(" ")
}
