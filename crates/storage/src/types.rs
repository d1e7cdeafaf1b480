use serde::Serialize;

use super::ids::{JobId, UserId};

pub const DEFAULT_JOB_PAGE_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub education: String,
    pub city: String,
    pub created_at_unix_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub education: String,
    pub city: String,
}

/// One listing, serialized in the camelCase shape the `jobSearch` tool emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub education: String,
    pub salary: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub posted_on: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub education: String,
    pub salary: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub posted_on: String,
}

/// Listing filter. Blank text fields match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    /// Case-insensitive substring of title, company or any requirement.
    pub keyword: String,
    /// Case-insensitive substring of the location.
    pub location: String,
    /// Case-insensitive exact job type.
    pub job_type: String,
    /// Case-insensitive exact education level.
    pub education: String,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            location: String::new(),
            job_type: String::new(),
            education: String::new(),
            page: 1,
            limit: DEFAULT_JOB_PAGE_LIMIT,
        }
    }
}

impl JobFilter {
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn with_education(mut self, education: impl Into<String>) -> Self {
        self.education = education.into();
        self
    }

    pub fn with_page(mut self, page: u32, limit: u32) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Trims text fields and clamps paging to at least one.
    pub fn normalized(mut self) -> Self {
        self.keyword = self.keyword.trim().to_string();
        self.location = self.location.trim().to_string();
        self.job_type = self.job_type.trim().to_string();
        self.education = self.education.trim().to_string();
        self.page = self.page.max(1);
        self.limit = self.limit.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPage {
    pub jobs: Vec<JobRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl JobPage {
    pub fn new(jobs: Vec<JobRecord>, page: u32, limit: u32, total: u64) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        let end_index = u64::from(page) * limit_u64;

        Self {
            jobs,
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit_u64),
            has_next: end_index < total,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_math_matches_listing_pagination() {
        let page = JobPage::new(Vec::new(), 2, 3, 7);

        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = JobPage::new(Vec::new(), 3, 3, 7);
        assert!(!last.has_next);
    }

    #[test]
    fn normalized_filter_clamps_paging() {
        let filter = JobFilter::default()
            .with_keyword("  clerk ")
            .with_page(0, 0)
            .normalized();

        assert_eq!(filter.keyword, "clerk");
        assert_eq!(filter.page, 1);
        assert_eq!(filter.limit, 1);
    }
}
