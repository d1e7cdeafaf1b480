pub mod error;
pub mod ids;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use ids::{JobId, UserId};
pub use sqlite::SqliteStorage;
pub use types::{
    DEFAULT_JOB_PAGE_LIMIT, JobFilter, JobPage, JobRecord, NewJob, NewUser, UserRecord,
};

/// Account lookups backing registration and login.
pub trait UserStore: Send + Sync {
    /// Email comparison is case-insensitive.
    fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>>;
    /// Fails with `StorageError::DuplicateEmail` when the email is already registered.
    fn insert_user(&self, input: NewUser) -> StorageResult<UserRecord>;
}

/// Job listings backing search.
pub trait JobStore: Send + Sync {
    fn list_jobs(&self, filter: JobFilter) -> StorageResult<JobPage>;
    fn insert_job(&self, input: NewJob) -> StorageResult<JobRecord>;
}

pub trait Storage: UserStore + JobStore {}

impl<T> Storage for T where T: UserStore + JobStore {}
