use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("email '{email}' is already registered"))]
    DuplicateEmail { stage: &'static str, email: String },
    #[snafu(display("'{raw}' is not a valid {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("column value {value} is negative on `{stage}`"))]
    NegativeInteger { stage: &'static str, value: i64 },
    #[snafu(display("job requirements could not be encoded on `{stage}`"))]
    EncodeRequirements {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("stored requirements of job '{job_id}' are not a JSON string list"))]
    DecodeRequirements {
        stage: &'static str,
        job_id: String,
        source: serde_json::Error,
    },
    #[snafu(display("cannot create database directory {path}"))]
    CreateDatabaseDirectory {
        stage: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("'{database_url}' is not a usable sqlite URL"))]
    DatabaseUrl {
        stage: &'static str,
        database_url: String,
        source: sqlx::Error,
    },
    #[snafu(display("cannot connect to '{database_url}' on `{stage}`"))]
    Connect {
        stage: &'static str,
        database_url: String,
        source: sqlx::Error,
    },
    #[snafu(display("setting pragma '{pragma}' failed"))]
    Pragma {
        stage: &'static str,
        pragma: &'static str,
        source: sqlx::Error,
    },
    #[snafu(display("schema migration failed"))]
    Migrate {
        stage: &'static str,
        source: sqlx::migrate::MigrateError,
    },
    #[snafu(display("query failed on `{stage}`: {source}"))]
    Query {
        stage: &'static str,
        source: sqlx::Error,
    },
    #[snafu(display("database worker could not start on `{stage}`"))]
    SpawnWorker {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("database worker runtime could not start"))]
    WorkerRuntime {
        stage: &'static str,
        source: std::io::Error,
    },
    #[snafu(display("database worker panicked on `{stage}`"))]
    WorkerPanicked { stage: &'static str },
}

pub type StorageResult<T> = Result<T, StorageError>;
