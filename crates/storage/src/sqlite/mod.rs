use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Connection, FromRow, SqliteConnection};

use super::error::{
    ConnectSnafu, CreateDatabaseDirectorySnafu, DatabaseUrlSnafu, DecodeRequirementsSnafu,
    DuplicateEmailSnafu, EncodeRequirementsSnafu, MigrateSnafu, NegativeIntegerSnafu, PragmaSnafu,
    QuerySnafu, SpawnWorkerSnafu, StorageResult, WorkerPanickedSnafu, WorkerRuntimeSnafu,
};
use super::ids::{JobId, UserId};
use super::types::{JobFilter, JobPage, JobRecord, NewJob, NewUser, UserRecord};
use super::{JobStore, UserStore};

// Blank filter fields short-circuit to true; keyword also scans the JSON requirements array.
const JOB_FILTER_CLAUSE: &str = "WHERE (? = '' \
     OR instr(lower(title), lower(?)) > 0 \
     OR instr(lower(company), lower(?)) > 0 \
     OR EXISTS (SELECT 1 FROM json_each(jobs.requirements) AS requirement \
                WHERE instr(lower(requirement.value), lower(?)) > 0)) \
 AND (? = '' OR instr(lower(location), lower(?)) > 0) \
 AND (? = '' OR lower(job_type) = lower(?)) \
 AND (? = '' OR lower(education) = lower(?))";

const JOB_COLUMNS: &str =
    "id, title, company, location, job_type, education, salary, description, requirements, posted_on";

const USER_COLUMNS: &str = "id, name, email, password_hash, phone, education, city, created_at";

/// Users and jobs in one SQLite file.
///
/// Each store call opens its own connection; the pool only lives long
/// enough to apply pragmas and migrations.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    database_url: String,
}

impl SqliteStorage {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(DatabaseUrlSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .context(ConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        let _: String = sqlx::query_scalar("PRAGMA journal_mode = WAL;")
            .fetch_one(&pool)
            .await
            .context(PragmaSnafu {
                stage: "sqlite-open-pragma-journal-mode",
                pragma: "journal_mode",
            })?;
        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .context(PragmaSnafu {
                stage: "sqlite-open-pragma-busy-timeout",
                pragma: "busy_timeout",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(MigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        pool.close().await;

        tracing::debug!(database_url = %database_url, "sqlite storage ready");
        Ok(Self { database_url })
    }

    fn run_db_call<T, F>(&self, stage: &'static str, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: Future<Output = StorageResult<T>> + Send + 'static,
    {
        // Store traits are sync, so each call executes on a dedicated worker thread
        // with its own current-thread runtime to avoid nested-runtime blocking panics.
        let worker = std::thread::Builder::new()
            .name(format!("sqlite-store-{stage}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context(WorkerRuntimeSnafu {
                        stage: "sqlite-store-runtime-build",
                    })?;
                runtime.block_on(op)
            })
            .context(SpawnWorkerSnafu {
                stage: "sqlite-store-spawn-worker",
            })?;

        match worker.join() {
            Ok(result) => result,
            Err(_) => WorkerPanickedSnafu { stage }.fail(),
        }
    }
}

impl UserStore for SqliteStorage {
    fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let database_url = self.database_url.clone();
        let email = email.trim().to_string();
        self.run_db_call("user-find-by-email", async move {
            let mut connection =
                connect_store_connection(&database_url, "user-find-connect").await?;
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
            ))
            .bind(email)
            .fetch_optional(&mut connection)
            .await
            .context(QuerySnafu {
                stage: "user-find-query",
            })?;

            row.map(user_row_to_record).transpose()
        })
    }

    fn insert_user(&self, input: NewUser) -> StorageResult<UserRecord> {
        let database_url = self.database_url.clone();
        self.run_db_call("user-insert", async move {
            let mut connection =
                connect_store_connection(&database_url, "user-insert-connect").await?;
            let mut tx = connection.begin().await.context(QuerySnafu {
                stage: "user-insert-begin",
            })?;

            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM users WHERE email = ? COLLATE NOCASE",
            )
            .bind(input.email.trim())
            .fetch_one(&mut *tx)
            .await
            .context(QuerySnafu {
                stage: "user-insert-check-email",
            })?;

            if existing > 0 {
                return DuplicateEmailSnafu {
                    stage: "user-insert-duplicate-email",
                    email: input.email.trim(),
                }
                .fail();
            }

            let user_id = UserId::new_v7();
            let now = unix_timestamp_seconds();
            let record = UserRecord {
                id: user_id,
                name: input.name.trim().to_string(),
                email: input.email.trim().to_string(),
                password_hash: input.password_hash,
                phone: input.phone.trim().to_string(),
                education: input.education.trim().to_string(),
                city: input.city.trim().to_string(),
                created_at_unix_seconds: i64_to_u64(now, "user-insert-created-at")?,
            };

            sqlx::query(
                "INSERT INTO users (id, name, email, password_hash, phone, education, city, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.id.to_string())
            .bind(record.name.clone())
            .bind(record.email.clone())
            .bind(record.password_hash.clone())
            .bind(record.phone.clone())
            .bind(record.education.clone())
            .bind(record.city.clone())
            .bind(now)
            .execute(&mut *tx)
            .await
            .context(QuerySnafu {
                stage: "user-insert-row",
            })?;

            tx.commit().await.context(QuerySnafu {
                stage: "user-insert-commit",
            })?;

            Ok(record)
        })
    }
}

impl JobStore for SqliteStorage {
    fn list_jobs(&self, filter: JobFilter) -> StorageResult<JobPage> {
        let database_url = self.database_url.clone();
        let filter = filter.normalized();
        self.run_db_call("job-list", async move {
            let mut connection = connect_store_connection(&database_url, "job-list-connect").await?;

            let count_sql = format!("SELECT COUNT(*) FROM jobs {JOB_FILTER_CLAUSE}");
            let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
            for value in filter_bind_values(&filter) {
                count_query = count_query.bind(value);
            }
            let total = count_query
                .fetch_one(&mut connection)
                .await
                .context(QuerySnafu {
                    stage: "job-list-count",
                })?;

            let offset = i64::from(filter.page - 1) * i64::from(filter.limit);
            let select_sql = format!(
                "SELECT {JOB_COLUMNS} FROM jobs {JOB_FILTER_CLAUSE} ORDER BY posted_on DESC, id ASC LIMIT ? OFFSET ?"
            );
            let mut select_query = sqlx::query_as::<_, JobRow>(&select_sql);
            for value in filter_bind_values(&filter) {
                select_query = select_query.bind(value);
            }
            let rows = select_query
                .bind(i64::from(filter.limit))
                .bind(offset)
                .fetch_all(&mut connection)
                .await
                .context(QuerySnafu {
                    stage: "job-list-select",
                })?;

            let jobs = rows
                .into_iter()
                .map(job_row_to_record)
                .collect::<StorageResult<Vec<_>>>()?;

            Ok(JobPage::new(
                jobs,
                filter.page,
                filter.limit,
                i64_to_u64(total, "job-list-total")?,
            ))
        })
    }

    fn insert_job(&self, input: NewJob) -> StorageResult<JobRecord> {
        let database_url = self.database_url.clone();
        self.run_db_call("job-insert", async move {
            let mut connection =
                connect_store_connection(&database_url, "job-insert-connect").await?;
            let requirements_json =
                serde_json::to_string(&input.requirements).context(EncodeRequirementsSnafu {
                    stage: "job-insert-encode-requirements",
                })?;

            let record = JobRecord {
                id: JobId::new_v7(),
                title: input.title,
                company: input.company,
                location: input.location,
                job_type: input.job_type,
                education: input.education,
                salary: input.salary,
                description: input.description,
                requirements: input.requirements,
                posted_on: input.posted_on,
            };

            sqlx::query(&format!(
                "INSERT INTO jobs ({JOB_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(record.id.to_string())
            .bind(record.title.clone())
            .bind(record.company.clone())
            .bind(record.location.clone())
            .bind(record.job_type.clone())
            .bind(record.education.clone())
            .bind(record.salary.clone())
            .bind(record.description.clone())
            .bind(requirements_json)
            .bind(record.posted_on.clone())
            .execute(&mut connection)
            .await
            .context(QuerySnafu {
                stage: "job-insert-row",
            })?;

            Ok(record)
        })
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    phone: String,
    education: String,
    city: String,
    created_at: i64,
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    title: String,
    company: String,
    location: String,
    job_type: String,
    education: String,
    salary: String,
    description: String,
    requirements: String,
    posted_on: String,
}

fn user_row_to_record(row: UserRow) -> StorageResult<UserRecord> {
    Ok(UserRecord {
        id: UserId::parse(&row.id)?,
        name: row.name,
        email: row.email,
        password_hash: row.password_hash,
        phone: row.phone,
        education: row.education,
        city: row.city,
        created_at_unix_seconds: i64_to_u64(row.created_at, "user-row-created-at")?,
    })
}

fn job_row_to_record(row: JobRow) -> StorageResult<JobRecord> {
    let requirements =
        serde_json::from_str::<Vec<String>>(&row.requirements).context(DecodeRequirementsSnafu {
            stage: "job-row-requirements",
            job_id: row.id.clone(),
        })?;

    Ok(JobRecord {
        id: JobId::parse(&row.id)?,
        title: row.title,
        company: row.company,
        location: row.location,
        job_type: row.job_type,
        education: row.education,
        salary: row.salary,
        description: row.description,
        requirements,
        posted_on: row.posted_on,
    })
}

/// Bind order mirrors the placeholders in `JOB_FILTER_CLAUSE`.
fn filter_bind_values(filter: &JobFilter) -> [String; 10] {
    [
        filter.keyword.clone(),
        filter.keyword.clone(),
        filter.keyword.clone(),
        filter.keyword.clone(),
        filter.location.clone(),
        filter.location.clone(),
        filter.job_type.clone(),
        filter.job_type.clone(),
        filter.education.clone(),
        filter.education.clone(),
    ]
}

async fn connect_store_connection(
    database_url: &str,
    stage: &'static str,
) -> StorageResult<SqliteConnection> {
    let mut connection =
        SqliteConnection::connect(database_url)
            .await
            .context(ConnectSnafu {
                stage,
                database_url: database_url.to_string(),
            })?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(&mut connection)
        .await
        .context(PragmaSnafu {
            stage: "sqlite-store-pragma-busy-timeout",
            pragma: "busy_timeout",
        })?;

    Ok(connection)
}

fn unix_timestamp_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_secs() as i64)
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    value
        .try_into()
        .map_err(|_| NegativeIntegerSnafu { stage, value }.build())
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") || database_location == ":memory:" {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateDatabaseDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    if database_location == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    format!("sqlite://{database_location}")
}
