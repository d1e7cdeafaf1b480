use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rozgar_storage::{NewUser, StorageError, UserId, UserRecord, UserStore};
use serde::Serialize;
use snafu::{ResultExt, Snafu, ensure};

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub education: String,
    pub city: String,
}

/// Account data safe to show back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub city: String,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            phone: record.phone,
            education: record.education,
            city: record.city,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AccountError {
    #[snafu(display("invalid {field}: {details}"))]
    Validation {
        stage: &'static str,
        field: &'static str,
        details: String,
    },
    #[snafu(display("an account with email '{email}' already exists"))]
    EmailTaken { stage: &'static str, email: String },
    #[snafu(display("invalid email or password"))]
    InvalidCredentials { stage: &'static str },
    #[snafu(display("password hashing failed on `{stage}`: {details}"))]
    PasswordHash {
        stage: &'static str,
        details: String,
    },
    #[snafu(display("account storage failed on `{stage}`: {source}"))]
    Storage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("account worker failed on `{stage}`: {source}"))]
    Worker {
        stage: &'static str,
        source: tokio::task::JoinError,
    },
}

pub type AccountResult<T> = Result<T, AccountError>;

/// Registration and login over a user store.
pub struct AccountService {
    users: Arc<dyn UserStore>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn register(&self, input: RegisterInput) -> AccountResult<UserProfile> {
        validate_registration(&input)?;

        let users = Arc::clone(&self.users);
        let email = input.email.trim().to_string();
        let record = tokio::task::spawn_blocking(move || -> AccountResult<UserRecord> {
            if users
                .find_user_by_email(&email)
                .context(StorageSnafu {
                    stage: "register-find-existing",
                })?
                .is_some()
            {
                return EmailTakenSnafu {
                    stage: "register-find-existing",
                    email,
                }
                .fail();
            }

            let password_hash = hash_password(&input.password)?;
            match users.insert_user(NewUser {
                name: input.name,
                email: email.clone(),
                password_hash,
                phone: input.phone,
                education: input.education,
                city: input.city,
            }) {
                Ok(record) => Ok(record),
                Err(StorageError::DuplicateEmail { .. }) => EmailTakenSnafu {
                    stage: "register-insert",
                    email,
                }
                .fail(),
                Err(source) => Err(AccountError::Storage {
                    stage: "register-insert",
                    source,
                }),
            }
        })
        .await
        .context(WorkerSnafu {
            stage: "register-join",
        })??;

        tracing::info!(user_id = %record.id, "account registered");
        Ok(record.into())
    }

    /// Unknown email and wrong password produce the same error.
    pub async fn authenticate(&self, email: &str, password: &str) -> AccountResult<UserProfile> {
        let users = Arc::clone(&self.users);
        let email = email.trim().to_string();
        let password = password.to_string();

        let record = tokio::task::spawn_blocking(move || -> AccountResult<UserRecord> {
            let Some(record) = users.find_user_by_email(&email).context(StorageSnafu {
                stage: "authenticate-find-user",
            })?
            else {
                return InvalidCredentialsSnafu {
                    stage: "authenticate-unknown-email",
                }
                .fail();
            };

            ensure!(
                verify_password(&password, &record.password_hash),
                InvalidCredentialsSnafu {
                    stage: "authenticate-verify-password",
                }
            );
            Ok(record)
        })
        .await
        .context(WorkerSnafu {
            stage: "authenticate-join",
        })??;

        tracing::info!(user_id = %record.id, "account authenticated");
        Ok(record.into())
    }
}

fn validate_registration(input: &RegisterInput) -> AccountResult<()> {
    ensure!(
        input.name.trim().chars().count() >= MIN_NAME_CHARS,
        ValidationSnafu {
            stage: "validate-registration",
            field: "name",
            details: format!("must be at least {MIN_NAME_CHARS} characters"),
        }
    );
    ensure!(
        is_valid_email(input.email.trim()),
        ValidationSnafu {
            stage: "validate-registration",
            field: "email",
            details: "must be a valid email address",
        }
    );
    ensure!(
        input.password.chars().count() >= MIN_PASSWORD_CHARS,
        ValidationSnafu {
            stage: "validate-registration",
            field: "password",
            details: format!("must be at least {MIN_PASSWORD_CHARS} characters"),
        }
    );
    ensure!(
        !input.education.trim().is_empty(),
        ValidationSnafu {
            stage: "validate-registration",
            field: "education",
            details: "is required",
        }
    );
    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

fn hash_password(password: &str) -> AccountResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| {
            PasswordHashSnafu {
                stage: "hash-password",
                details: error.to_string(),
            }
            .build()
        })
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(error) => {
            tracing::warn!(error = %error, "stored password hash is unreadable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use rozgar_storage::StorageResult;

    use super::*;

    #[derive(Default)]
    struct MemoryUserStore {
        users: Mutex<HashMap<String, UserRecord>>,
    }

    impl UserStore for MemoryUserStore {
        fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
            let users = match self.users.lock() {
                Ok(users) => users,
                Err(poisoned) => poisoned.into_inner(),
            };
            Ok(users.get(&email.to_ascii_lowercase()).cloned())
        }

        fn insert_user(&self, input: NewUser) -> StorageResult<UserRecord> {
            let mut users = match self.users.lock() {
                Ok(users) => users,
                Err(poisoned) => poisoned.into_inner(),
            };
            let key = input.email.to_ascii_lowercase();
            if users.contains_key(&key) {
                return Err(StorageError::DuplicateEmail {
                    stage: "memory-insert-user",
                    email: key,
                });
            }
            let record = UserRecord {
                id: UserId::new_v7(),
                name: input.name,
                email: input.email,
                password_hash: input.password_hash,
                phone: input.phone,
                education: input.education,
                city: input.city,
                created_at_unix_seconds: 0,
            };
            users.insert(key, record.clone());
            Ok(record)
        }
    }

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryUserStore::default()))
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            name: "Gurpreet Kaur".to_string(),
            email: email.to_string(),
            password: "punjab123".to_string(),
            phone: "+91-9876543210".to_string(),
            education: "Graduate".to_string(),
            city: "Ludhiana".to_string(),
        }
    }

    #[tokio::test]
    async fn registered_user_can_log_in() {
        let service = service();

        let registered = match service.register(input("gurpreet@example.com")).await {
            Ok(profile) => profile,
            Err(error) => panic!("registration should succeed: {error}"),
        };
        let authenticated = match service
            .authenticate("Gurpreet@Example.com", "punjab123")
            .await
        {
            Ok(profile) => profile,
            Err(error) => panic!("login should succeed: {error}"),
        };

        assert_eq!(registered, authenticated);
        assert_eq!(authenticated.city, "Ludhiana");
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let store = Arc::new(MemoryUserStore::default());
        let service = AccountService::new(store.clone());

        assert!(service.register(input("hash@example.com")).await.is_ok());

        let stored = store.find_user_by_email("hash@example.com");
        let Ok(Some(stored)) = stored else {
            panic!("user should be stored");
        };
        assert_ne!(stored.password_hash, "punjab123");
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let service = service();
        assert!(service.register(input("dup@example.com")).await.is_ok());

        let duplicate = service.register(input("DUP@example.com")).await;

        assert!(matches!(duplicate, Err(AccountError::EmailTaken { .. })));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let service = service();
        assert!(service.register(input("same@example.com")).await.is_ok());

        let unknown = service.authenticate("nobody@example.com", "punjab123").await;
        let wrong = service.authenticate("same@example.com", "wrong-password").await;

        let (Err(unknown), Err(wrong)) = (unknown, wrong) else {
            panic!("both logins should fail");
        };
        assert!(matches!(unknown, AccountError::InvalidCredentials { .. }));
        assert!(matches!(wrong, AccountError::InvalidCredentials { .. }));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn registration_fields_are_validated() {
        let service = service();
        let cases = [
            (
                RegisterInput {
                    name: "A".to_string(),
                    ..input("a@example.com")
                },
                "name",
            ),
            (input("not-an-email"), "email"),
            (
                RegisterInput {
                    password: "12345".to_string(),
                    ..input("b@example.com")
                },
                "password",
            ),
            (
                RegisterInput {
                    education: " ".to_string(),
                    ..input("c@example.com")
                },
                "education",
            ),
        ];

        for (input, expected_field) in cases {
            let result = service.register(input).await;
            assert!(
                matches!(result, Err(AccountError::Validation { field, .. }) if field == expected_field),
                "expected {expected_field} validation failure"
            );
        }
    }

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("user@mail.example.in"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }
}
