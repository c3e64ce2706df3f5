use thiserror::Error;

/// AppError
///
/// The classified failure of a single store or service operation. Every handler
/// turns one of these into a `{code: 0, msg}` envelope (see `envelope::render`);
/// only `Auth` escapes that rule, because it is raised by the gate before any
/// handler runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// The referenced article is absent or soft-deleted.
    #[error("{0}")]
    NotFound(String),

    #[error("username is already taken")]
    DuplicateUser,

    #[error("username is not registered")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    /// Missing, malformed or expired token. Carries the verification message.
    #[error("{0}")]
    Auth(String),

    /// Unclassified engine failure, reported with the raw driver text.
    #[error("{0}")]
    Storage(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn article_not_found() -> Self {
        Self::NotFound("article not found".to_string())
    }
}

/// Unique-constraint violations are the registration race; everything else is
/// passed through verbatim.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::DuplicateUser;
            }
        }
        tracing::error!(error = %err, "storage failure");
        AppError::Storage(err.to_string())
    }
}
