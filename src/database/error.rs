use std::fmt;

/// Database error kinds surfaced by the repositories
#[derive(Debug, Clone)]
pub enum DatabaseErrorKind {
    /// Connection pool is exhausted
    PoolExhausted,
    /// Connection timeout
    ConnectionTimeout,
    /// Record not found
    NotFound {
        entity: String,
        id: String,
    },
    /// Unique constraint violation (e.g. a reused order id)
    UniqueConstraintViolation {
        constraint: String,
    },
    /// Foreign key constraint violation
    ForeignKeyViolation {
        constraint: String,
    },
    /// Check constraint violation (e.g. non-positive amounts)
    CheckViolation {
        constraint: String,
    },
    /// Serializable transaction conflict or deadlock, safe to retry
    SerializationFailure {
        message: String,
    },
    /// Query execution error
    QueryError {
        message: String,
    },
    /// Transaction error
    TransactionError {
        message: String,
    },
    /// Database connection error
    ConnectionError {
        message: String,
    },
    /// Schema migration error
    MigrationError {
        message: String,
    },
    /// Configuration error
    ConfigError {
        message: String,
    },
    /// Unknown error
    Unknown {
        message: String,
    },
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;

#[derive(Debug, Clone)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub context: Option<String>,
    pub is_retryable: bool,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let is_retryable = matches!(
            kind,
            DatabaseErrorKind::ConnectionTimeout
                | DatabaseErrorKind::PoolExhausted
                | DatabaseErrorKind::ConnectionError { .. }
                | DatabaseErrorKind::SerializationFailure { .. }
        );

        Self {
            kind,
            context: None,
            is_retryable,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        })
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.is_retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::UniqueConstraintViolation { .. }
                | DatabaseErrorKind::ForeignKeyViolation { .. }
                | DatabaseErrorKind::CheckViolation { .. }
        )
    }

    /// Map SQLx error to our custom error type
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("Record", "unknown"),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolExhausted),
            sqlx::Error::PoolClosed => Self::new(DatabaseErrorKind::ConnectionError {
                message: "Connection pool is closed".to_string(),
            }),
            sqlx::Error::Configuration(msg) => Self::new(DatabaseErrorKind::ConfigError {
                message: msg.to_string(),
            }),
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.code().as_deref() {
                    Some("23505") => {
                        Self::new(DatabaseErrorKind::UniqueConstraintViolation { constraint })
                    }
                    Some("23503") => Self::new(DatabaseErrorKind::ForeignKeyViolation { constraint }),
                    Some("23514") => Self::new(DatabaseErrorKind::CheckViolation { constraint }),
                    // serialization_failure / deadlock_detected
                    Some("40001") | Some("40P01") => {
                        Self::new(DatabaseErrorKind::SerializationFailure {
                            message: db_err.message().to_string(),
                        })
                    }
                    _ => Self::new(DatabaseErrorKind::QueryError {
                        message: db_err.message().to_string(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Self::new(DatabaseErrorKind::ConnectionError {
                message: io_err.to_string(),
            }),
            sqlx::Error::Migrate(migrate_err) => Self::new(DatabaseErrorKind::MigrationError {
                message: migrate_err.to_string(),
            }),
            _ => Self::new(DatabaseErrorKind::Unknown {
                message: error.to_string(),
            }),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        Self::from_sqlx(error)
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::new(DatabaseErrorKind::MigrationError {
            message: error.to_string(),
        })
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match &self.kind {
            DatabaseErrorKind::PoolExhausted => {
                "Database connection pool exhausted. Please try again.".to_string()
            }
            DatabaseErrorKind::ConnectionTimeout => {
                "Database connection timed out. Please try again.".to_string()
            }
            DatabaseErrorKind::NotFound { entity, id } => {
                format!("{} with ID '{}' not found", entity, id)
            }
            DatabaseErrorKind::UniqueConstraintViolation { constraint } => {
                format!("Duplicate value violates unique constraint '{}'", constraint)
            }
            DatabaseErrorKind::ForeignKeyViolation { constraint } => {
                format!("Referenced record does not exist ({})", constraint)
            }
            DatabaseErrorKind::CheckViolation { constraint } => {
                format!("Value violates check constraint '{}'", constraint)
            }
            DatabaseErrorKind::SerializationFailure { message } => {
                format!("Concurrent update conflict: {}", message)
            }
            DatabaseErrorKind::QueryError { message } => {
                format!("Database query failed: {}", message)
            }
            DatabaseErrorKind::TransactionError { message } => {
                format!("Transaction failed: {}", message)
            }
            DatabaseErrorKind::ConnectionError { message } => {
                format!("Database connection error: {}", message)
            }
            DatabaseErrorKind::MigrationError { message } => {
                format!("Database migration failed: {}", message)
            }
            DatabaseErrorKind::ConfigError { message } => {
                format!("Database configuration error: {}", message)
            }
            DatabaseErrorKind::Unknown { message } => {
                format!("Unknown database error: {}", message)
            }
        };

        if let Some(context) = &self.context {
            write!(f, "{} ({})", message, context)
        } else {
            write!(f, "{}", message)
        }
    }
}

impl std::error::Error for DatabaseError {}

impl PartialEq for DatabaseError {
    fn eq(&self, other: &Self) -> bool {
        format!("{:?}", self.kind) == format!("{:?}", other.kind)
    }
}
