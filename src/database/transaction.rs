use crate::database::error::{DatabaseError, DatabaseErrorKind};
use sqlx::postgres::PgConnection;
use sqlx::Transaction as SqlxTransaction;
use sqlx::{PgPool, Postgres};
use tracing::{debug, error as log_error};

/// Database transaction wrapper for atomic operations.
///
/// Dropping an uncommitted transaction rolls it back and returns the
/// connection to the pool, so early returns via `?` never leave partial
/// writes behind.
pub struct DatabaseTransaction {
    transaction: Option<SqlxTransaction<'static, Postgres>>,
    label: &'static str,
}

impl DatabaseTransaction {
    /// Begin a new transaction
    pub async fn begin(pool: &PgPool, label: &'static str) -> Result<Self, DatabaseError> {
        debug!(label, "Beginning database transaction");

        let transaction = pool.begin().await.map_err(|e| {
            log_error!(label, "Failed to begin transaction: {}", e);
            DatabaseError::from_sqlx(e).with_context(label)
        })?;

        Ok(Self {
            transaction: Some(transaction),
            label,
        })
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        let tx = self.transaction.take().ok_or_else(|| self.completed_error())?;
        debug!(label = self.label, "Committing transaction");

        tx.commit().await.map_err(|e| {
            log_error!(label = self.label, "Failed to commit transaction: {}", e);
            DatabaseError::from_sqlx(e).with_context(self.label)
        })
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        let tx = self.transaction.take().ok_or_else(|| self.completed_error())?;
        debug!(label = self.label, "Rolling back transaction");

        tx.rollback().await.map_err(|e| {
            log_error!(label = self.label, "Failed to rollback transaction: {}", e);
            DatabaseError::from_sqlx(e).with_context(self.label)
        })
    }

    /// Connection to run queries on inside this transaction
    pub fn conn(&mut self) -> Result<&mut PgConnection, DatabaseError> {
        let label = self.label;
        match self.transaction.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(DatabaseError::new(DatabaseErrorKind::TransactionError {
                message: "Transaction already completed".to_string(),
            })
            .with_context(label)),
        }
    }

    fn completed_error(&self) -> DatabaseError {
        DatabaseError::new(DatabaseErrorKind::TransactionError {
            message: "Transaction already completed".to_string(),
        })
        .with_context(self.label)
    }
}
