//! Database transaction utilities
//!
//! Multi-row store operations (workspace creation, membership changes, reaction toggles)
//! run inside a [`TransactionGuard`]. A guard dropped without `commit` is rolled back by
//! sqlx when the underlying transaction is dropped.

use sqlx::{PgPool, Postgres, Transaction};
use std::ops::{Deref, DerefMut};
use tandem_core::AppError;

/// A database transaction wrapper with `AppError`-typed commit/rollback
///
/// # Example
///
/// ```ignore
/// use tandem_db::db::transaction::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), tandem_core::AppError> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("INSERT INTO ...").execute(&mut **tx).await?;
///     tx.commit().await
/// }
/// ```
pub struct TransactionGuard<'a> {
    transaction: Transaction<'a, Postgres>,
}

impl<'a> TransactionGuard<'a> {
    /// Begin a new database transaction
    pub async fn begin(pool: &'a PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin database transaction");
            AppError::Database(e)
        })?;

        Ok(Self { transaction })
    }

    /// Commit the transaction
    pub async fn commit(self) -> Result<(), AppError> {
        self.transaction.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit database transaction");
            AppError::Database(e)
        })
    }

    /// Rollback the transaction
    pub async fn rollback(self) -> Result<(), AppError> {
        self.transaction.rollback().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to rollback database transaction");
            AppError::Database(e)
        })
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}
