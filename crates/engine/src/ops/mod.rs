use sea_orm::{DatabaseConnection, DatabaseTransaction};

use crate::{EngineError, ResultEngine};

mod access;
mod accounts;
mod balances;
mod categories;
mod reports;
mod seed;
mod transactions;
mod visibility;

pub use accounts::AccountRemoval;
pub use balances::BalanceDiscrepancy;
pub use reports::{CategoryTotal, ChartPoint, ChartRange, DashboardStats, MonthlySummary};
pub use seed::SeedOutcome;
pub use transactions::{TransactionListFilter, TransactionPage};

/// Attempts made by a balance-writing operation before a stale read is
/// reported as a conflict.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The body must evaluate to a `ResultEngine<_>` without early returns, so
/// that every failure goes through the rollback.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err($crate::ops::rollback($tx, err).await),
        }
    }};
}

/// Like [`with_tx!`], re-running the whole unit of work when a balance write
/// lost a compare-and-set race.
macro_rules! with_retry {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let mut attempt = 1;
        loop {
            let result: $crate::ResultEngine<_> = $crate::ops::with_tx!($self, |$tx| $body);
            match result {
                Err($crate::EngineError::StaleBalance(account))
                    if attempt < $crate::ops::MAX_WRITE_ATTEMPTS =>
                {
                    tracing::debug!(attempt, %account, "balance changed concurrently, retrying");
                    attempt += 1;
                }
                Err($crate::EngineError::StaleBalance(account)) => {
                    tracing::warn!(attempt, %account, "giving up after concurrent balance updates");
                    break Err($crate::EngineError::Conflict(format!(
                        "account {account} was modified concurrently, retry the request"
                    )));
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use {with_retry, with_tx};

/// Rolls `db_tx` back and returns the error to report.
///
/// A failed rollback is logged and reported as [`EngineError::Persistence`]
/// carrying both errors.
pub(crate) async fn rollback(db_tx: DatabaseTransaction, err: EngineError) -> EngineError {
    match db_tx.rollback().await {
        Ok(()) => err,
        Err(rollback_err) => {
            tracing::error!(
                error = %err,
                rollback_error = %rollback_err,
                "rollback failed, balances need manual reconciliation"
            );
            EngineError::Persistence(format!("{err}; rollback failed: {rollback_err}"))
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
