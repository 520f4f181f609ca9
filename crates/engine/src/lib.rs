//! Ledger core: accounts, categories, transactions and the rules that keep
//! account balances equal to the transactions posted on them.
//!
//! Every operation takes the id of the authenticated user and answers with a
//! [`ResultEngine`]. Balance-changing operations run in a single database
//! transaction and are retried when another writer changed a balance in the
//! meantime.

pub use accounts::{Account, AccountType};
pub use categories::Category;
pub use commands::{
    AccountPatch, CategoryPatch, CreateAccountCmd, CreateCategoryCmd, Posting, TransactionDraft,
    TransactionFields,
};
pub use error::{EngineError, ErrorKind};
pub use hidden::{HiddenResource, ResourceKind};
pub use money::Money;
pub use ops::{
    AccountRemoval, BalanceDiscrepancy, CategoryTotal, ChartPoint, ChartRange, DashboardStats,
    Engine, EngineBuilder, MonthlySummary, SeedOutcome, TransactionListFilter, TransactionPage,
};
pub use templates::{AccountTemplate, CategoryTemplate, SeedTemplates};
pub use transactions::{Transaction, TransactionKind};

mod accounts;
mod categories;
mod commands;
mod error;
mod hidden;
mod money;
mod ops;
mod templates;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
