use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    #[serde(alias = "income")]
    Income,
    #[serde(alias = "expense")]
    Expense,
    #[serde(alias = "transfer")]
    Transfer,
}

pub mod transaction {
    use super::*;

    /// Request body for creating or replacing a transaction.
    ///
    /// Which fields are required depends on `type`: INCOME and EXPENSE need
    /// `category_id`, TRANSFER needs `to_account_id` (its category is chosen
    /// by the server). The amount is given either in minor units or as a
    /// decimal string such as `"12.50"`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionPayload {
        #[serde(rename = "type")]
        pub kind: Option<String>,
        pub amount_minor: Option<i64>,
        pub amount: Option<String>,
        pub account_id: Option<Uuid>,
        pub to_account_id: Option<Uuid>,
        pub category_id: Option<Uuid>,
        pub description: Option<String>,
        /// RFC3339 timestamp.
        pub date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub success: bool,
        pub id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub amount_minor: i64,
        /// `amount_minor` formatted as a decimal.
        pub amount: String,
        pub account_id: Uuid,
        pub to_account_id: Option<Uuid>,
        pub category_id: Uuid,
        pub description: Option<String>,
        pub date: DateTime<Utc>,
        pub is_initial_balance: bool,
        pub created_at: DateTime<Utc>,
    }

    /// Query string of `GET /transactions`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionListQuery {
        pub account_id: Option<Uuid>,
        /// Inclusive lower bound.
        pub from: Option<DateTime<Utc>>,
        /// Exclusive upper bound.
        pub to: Option<DateTime<Utc>>,
        /// Comma-separated list of kinds, e.g. `INCOME,EXPENSE`.
        #[serde(rename = "type")]
        pub kinds: Option<String>,
        pub limit: Option<u64>,
        /// Opaque pagination cursor, from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }
}

pub mod account {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountType {
        Cash,
        Bank,
        Credit,
        Investment,
        Loan,
        Other,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AccountNew {
        pub name: String,
        /// Opening balance in minor units.
        pub balance_minor: Option<i64>,
        /// Opening balance as a decimal string; ignored when `balance_minor`
        /// is set.
        pub balance: Option<String>,
        pub account_type: Option<AccountType>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AccountUpdate {
        pub name: Option<String>,
        pub account_type: Option<AccountType>,
        pub balance_minor: Option<i64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: Uuid,
        pub name: String,
        pub account_type: Option<AccountType>,
        pub balance_minor: i64,
        pub balance: String,
        pub is_system: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountsResponse {
        pub accounts: Vec<AccountView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HiddenAccountView {
        pub account: AccountView,
        pub hidden_at: DateTime<Utc>,
    }

    /// Outcome of `DELETE /accounts/{id}`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AccountRemoval {
        Deleted,
        Hidden,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountDeleted {
        pub success: bool,
        pub removal: AccountRemoval,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub icon: Option<String>,
        pub color: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub name: Option<String>,
        pub icon: Option<String>,
        pub color: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub name: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub icon: String,
        pub color: String,
        pub is_system: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<CategoryView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct HiddenCategoryView {
        pub category: CategoryView,
        pub hidden_at: DateTime<Utc>,
    }
}

pub mod visibility {
    use super::*;

    /// Response of hide/unhide. `changed` is `false` when the request was a
    /// no-op.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VisibilityChanged {
        pub success: bool,
        pub changed: bool,
    }
}

pub mod report {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MonthlyQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryTotalView {
        pub category_id: Option<Uuid>,
        pub name: String,
        pub icon: String,
        pub color: String,
        pub total_minor: i64,
        pub count: u64,
        /// Share of the period total in basis points.
        pub share_bp: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MonthlySummaryView {
        pub from: NaiveDate,
        pub to: NaiveDate,
        pub days: i64,
        pub total_income_minor: i64,
        pub total_expense_minor: i64,
        pub net_minor: i64,
        pub daily_average_income_minor: i64,
        pub daily_average_expense_minor: i64,
        pub income_by_category: Vec<CategoryTotalView>,
        pub expense_by_category: Vec<CategoryTotalView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DashboardStatsView {
        pub total_balance_minor: i64,
        pub month_income_minor: i64,
        pub month_expense_minor: i64,
        pub last_month_income_minor: i64,
        pub last_month_expense_minor: i64,
        pub savings_rate_bp: i64,
        pub income_change_bp: i64,
        pub expense_change_bp: i64,
    }

    /// `range` is one of `1m`, `6m` (default), `1y` or `custom`; `custom`
    /// needs both dates.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ChartQuery {
        pub range: Option<String>,
        pub start_date: Option<NaiveDate>,
        pub end_date: Option<NaiveDate>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChartPointView {
        pub label: String,
        pub from: NaiveDate,
        pub to: NaiveDate,
        pub income_minor: i64,
        pub expense_minor: i64,
        pub savings_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ChartView {
        pub points: Vec<ChartPointView>,
    }
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserInitialized {
        pub already_initialized: bool,
        pub accounts_created: usize,
        pub categories_created: usize,
    }
}
