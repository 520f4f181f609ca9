//! Transaction primitives.
//!
//! A `Transaction` moves money into, out of, or between accounts. Its effect
//! on balances is fully determined by its kind, amount and accounts, see
//! [`balance_effects`].

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// The kind of a transaction. Categories are scoped by the same kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    #[serde(alias = "income")]
    Income,
    #[serde(alias = "expense")]
    Expense,
    #[serde(alias = "transfer")]
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::Transfer => "TRANSFER",
        }
    }

    /// `true` for kinds that take money out of their source account.
    pub fn debits_source(self) -> bool {
        matches!(self, Self::Expense | Self::Transfer)
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Ok(Self::Income),
            "EXPENSE" => Ok(Self::Expense),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(EngineError::Validation(format!(
                "invalid transaction type: {value}"
            ))),
        }
    }
}

/// Signed balance changes a transaction applies, as `(account, delta)` pairs.
///
/// - INCOME: `+amount` on the source.
/// - EXPENSE: `-amount` on the source.
/// - TRANSFER: `-amount` on the source, `+amount` on the destination.
pub(crate) fn balance_effects(
    kind: TransactionKind,
    amount_minor: i64,
    account_id: Uuid,
    to_account_id: Option<Uuid>,
) -> Vec<(Uuid, i64)> {
    match (kind, to_account_id) {
        (TransactionKind::Income, _) => vec![(account_id, amount_minor)],
        (TransactionKind::Expense, _) => vec![(account_id, -amount_minor)],
        (TransactionKind::Transfer, Some(to)) => {
            vec![(account_id, -amount_minor), (to, amount_minor)]
        }
        (TransactionKind::Transfer, None) => vec![(account_id, -amount_minor)],
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    /// Source account.
    pub account_id: Uuid,
    /// Destination account, TRANSFER only.
    pub to_account_id: Option<Uuid>,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Opening balance of an account, posted on its creation.
    pub is_initial_balance: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn effects(&self) -> Vec<(Uuid, i64)> {
        balance_effects(
            self.kind,
            self.amount_minor,
            self.account_id,
            self.to_account_id,
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub account_id: String,
    pub to_account_id: Option<String>,
    pub category_id: String,
    pub description: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub is_initial_balance: bool,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            account_id: parse_uuid(&model.account_id, "account")?,
            to_account_id: model
                .to_account_id
                .as_deref()
                .map(|id| parse_uuid(id, "account"))
                .transpose()?,
            category_id: parse_uuid(&model.category_id, "category")?,
            description: model.description,
            occurred_at: model.occurred_at,
            is_initial_balance: model.is_initial_balance,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
