//! Command structs for engine operations.
//!
//! Transaction payloads arrive loosely typed ([`TransactionFields`]) and are
//! validated once into a [`TransactionDraft`], whose [`Posting`] makes the
//! per-kind account/category requirements unrepresentable when violated.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{AccountType, EngineError, ResultEngine, TransactionKind, util::normalize_optional_text};

/// Raw transaction payload, as received from callers.
#[derive(Clone, Debug, Default)]
pub struct TransactionFields {
    pub kind: Option<String>,
    pub amount_minor: Option<i64>,
    pub account_id: Option<Uuid>,
    pub to_account_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Which accounts (and category) a transaction touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posting {
    Income { account_id: Uuid, category_id: Uuid },
    Expense { account_id: Uuid, category_id: Uuid },
    /// The category is resolved by the engine.
    Transfer { from_account_id: Uuid, to_account_id: Uuid },
}

impl Posting {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Income { .. } => TransactionKind::Income,
            Self::Expense { .. } => TransactionKind::Expense,
            Self::Transfer { .. } => TransactionKind::Transfer,
        }
    }

    /// Source account.
    pub fn account_id(&self) -> Uuid {
        match *self {
            Self::Income { account_id, .. } | Self::Expense { account_id, .. } => account_id,
            Self::Transfer { from_account_id, .. } => from_account_id,
        }
    }

    pub fn to_account_id(&self) -> Option<Uuid> {
        match *self {
            Self::Transfer { to_account_id, .. } => Some(to_account_id),
            _ => None,
        }
    }

    /// Caller-chosen category; `None` for transfers.
    pub fn category_id(&self) -> Option<Uuid> {
        match *self {
            Self::Income { category_id, .. } | Self::Expense { category_id, .. } => {
                Some(category_id)
            }
            Self::Transfer { .. } => None,
        }
    }
}

/// A validated transaction payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDraft {
    pub posting: Posting,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TransactionDraft {
    #[must_use]
    pub fn income(
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Posting::Income {
                account_id,
                category_id,
            },
            amount_minor,
            occurred_at,
        )
    }

    #[must_use]
    pub fn expense(
        account_id: Uuid,
        category_id: Uuid,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Posting::Expense {
                account_id,
                category_id,
            },
            amount_minor,
            occurred_at,
        )
    }

    #[must_use]
    pub fn transfer(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount_minor: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Posting::Transfer {
                from_account_id,
                to_account_id,
            },
            amount_minor,
            occurred_at,
        )
    }

    fn new(posting: Posting, amount_minor: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            posting,
            amount_minor,
            description: None,
            occurred_at,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> TransactionKind {
        self.posting.kind()
    }

    /// Checks the invariants the builder constructors cannot enforce.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        if self.amount_minor <= 0 {
            return Err(EngineError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if let Posting::Transfer {
            from_account_id,
            to_account_id,
        } = self.posting
            && from_account_id == to_account_id
        {
            return Err(EngineError::Validation(
                "cannot transfer to same account".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<TransactionFields> for TransactionDraft {
    type Error = EngineError;

    fn try_from(fields: TransactionFields) -> ResultEngine<Self> {
        let kind = fields
            .kind
            .as_deref()
            .ok_or_else(|| EngineError::Validation("transaction type is required".to_string()))
            .and_then(TransactionKind::try_from)?;
        let amount_minor = fields
            .amount_minor
            .ok_or_else(|| EngineError::Validation("amount is required".to_string()))?;
        let account_id = fields
            .account_id
            .ok_or_else(|| EngineError::Validation("account is required".to_string()))?;
        let occurred_at = fields
            .occurred_at
            .ok_or_else(|| EngineError::Validation("date is required".to_string()))?;

        let posting = match kind {
            TransactionKind::Income | TransactionKind::Expense => {
                let category_id = fields.category_id.ok_or_else(|| {
                    EngineError::Validation(
                        "category is required for income and expense".to_string(),
                    )
                })?;
                if kind == TransactionKind::Income {
                    Posting::Income {
                        account_id,
                        category_id,
                    }
                } else {
                    Posting::Expense {
                        account_id,
                        category_id,
                    }
                }
            }
            TransactionKind::Transfer => {
                let to_account_id = fields.to_account_id.ok_or_else(|| {
                    EngineError::Validation("destination account is required".to_string())
                })?;
                Posting::Transfer {
                    from_account_id: account_id,
                    to_account_id,
                }
            }
        };

        let draft = Self {
            posting,
            amount_minor,
            description: normalize_optional_text(fields.description.as_deref()),
            occurred_at,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Create an account owned by `user_id`.
#[derive(Clone, Debug)]
pub struct CreateAccountCmd {
    pub user_id: String,
    pub name: String,
    /// Posted as an initial-balance INCOME when positive.
    pub opening_balance_minor: i64,
    pub account_type: Option<AccountType>,
}

impl CreateAccountCmd {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        opening_balance_minor: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            opening_balance_minor,
            account_type: None,
        }
    }

    #[must_use]
    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }
}

/// Partial account update. `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub account_type: Option<AccountType>,
    /// Target balance; reconciled through the initial-balance transaction.
    pub balance_minor: Option<i64>,
}

/// Create a category owned by `user_id`.
#[derive(Clone, Debug)]
pub struct CreateCategoryCmd {
    pub user_id: String,
    pub name: String,
    pub kind: TransactionKind,
    pub icon: Option<String>,
    pub color: Option<String>,
}

impl CreateCategoryCmd {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, kind: TransactionKind) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            kind,
            icon: None,
            color: None,
        }
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Partial category update. The kind is immutable.
#[derive(Clone, Debug, Default)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}
