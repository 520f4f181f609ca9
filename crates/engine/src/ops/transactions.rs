use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{EngineError, ResultEngine, Transaction, TransactionKind, accounts, transactions};

use super::Engine;

mod write;

const DEFAULT_LIST_LIMIT: u64 = 50;
const MAX_LIST_LIMIT: u64 = 500;

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug)]
pub struct TransactionListFilter {
    /// Only transactions touching this account (as source or destination).
    pub account_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<TransactionKind>>,
    /// Page size, capped at 500.
    pub limit: u64,
    /// Opaque cursor returned by the previous page.
    pub cursor: Option<String>,
}

impl Default for TransactionListFilter {
    fn default() -> Self {
        Self {
            account_id: None,
            from: None,
            to: None,
            kinds: None,
            limit: DEFAULT_LIST_LIMIT,
            cursor: None,
        }
    }
}

/// One page of transactions, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub next_cursor: Option<String>,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::Validation(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::Validation(
            "kinds must not be empty".to_string(),
        ));
    }
    if filter.limit == 0 {
        return Err(EngineError::Validation("limit must be > 0".to_string()));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    occurred_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::Validation("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::Validation("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::Validation("invalid transactions cursor".to_string()))
    }
}

impl Engine {
    /// Return a single transaction whose source account the caller owns.
    pub async fn transaction(&self, transaction_id: Uuid, user_id: &str) -> ResultEngine<Transaction> {
        let (model, _) = self
            .require_owned_transaction(&self.database, transaction_id, user_id)
            .await?;
        Transaction::try_from(model)
    }

    /// Lists the caller's transactions with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, transaction_id
    /// DESC)`.
    pub async fn list_transactions(
        &self,
        user_id: &str,
        filter: &TransactionListFilter,
    ) -> ResultEngine<TransactionPage> {
        validate_list_filter(filter)?;
        let limit = filter.limit.min(MAX_LIST_LIMIT);

        let owned: Vec<String> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .filter(accounts::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.database)
            .await?;

        let mut query = transactions::Entity::find()
            .filter(transactions::Column::AccountId.is_in(owned))
            .order_by_desc(transactions::Column::OccurredAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit.saturating_add(1));

        if let Some(account_id) = filter.account_id {
            let account = self
                .require_visible_account(&self.database, account_id, user_id)
                .await?;
            query = query.filter(
                Condition::any()
                    .add(transactions::Column::AccountId.eq(account.id.clone()))
                    .add(transactions::Column::ToAccountId.eq(account.id)),
            );
        }
        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::OccurredAt.lt(to));
        }
        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            query = query.filter(transactions::Column::Kind.is_in(kinds));
        }
        if let Some(cursor) = filter.cursor.as_deref() {
            let cursor = TransactionsCursor::decode(cursor)?;
            query = query.filter(
                Condition::any()
                    .add(transactions::Column::OccurredAt.lt(cursor.occurred_at))
                    .add(
                        Condition::all()
                            .add(transactions::Column::OccurredAt.eq(cursor.occurred_at))
                            .add(transactions::Column::Id.lt(cursor.transaction_id)),
                    ),
            );
        }

        let models = query.all(&self.database).await?;
        let has_more = models.len() as u64 > limit;

        let items = models
            .into_iter()
            .take(limit as usize)
            .map(Transaction::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let next_cursor = match items.last() {
            Some(last) if has_more => Some(
                TransactionsCursor {
                    occurred_at: last.occurred_at,
                    transaction_id: last.id.to_string(),
                }
                .encode()?,
            ),
            _ => None,
        };

        Ok(TransactionPage { items, next_cursor })
    }
}
