use sea_orm::{
    ActiveModelTrait, ActiveValue, Condition, DatabaseTransaction, PaginatorTrait, QueryFilter,
    TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Account, AccountPatch, AccountType, CreateAccountCmd, EngineError, ResultEngine,
    TransactionDraft, accounts, transactions,
    util::{name_key, normalize_required_name, parse_uuid},
};

use super::{Engine, balances::BalancePlan, with_retry};

const INITIAL_BALANCE_DESCRIPTION: &str = "Initial balance";

/// Rows that count as the opening balance of `account_id`: flagged INCOME
/// postings on the account itself.
fn opening_balance_of(account_id: &str) -> Condition {
    Condition::all()
        .add(transactions::Column::IsInitialBalance.eq(true))
        .add(transactions::Column::Kind.eq(crate::TransactionKind::Income.as_str()))
        .add(transactions::Column::AccountId.eq(account_id))
        .add(transactions::Column::ToAccountId.is_null())
}

/// What [`Engine::delete_account`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRemoval {
    Deleted,
    /// System accounts are hidden for the caller instead of deleted.
    Hidden,
}

impl Engine {
    /// Return an account the caller can see.
    pub async fn account(&self, account_id: Uuid, user_id: &str) -> ResultEngine<Account> {
        let model = self
            .require_visible_account(&self.database, account_id, user_id)
            .await?;
        Account::try_from(model)
    }

    /// Add a new account owned by the caller.
    ///
    /// The account starts at zero. A positive `opening_balance_minor` is then
    /// posted as an INCOME flagged `is_initial_balance` against the
    /// "Initial Balance" category, so the balance always equals the sum of
    /// the account's transactions.
    pub async fn create_account(&self, cmd: CreateAccountCmd) -> ResultEngine<Account> {
        let name = normalize_required_name(&cmd.name, "account")?;
        if cmd.opening_balance_minor < 0 {
            return Err(EngineError::Validation(
                "opening balance must be >= 0".to_string(),
            ));
        }

        let account = with_retry!(self, |db_tx| {
            self.open_account(
                &db_tx,
                &cmd.user_id,
                &name,
                cmd.account_type,
                cmd.opening_balance_minor,
                false,
            )
            .await
        })?;
        tracing::info!(account_id = %account.id, "account created");
        Ok(account)
    }

    /// Rename, retype or rebalance an account the caller owns.
    ///
    /// A balance change is recorded on the account's initial-balance
    /// transaction, whose amount moves by `target - current`. The change is
    /// rejected when it would make that amount negative.
    pub async fn update_account(
        &self,
        account_id: Uuid,
        patch: AccountPatch,
        user_id: &str,
    ) -> ResultEngine<Account> {
        let name = patch
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "account"))
            .transpose()?;
        if patch.balance_minor.is_some_and(|balance| balance < 0) {
            return Err(EngineError::Validation(
                "balance must be >= 0".to_string(),
            ));
        }

        with_retry!(self, |db_tx| {
            self.apply_account_patch(
                &db_tx,
                account_id,
                user_id,
                name.as_deref(),
                patch.account_type,
                patch.balance_minor,
            )
            .await
        })
    }

    /// Delete an account the caller owns, or hide it when it is a system
    /// account.
    ///
    /// Accounts with transaction history other than their initial balance
    /// cannot be deleted. The initial-balance transaction is deleted along
    /// with the account.
    pub async fn delete_account(
        &self,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<AccountRemoval> {
        let removal = with_retry!(self, |db_tx| {
            self.remove_account(&db_tx, account_id, user_id).await
        })?;
        tracing::info!(%account_id, ?removal, "account removed");
        Ok(removal)
    }

    /// Inserts an account and posts its opening balance.
    pub(super) async fn open_account(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        name: &str,
        account_type: Option<AccountType>,
        opening_balance_minor: i64,
        is_system: bool,
    ) -> ResultEngine<Account> {
        let name_norm = name_key(name);
        let exists = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .filter(accounts::Column::NameNorm.eq(name_norm.clone()))
            .one(db_tx)
            .await?
            .is_some();
        if exists {
            return Err(EngineError::Conflict(format!(
                "account '{name}' already exists"
            )));
        }

        let model = accounts::new_row(Some(user_id), name, name_norm, account_type, is_system)
            .insert(db_tx)
            .await?;
        let account_id = parse_uuid(&model.id, "account")?;

        if opening_balance_minor > 0 {
            let category_id = self.initial_balance_category(db_tx, user_id).await?;
            let category_id = parse_uuid(&category_id, "category")?;
            let draft = TransactionDraft::income(
                account_id,
                category_id,
                opening_balance_minor,
                model.created_at,
            )
            .description(INITIAL_BALANCE_DESCRIPTION);
            self.post_transaction(db_tx, user_id, &draft, true).await?;
        }

        let model = accounts::Entity::find_by_id(model.id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("account not found".to_string()))?;
        Account::try_from(model)
    }

    async fn apply_account_patch(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
        name: Option<&str>,
        account_type: Option<AccountType>,
        balance_minor: Option<i64>,
    ) -> ResultEngine<Account> {
        let model = self
            .require_visible_account(db_tx, account_id, user_id)
            .await?;
        if !model.owned_by(user_id) {
            return Err(EngineError::Unauthorized(
                "account not found or unauthorized".to_string(),
            ));
        }

        if let Some(target) = balance_minor
            && target != model.balance
        {
            self.rebalance(db_tx, &model, user_id, target).await?;
        }

        let mut active = accounts::ActiveModel {
            id: ActiveValue::Unchanged(model.id.clone()),
            ..Default::default()
        };
        let mut changed = false;
        if let Some(name) = name {
            let name_norm = name_key(name);
            if name_norm != model.name_norm {
                let taken = accounts::Entity::find()
                    .filter(accounts::Column::UserId.eq(user_id))
                    .filter(accounts::Column::NameNorm.eq(name_norm.clone()))
                    .one(db_tx)
                    .await?
                    .is_some();
                if taken {
                    return Err(EngineError::Conflict(format!(
                        "account '{name}' already exists"
                    )));
                }
            }
            active.name = ActiveValue::Set(name.to_string());
            active.name_norm = ActiveValue::Set(name_norm);
            changed = true;
        }
        if let Some(account_type) = account_type {
            active.account_type = ActiveValue::Set(Some(account_type.as_str().to_string()));
            changed = true;
        }
        if changed {
            active.update(db_tx).await?;
        }

        let model = accounts::Entity::find_by_id(model.id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("account not found".to_string()))?;
        Account::try_from(model)
    }

    /// Moves an account to `target` by adjusting its initial-balance
    /// transaction.
    async fn rebalance(
        &self,
        db_tx: &DatabaseTransaction,
        account: &accounts::Model,
        user_id: &str,
        target: i64,
    ) -> ResultEngine<()> {
        let delta = target - account.balance;
        let initial = transactions::Entity::find()
            .filter(opening_balance_of(&account.id))
            .one(db_tx)
            .await?;
        let current_initial = initial.as_ref().map_or(0, |tx| tx.amount_minor);
        let new_initial = current_initial + delta;
        if new_initial < 0 {
            return Err(EngineError::Validation(format!(
                "balance cannot be set below what the account's transactions account for (minimum {})",
                crate::Money::new(account.balance - current_initial)
            )));
        }

        match (initial, new_initial) {
            (Some(initial), 0) => {
                transactions::Entity::delete_by_id(initial.id)
                    .exec(db_tx)
                    .await?;
            }
            (Some(initial), amount) => {
                let mut row: transactions::ActiveModel = initial.into();
                row.amount_minor = ActiveValue::Set(amount);
                row.update(db_tx).await?;
            }
            (None, amount) => {
                let category_id = self.initial_balance_category(db_tx, user_id).await?;
                transactions::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    kind: ActiveValue::Set(crate::TransactionKind::Income.as_str().to_string()),
                    amount_minor: ActiveValue::Set(amount),
                    account_id: ActiveValue::Set(account.id.clone()),
                    to_account_id: ActiveValue::Set(None),
                    category_id: ActiveValue::Set(category_id),
                    description: ActiveValue::Set(Some(INITIAL_BALANCE_DESCRIPTION.to_string())),
                    occurred_at: ActiveValue::Set(account.created_at),
                    is_initial_balance: ActiveValue::Set(true),
                    created_by: ActiveValue::Set(user_id.to_string()),
                    created_at: ActiveValue::Set(chrono::Utc::now()),
                }
                .insert(db_tx)
                .await?;
            }
        }

        let account_id = parse_uuid(&account.id, "account")?;
        let mut plan = BalancePlan::default();
        plan.track(account)?;
        plan.apply(&[(account_id, delta)], false)?;
        self.persist_balances(db_tx, &plan).await?;
        tracing::debug!(%account_id, delta, new_initial, "account rebalanced");
        Ok(())
    }

    async fn remove_account(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<AccountRemoval> {
        let model = self
            .require_visible_account(db_tx, account_id, user_id)
            .await?;
        if model.is_system {
            self.insert_hidden(db_tx, user_id, crate::ResourceKind::Account, &model.id)
                .await?;
            return Ok(AccountRemoval::Hidden);
        }
        if !model.owned_by(user_id) {
            return Err(EngineError::Unauthorized(
                "account not found or unauthorized".to_string(),
            ));
        }

        let history = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::AccountId.eq(model.id.clone()))
                    .add(transactions::Column::ToAccountId.eq(model.id.clone())),
            )
            .filter(opening_balance_of(&model.id).not())
            .count(db_tx)
            .await?;
        if history > 0 {
            return Err(EngineError::Conflict(format!(
                "account has transaction history ({history} transaction(s))"
            )));
        }

        transactions::Entity::delete_many()
            .filter(opening_balance_of(&model.id))
            .exec(db_tx)
            .await?;
        accounts::Entity::delete_by_id(model.id).exec(db_tx).await?;
        Ok(AccountRemoval::Deleted)
    }
}
