use std::collections::{BTreeMap, HashMap};

use sea_orm::{Condition, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, Transaction, accounts, transactions};

use super::Engine;

/// Balance changes staged by one write operation.
///
/// Every account enters the plan with the balance read from storage; deltas
/// accumulate on top of it. An account touched by both the reversal of an
/// old transaction and the effect of its replacement ends up with a single
/// net write, and an account whose deltas cancel out is not written at all.
#[derive(Debug, Default)]
pub(super) struct BalancePlan {
    accounts: BTreeMap<Uuid, PlannedBalance>,
}

#[derive(Clone, Copy, Debug)]
struct PlannedBalance {
    read: i64,
    target: i64,
}

impl BalancePlan {
    /// Registers the stored balance of an account. Only the first read of an
    /// account counts.
    pub(super) fn track(&mut self, account: &accounts::Model) -> ResultEngine<()> {
        let account_id = Uuid::parse_str(&account.id)
            .map_err(|_| EngineError::Persistence(format!("invalid account id {}", account.id)))?;
        self.accounts.entry(account_id).or_insert(PlannedBalance {
            read: account.balance,
            target: account.balance,
        });
        Ok(())
    }

    /// Applies signed `(account, delta)` effects, negated when `reverse`.
    pub(super) fn apply(&mut self, effects: &[(Uuid, i64)], reverse: bool) -> ResultEngine<()> {
        for &(account_id, delta) in effects {
            let planned = self.accounts.get_mut(&account_id).ok_or_else(|| {
                EngineError::Persistence(format!("account {account_id} has no balance loaded"))
            })?;
            let delta = if reverse { -delta } else { delta };
            planned.target = planned
                .target
                .checked_add(delta)
                .ok_or_else(|| EngineError::Validation("balance out of range".to_string()))?;
        }
        Ok(())
    }

    /// Planned final balance of a tracked account.
    pub(super) fn balance(&self, account_id: Uuid) -> Option<i64> {
        self.accounts.get(&account_id).map(|planned| planned.target)
    }

    /// Fails when debiting `amount_minor` leaves `account_id` below zero.
    ///
    /// The plan must already contain the debit.
    pub(super) fn ensure_sufficient(&self, account_id: Uuid, amount_minor: i64) -> ResultEngine<()> {
        let Some(final_balance) = self.balance(account_id) else {
            return Err(EngineError::Persistence(format!(
                "account {account_id} has no balance loaded"
            )));
        };
        if final_balance < 0 {
            let available = final_balance + amount_minor;
            return Err(EngineError::InsufficientBalance(format!(
                "insufficient balance in source account: available {}, required {}",
                Money::new(available),
                Money::new(amount_minor)
            )));
        }
        Ok(())
    }

    /// `(account, read, target)` for every account whose balance changes.
    fn changes(&self) -> impl Iterator<Item = (Uuid, i64, i64)> + '_ {
        self.accounts
            .iter()
            .filter(|(_, planned)| planned.read != planned.target)
            .map(|(id, planned)| (*id, planned.read, planned.target))
    }
}

/// An owned account whose stored balance disagrees with its transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub account_id: Uuid,
    pub name: String,
    pub stored_minor: i64,
    pub expected_minor: i64,
}

impl Engine {
    /// Writes the planned balances with compare-and-set updates.
    ///
    /// A row whose balance no longer matches the value read yields
    /// [`EngineError::StaleBalance`], which makes `with_retry!` start over.
    pub(super) async fn persist_balances(
        &self,
        db_tx: &DatabaseTransaction,
        plan: &BalancePlan,
    ) -> ResultEngine<()> {
        for (account_id, read, target) in plan.changes() {
            let result = accounts::Entity::update_many()
                .col_expr(accounts::Column::Balance, Expr::value(target))
                .filter(accounts::Column::Id.eq(account_id.to_string()))
                .filter(accounts::Column::Balance.eq(read))
                .exec(db_tx)
                .await
                .map_err(|err| {
                    tracing::error!(
                        %account_id,
                        read,
                        target,
                        error = %err,
                        "balance write failed"
                    );
                    EngineError::Persistence(format!(
                        "failed to update balance of account {account_id}: {err}"
                    ))
                })?;
            if result.rows_affected == 0 {
                return Err(EngineError::StaleBalance(account_id.to_string()));
            }
        }
        Ok(())
    }

    /// Replays every transaction touching the caller's accounts and reports
    /// the accounts whose stored balance differs from the replayed one.
    ///
    /// Read-only: nothing is repaired.
    pub async fn audit_balances(&self, user_id: &str) -> ResultEngine<Vec<BalanceDiscrepancy>> {
        let owned: Vec<accounts::Model> = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?;
        let ids: Vec<String> = owned.iter().map(|model| model.id.clone()).collect();

        let tx_models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::AccountId.is_in(ids.clone()))
                    .add(transactions::Column::ToAccountId.is_in(ids)),
            )
            .all(&self.database)
            .await?;

        let mut expected: HashMap<Uuid, i64> = HashMap::new();
        for model in tx_models {
            let tx = Transaction::try_from(model)?;
            for (account_id, delta) in tx.effects() {
                *expected.entry(account_id).or_default() += delta;
            }
        }

        let mut out = Vec::new();
        for model in owned {
            let account = crate::Account::try_from(model)?;
            let expected_minor = expected.get(&account.id).copied().unwrap_or_default();
            if expected_minor != account.balance_minor {
                tracing::warn!(
                    account_id = %account.id,
                    stored = account.balance_minor,
                    expected = expected_minor,
                    "balance drift detected"
                );
                out.push(BalanceDiscrepancy {
                    account_id: account.id,
                    name: account.name,
                    stored_minor: account.balance_minor,
                    expected_minor,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn account(balance: i64) -> (Uuid, accounts::Model) {
        let id = Uuid::new_v4();
        let model = accounts::Model {
            id: id.to_string(),
            user_id: Some("alice".to_string()),
            name: "Cash".to_string(),
            name_norm: "cash".to_string(),
            account_type: None,
            balance,
            is_system: false,
            created_at: Utc::now(),
        };
        (id, model)
    }

    #[test]
    fn reversal_and_reapply_on_same_account_net_out() {
        let (x, x_model) = account(800);
        let mut plan = BalancePlan::default();
        plan.track(&x_model).unwrap();
        plan.apply(&[(x, -200)], true).unwrap();
        // Tracking again must not reset the reverted balance.
        plan.track(&x_model).unwrap();
        plan.apply(&[(x, -500)], false).unwrap();

        assert_eq!(plan.balance(x), Some(500));
        assert_eq!(plan.changes().collect::<Vec<_>>(), vec![(x, 800, 500)]);
    }

    #[test]
    fn identical_replacement_writes_nothing() {
        let (x, x_model) = account(500);
        let (y, y_model) = account(300);
        let effects = [(x, -300), (y, 300)];
        let mut plan = BalancePlan::default();
        plan.track(&x_model).unwrap();
        plan.track(&y_model).unwrap();
        plan.apply(&effects, true).unwrap();
        plan.apply(&effects, false).unwrap();

        assert_eq!(plan.changes().count(), 0);
    }

    #[test]
    fn overdraw_is_reported_with_available_amount() {
        let (x, x_model) = account(800);
        let mut plan = BalancePlan::default();
        plan.track(&x_model).unwrap();
        plan.apply(&[(x, -900)], false).unwrap();

        let err = plan.ensure_sufficient(x, 900).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientBalance(
                "insufficient balance in source account: available 8.00, required 9.00"
                    .to_string()
            )
        );
    }

    #[test]
    fn untracked_accounts_are_rejected() {
        let mut plan = BalancePlan::default();
        assert!(plan.apply(&[(Uuid::new_v4(), 1)], false).is_err());
    }
}
