use sea_orm::{ActiveModelTrait, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{EngineError, Posting, ResultEngine, Transaction, TransactionDraft, transactions};

use super::super::super::{Engine, balances::BalancePlan, with_retry};
use super::fill_row;

impl Engine {
    /// Replace every field of a transaction and move balances accordingly.
    ///
    /// The old effect is reversed and the new one applied on a single plan,
    /// so an account touched by both gets one net write. Replacing a
    /// transaction with identical values leaves every balance untouched.
    /// The balance check runs on the new source after the reversal.
    pub async fn update_transaction(
        &self,
        transaction_id: Uuid,
        user_id: &str,
        draft: TransactionDraft,
    ) -> ResultEngine<Transaction> {
        draft.validate()?;
        let updated = with_retry!(self, |db_tx| {
            self.revise_transaction(&db_tx, transaction_id, user_id, &draft)
                .await
        })?;
        tracing::info!(
            %transaction_id,
            kind = updated.kind.as_str(),
            amount_minor = updated.amount_minor,
            "transaction updated"
        );
        Ok(updated)
    }

    async fn revise_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
        user_id: &str,
        draft: &TransactionDraft,
    ) -> ResultEngine<Transaction> {
        let (model, source) = self
            .require_owned_transaction(db_tx, transaction_id, user_id)
            .await?;
        let original = Transaction::try_from(model.clone())?;
        ensure_opening_balance_kept(&original, draft)?;

        let mut plan = BalancePlan::default();
        plan.track(&source)?;
        if let Some(to_account_id) = original.to_account_id {
            let destination = self
                .require_owned_account(db_tx, to_account_id, user_id, "destination")
                .await?;
            plan.track(&destination)?;
        }
        plan.apply(&original.effects(), true)?;

        let category_id = self.posting_category(db_tx, user_id, &draft.posting).await?;
        self.stage_posting(db_tx, user_id, draft, &mut plan).await?;

        let mut row: transactions::ActiveModel = model.into();
        fill_row(&mut row, draft, category_id);
        let updated = row.update(db_tx).await?;
        self.persist_balances(db_tx, &plan).await?;

        Transaction::try_from(updated)
    }
}

/// An opening balance stays an INCOME on its own account; only its amount,
/// date, category and description may change.
fn ensure_opening_balance_kept(
    original: &Transaction,
    draft: &TransactionDraft,
) -> ResultEngine<()> {
    if !original.is_initial_balance {
        return Ok(());
    }
    match draft.posting {
        Posting::Income { account_id, .. } if account_id == original.account_id => Ok(()),
        _ => Err(EngineError::Validation(
            "initial balance must remain an income on its own account".to_string(),
        )),
    }
}
