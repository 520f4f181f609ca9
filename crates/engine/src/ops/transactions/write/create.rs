use sea_orm::{ActiveModelTrait, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::{ResultEngine, TransactionDraft, util::parse_uuid};

use super::super::super::{Engine, balances::BalancePlan, with_retry};
use super::new_row;

impl Engine {
    /// Post a new transaction and apply its effect on balances.
    ///
    /// - INCOME credits the source account.
    /// - EXPENSE debits the source account.
    /// - TRANSFER debits the source and credits the destination; its category
    ///   is resolved by the engine.
    ///
    /// Both accounts must belong to `user_id`. A debit that would leave the
    /// source below zero fails with `InsufficientBalance`. The row and the
    /// balance writes commit together or not at all.
    pub async fn create_transaction(
        &self,
        user_id: &str,
        draft: TransactionDraft,
    ) -> ResultEngine<Uuid> {
        draft.validate()?;
        let id = with_retry!(self, |db_tx| {
            self.post_transaction(&db_tx, user_id, &draft, false).await
        })?;
        tracing::info!(
            transaction_id = %id,
            kind = draft.kind().as_str(),
            amount_minor = draft.amount_minor,
            "transaction created"
        );
        Ok(id)
    }

    pub(crate) async fn post_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        draft: &TransactionDraft,
        is_initial_balance: bool,
    ) -> ResultEngine<Uuid> {
        let category_id = self.posting_category(db_tx, user_id, &draft.posting).await?;

        let mut plan = BalancePlan::default();
        self.stage_posting(db_tx, user_id, draft, &mut plan).await?;

        let model = new_row(draft, category_id, user_id, is_initial_balance)
            .insert(db_tx)
            .await?;
        self.persist_balances(db_tx, &plan).await?;

        parse_uuid(&model.id, "transaction")
    }
}
