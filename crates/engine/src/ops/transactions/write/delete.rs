use sea_orm::{DatabaseTransaction, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{ResultEngine, Transaction, transactions};

use super::super::super::{Engine, balances::BalancePlan, with_retry};

impl Engine {
    /// Delete a transaction, reversing its effect on every account it
    /// touched first.
    ///
    /// Reversals are never blocked by the balance check: removing an income
    /// that was already spent leaves the account negative, as recorded.
    pub async fn delete_transaction(&self, transaction_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_retry!(self, |db_tx| {
            self.remove_transaction(&db_tx, transaction_id, user_id).await
        })?;
        tracing::info!(%transaction_id, "transaction deleted");
        Ok(())
    }

    async fn remove_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let (model, source) = self
            .require_owned_transaction(db_tx, transaction_id, user_id)
            .await?;
        let tx = Transaction::try_from(model)?;

        let mut plan = BalancePlan::default();
        plan.track(&source)?;
        if let Some(to_account_id) = tx.to_account_id {
            let destination = self
                .require_owned_account(db_tx, to_account_id, user_id, "destination")
                .await?;
            plan.track(&destination)?;
        }
        plan.apply(&tx.effects(), true)?;

        self.persist_balances(db_tx, &plan).await?;
        transactions::Entity::delete_by_id(tx.id.to_string())
            .exec(db_tx)
            .await?;
        Ok(())
    }
}
