use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction};
use uuid::Uuid;

use crate::{ResultEngine, TransactionDraft, transactions};

use super::super::{Engine, balances::BalancePlan};

mod create;
mod delete;
mod update;

impl Engine {
    /// Loads the accounts a draft touches into `plan`, applies its effect
    /// and checks that a debited source does not go below zero.
    ///
    /// Accounts already in the plan keep the balance they were first read
    /// with, so a reversal staged before is taken into account.
    pub(super) async fn stage_posting(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        draft: &TransactionDraft,
        plan: &mut BalancePlan,
    ) -> ResultEngine<()> {
        let source_id = draft.posting.account_id();
        let source = self
            .require_owned_account(db_tx, source_id, user_id, "source")
            .await?;
        plan.track(&source)?;

        if let Some(to_account_id) = draft.posting.to_account_id() {
            let destination = self
                .require_owned_account(db_tx, to_account_id, user_id, "destination")
                .await?;
            plan.track(&destination)?;
        }

        plan.apply(&draft_effects(draft), false)?;
        if draft.kind().debits_source() {
            plan.ensure_sufficient(source_id, draft.amount_minor)?;
        }
        Ok(())
    }
}

fn draft_effects(draft: &TransactionDraft) -> Vec<(Uuid, i64)> {
    transactions::balance_effects(
        draft.kind(),
        draft.amount_minor,
        draft.posting.account_id(),
        draft.posting.to_account_id(),
    )
}

/// Sets every payload column of `row` from `draft`.
fn fill_row(row: &mut transactions::ActiveModel, draft: &TransactionDraft, category_id: String) {
    row.kind = ActiveValue::Set(draft.kind().as_str().to_string());
    row.amount_minor = ActiveValue::Set(draft.amount_minor);
    row.account_id = ActiveValue::Set(draft.posting.account_id().to_string());
    row.to_account_id = ActiveValue::Set(draft.posting.to_account_id().map(|id| id.to_string()));
    row.category_id = ActiveValue::Set(category_id);
    row.description = ActiveValue::Set(draft.description.clone());
    row.occurred_at = ActiveValue::Set(draft.occurred_at);
}

fn new_row(
    draft: &TransactionDraft,
    category_id: String,
    user_id: &str,
    is_initial_balance: bool,
) -> transactions::ActiveModel {
    let mut row = transactions::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        is_initial_balance: ActiveValue::Set(is_initial_balance),
        created_by: ActiveValue::Set(user_id.to_string()),
        created_at: ActiveValue::Set(Utc::now()),
        ..Default::default()
    };
    fill_row(&mut row, draft, category_id);
    row
}
