use sea_orm::{DatabaseTransaction, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine, accounts,
    categories::{DEFAULT_COLOR, DEFAULT_ICON},
    templates::SeedTemplates,
    util::{normalize_color, normalize_required_name},
};

use super::{Engine, with_retry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedOutcome {
    pub already_initialized: bool,
    pub accounts_created: usize,
    pub categories_created: usize,
}

impl Engine {
    /// Give a new user the template accounts and categories.
    ///
    /// Runs once: a user who already owns an account is left untouched.
    /// Seeded rows are flagged system, so the user can hide them but not
    /// delete them. Categories the user already has are skipped.
    pub async fn initialize_user(
        &self,
        user_id: &str,
        templates: &SeedTemplates,
    ) -> ResultEngine<SeedOutcome> {
        let outcome = with_retry!(self, |db_tx| {
            self.seed_user(&db_tx, user_id, templates).await
        })?;
        if outcome.already_initialized {
            tracing::debug!(user_id, "user already initialized");
        } else {
            tracing::info!(
                user_id,
                accounts = outcome.accounts_created,
                categories = outcome.categories_created,
                "user initialized"
            );
        }
        Ok(outcome)
    }

    async fn seed_user(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        templates: &SeedTemplates,
    ) -> ResultEngine<SeedOutcome> {
        let owned = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id))
            .count(db_tx)
            .await?;
        if owned > 0 {
            return Ok(SeedOutcome {
                already_initialized: true,
                ..Default::default()
            });
        }

        let mut outcome = SeedOutcome::default();
        for template in &templates.categories {
            let name = normalize_required_name(&template.name, "category")?;
            let icon = template.icon.as_deref().unwrap_or(DEFAULT_ICON);
            let color = match template.color.as_deref() {
                Some(color) => normalize_color(color)?,
                None => DEFAULT_COLOR.to_string(),
            };
            match self
                .insert_category(db_tx, Some(user_id), &name, template.kind, icon, &color, true)
                .await
            {
                Ok(_) => outcome.categories_created += 1,
                Err(EngineError::Conflict(_)) => {
                    tracing::debug!(user_id, name, "template category already exists");
                }
                Err(err) => return Err(err),
            }
        }

        for template in &templates.accounts {
            let name = normalize_required_name(&template.name, "account")?;
            if template.balance_minor < 0 {
                return Err(EngineError::Validation(format!(
                    "template account '{name}' has a negative balance"
                )));
            }
            self.open_account(db_tx, user_id, &name, None, template.balance_minor, true)
                .await?;
            outcome.accounts_created += 1;
        }
        Ok(outcome)
    }
}
