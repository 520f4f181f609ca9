use sea_orm::{ConnectionTrait, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, accounts, categories, transactions};

use super::Engine;

/// Generates a loader that returns a row the caller may see.
///
/// Missing rows are `NotFound`; rows owned by someone else are reported as
/// `Unauthorized` with a message that does not confirm their existence.
macro_rules! impl_require_visible {
    ($fn_name:ident, $entity:path, $model:path, $label:literal) => {
        pub(super) async fn $fn_name(
            &self,
            db: &impl ConnectionTrait,
            id: Uuid,
            user_id: &str,
        ) -> ResultEngine<$model> {
            let model = <$entity>::find_by_id(id.to_string())
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound(concat!($label, " not found").to_string()))?;
            if !model.visible_to(user_id) {
                return Err(EngineError::Unauthorized(
                    concat!($label, " not found or unauthorized").to_string(),
                ));
            }
            Ok(model)
        }
    };
}

impl Engine {
    impl_require_visible!(
        require_visible_account,
        accounts::Entity,
        accounts::Model,
        "account"
    );

    impl_require_visible!(
        require_visible_category,
        categories::Entity,
        categories::Model,
        "category"
    );

    /// Loads an account the caller owns.
    ///
    /// `role` names the account in the error ("source", "destination").
    /// Missing and foreign accounts are reported alike.
    pub(super) async fn require_owned_account(
        &self,
        db: &impl ConnectionTrait,
        account_id: Uuid,
        user_id: &str,
        role: &str,
    ) -> ResultEngine<accounts::Model> {
        accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await?
            .filter(|model| model.owned_by(user_id))
            .ok_or_else(|| {
                EngineError::Unauthorized(format!("{role} account not found or unauthorized"))
            })
    }

    /// Loads a transaction and the source account it belongs to, checking
    /// that the caller owns that account.
    pub(super) async fn require_owned_transaction(
        &self,
        db: &impl ConnectionTrait,
        transaction_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(transactions::Model, accounts::Model)> {
        let tx_model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("transaction not found".to_string()))?;
        let account = accounts::Entity::find_by_id(tx_model.account_id.clone())
            .one(db)
            .await?
            .filter(|model| model.owned_by(user_id))
            .ok_or_else(|| {
                EngineError::Unauthorized("transaction not found or unauthorized".to_string())
            })?;
        Ok((tx_model, account))
    }
}
