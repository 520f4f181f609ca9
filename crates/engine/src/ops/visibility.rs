use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Account, Category, EngineError, HiddenResource, ResourceKind, ResultEngine, accounts,
    categories, hidden,
};

use super::{Engine, with_tx};

impl Engine {
    /// Accounts shown to the caller: global system accounts and the
    /// caller's own, minus the ones the caller hid. System accounts come
    /// first, then by name.
    pub async fn list_accounts(&self, user_id: &str) -> ResultEngine<Vec<Account>> {
        let hidden_ids = self
            .hidden_ids(&self.database, user_id, ResourceKind::Account)
            .await?;
        accounts::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(accounts::Column::UserId.is_null())
                            .add(accounts::Column::IsSystem.eq(true)),
                    )
                    .add(accounts::Column::UserId.eq(user_id)),
            )
            .filter(accounts::Column::Id.is_not_in(hidden_ids))
            .order_by_desc(accounts::Column::IsSystem)
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    /// Categories shown to the caller, with the same rules as
    /// [`Engine::list_accounts`].
    pub async fn list_categories(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        let hidden_ids = self
            .hidden_ids(&self.database, user_id, ResourceKind::Category)
            .await?;
        categories::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(categories::Column::UserId.is_null())
                            .add(categories::Column::IsSystem.eq(true)),
                    )
                    .add(categories::Column::UserId.eq(user_id)),
            )
            .filter(categories::Column::Id.is_not_in(hidden_ids))
            .order_by_desc(categories::Column::IsSystem)
            .order_by_asc(categories::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Category::try_from)
            .collect()
    }

    /// Hide a system account or category for the caller.
    ///
    /// Returns `false` when it was already hidden. User-created resources
    /// cannot be hidden; they are deleted instead.
    pub async fn hide_resource(
        &self,
        kind: ResourceKind,
        target_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            self.hide_system_resource(&db_tx, kind, target_id, user_id)
                .await
        })
    }

    /// Make a hidden resource visible again. Returns `false` when it was not
    /// hidden.
    pub async fn unhide_resource(
        &self,
        kind: ResourceKind,
        target_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bool> {
        let result = hidden::Entity::delete_many()
            .filter(hidden::Column::UserId.eq(user_id))
            .filter(hidden::Column::TargetKind.eq(kind.as_str()))
            .filter(hidden::Column::TargetId.eq(target_id.to_string()))
            .exec(&self.database)
            .await?;
        let removed = result.rows_affected > 0;
        if !removed {
            tracing::debug!(user_id, kind = kind.as_str(), %target_id, "resource was not hidden");
        }
        Ok(removed)
    }

    /// Resources of `kind` the caller hid, most recently hidden first.
    pub async fn list_hidden(
        &self,
        kind: ResourceKind,
        user_id: &str,
    ) -> ResultEngine<Vec<HiddenResource>> {
        let rows = hidden::Entity::find()
            .filter(hidden::Column::UserId.eq(user_id))
            .filter(hidden::Column::TargetKind.eq(kind.as_str()))
            .order_by_desc(hidden::Column::HiddenAt)
            .all(&self.database)
            .await?;
        let ids: Vec<String> = rows.iter().map(|row| row.target_id.clone()).collect();

        let out = match kind {
            ResourceKind::Account => {
                let mut by_id: HashMap<String, accounts::Model> = accounts::Entity::find()
                    .filter(accounts::Column::Id.is_in(ids))
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(|model| (model.id.clone(), model))
                    .collect();
                rows.into_iter()
                    .filter_map(|row| by_id.remove(&row.target_id).map(|m| (m, row.hidden_at)))
                    .map(|(model, hidden_at)| {
                        Ok(HiddenResource::Account {
                            account: Account::try_from(model)?,
                            hidden_at,
                        })
                    })
                    .collect::<ResultEngine<Vec<_>>>()?
            }
            ResourceKind::Category => {
                let mut by_id: HashMap<String, categories::Model> = categories::Entity::find()
                    .filter(categories::Column::Id.is_in(ids))
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(|model| (model.id.clone(), model))
                    .collect();
                rows.into_iter()
                    .filter_map(|row| by_id.remove(&row.target_id).map(|m| (m, row.hidden_at)))
                    .map(|(model, hidden_at)| {
                        Ok(HiddenResource::Category {
                            category: Category::try_from(model)?,
                            hidden_at,
                        })
                    })
                    .collect::<ResultEngine<Vec<_>>>()?
            }
        };
        Ok(out)
    }

    async fn hide_system_resource(
        &self,
        db: &impl ConnectionTrait,
        kind: ResourceKind,
        target_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<bool> {
        let (is_system, id) = match kind {
            ResourceKind::Account => {
                let model = self.require_visible_account(db, target_id, user_id).await?;
                (model.is_system, model.id)
            }
            ResourceKind::Category => {
                let model = self
                    .require_visible_category(db, target_id, user_id)
                    .await?;
                (model.is_system, model.id)
            }
        };
        if !is_system {
            return Err(EngineError::Validation(format!(
                "only system {}s can be hidden",
                kind.as_str()
            )));
        }
        self.insert_hidden(db, user_id, kind, &id).await
    }

    /// Records `(user, kind, target)` as hidden. Returns `false` when the row
    /// already exists.
    pub(super) async fn insert_hidden(
        &self,
        db: &impl ConnectionTrait,
        user_id: &str,
        kind: ResourceKind,
        target_id: &str,
    ) -> ResultEngine<bool> {
        let existing = hidden::Entity::find_by_id((
            user_id.to_string(),
            kind.as_str().to_string(),
            target_id.to_string(),
        ))
        .one(db)
        .await?;
        if existing.is_some() {
            tracing::debug!(user_id, kind = kind.as_str(), target_id, "already hidden");
            return Ok(false);
        }

        hidden::ActiveModel {
            user_id: ActiveValue::Set(user_id.to_string()),
            target_kind: ActiveValue::Set(kind.as_str().to_string()),
            target_id: ActiveValue::Set(target_id.to_string()),
            hidden_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db)
        .await?;
        tracing::info!(user_id, kind = kind.as_str(), target_id, "resource hidden");
        Ok(true)
    }

    async fn hidden_ids(
        &self,
        db: &impl ConnectionTrait,
        user_id: &str,
        kind: ResourceKind,
    ) -> ResultEngine<Vec<String>> {
        Ok(hidden::Entity::find()
            .select_only()
            .column(hidden::Column::TargetId)
            .filter(hidden::Column::UserId.eq(user_id))
            .filter(hidden::Column::TargetKind.eq(kind.as_str()))
            .into_tuple()
            .all(db)
            .await?)
    }
}
