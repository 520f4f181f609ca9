use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    Category, CategoryPatch, CreateCategoryCmd, EngineError, Posting, ResultEngine,
    TransactionKind,
    categories::{self, DEFAULT_COLOR, DEFAULT_ICON, INITIAL_BALANCE_CATEGORY, TRANSFER_CATEGORY},
    transactions,
    util::{name_key, normalize_color, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

const TRANSFER_ICON: &str = "arrow-left-right";
const INITIAL_BALANCE_ICON: &str = "wallet";

impl Engine {
    /// Create a category owned by the caller.
    ///
    /// `icon` defaults to `circle` and `color` to `#6B7280`. Names are unique
    /// per owner and kind, compared case- and accent-insensitively.
    pub async fn create_category(&self, cmd: CreateCategoryCmd) -> ResultEngine<Category> {
        let name = normalize_required_name(&cmd.name, "category")?;
        let icon = normalize_optional_text(cmd.icon.as_deref())
            .unwrap_or_else(|| DEFAULT_ICON.to_string());
        let color = match cmd.color.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(color) => normalize_color(color)?,
            None => DEFAULT_COLOR.to_string(),
        };

        with_tx!(self, |db_tx| {
            self.insert_category(
                &db_tx,
                Some(&cmd.user_id),
                &name,
                cmd.kind,
                &icon,
                &color,
                false,
            )
            .await
        })
    }

    /// Rename or restyle a category the caller owns. System categories are
    /// read-only.
    pub async fn update_category(
        &self,
        category_id: Uuid,
        patch: CategoryPatch,
        user_id: &str,
    ) -> ResultEngine<Category> {
        let name = patch
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "category"))
            .transpose()?;
        let color = patch.color.as_deref().map(normalize_color).transpose()?;
        let icon = normalize_optional_text(patch.icon.as_deref());

        with_tx!(self, |db_tx| {
            self.apply_category_patch(&db_tx, category_id, user_id, name, icon, color)
                .await
        })
    }

    /// Delete a category the caller owns.
    ///
    /// System categories and categories still referenced by transactions
    /// cannot be deleted.
    pub async fn delete_category(&self, category_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.remove_category(&db_tx, category_id, user_id).await
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) async fn insert_category(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: Option<&str>,
        name: &str,
        kind: TransactionKind,
        icon: &str,
        color: &str,
        is_system: bool,
    ) -> ResultEngine<Category> {
        let name_norm = name_key(name);
        if self
            .find_category(db_tx, user_id, kind, Some(&name_norm))
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!(
                "{} category '{name}' already exists",
                kind.as_str()
            )));
        }

        let model = categories::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            user_id: ActiveValue::Set(user_id.map(ToString::to_string)),
            name: ActiveValue::Set(name.to_string()),
            name_norm: ActiveValue::Set(name_norm),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            icon: ActiveValue::Set(icon.to_string()),
            color: ActiveValue::Set(color.to_string()),
            is_system: ActiveValue::Set(is_system),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db_tx)
        .await?;

        tracing::info!(category_id = %model.id, kind = kind.as_str(), "category created");
        Category::try_from(model)
    }

    async fn apply_category_patch(
        &self,
        db_tx: &DatabaseTransaction,
        category_id: Uuid,
        user_id: &str,
        name: Option<String>,
        icon: Option<String>,
        color: Option<String>,
    ) -> ResultEngine<Category> {
        let model = self
            .require_visible_category(db_tx, category_id, user_id)
            .await?;
        if model.is_system {
            return Err(EngineError::Conflict(
                "system categories cannot be modified".to_string(),
            ));
        }
        if !model.owned_by(user_id) {
            return Err(EngineError::Unauthorized(
                "category not found or unauthorized".to_string(),
            ));
        }

        if name.is_none() && icon.is_none() && color.is_none() {
            return Category::try_from(model);
        }

        let kind = TransactionKind::try_from(model.kind.as_str())?;
        let mut active: categories::ActiveModel = model.clone().into();
        if let Some(name) = name {
            let name_norm = name_key(&name);
            if name_norm != model.name_norm
                && self
                    .find_category(db_tx, Some(user_id), kind, Some(&name_norm))
                    .await?
                    .is_some()
            {
                return Err(EngineError::Conflict(format!(
                    "{} category '{name}' already exists",
                    kind.as_str()
                )));
            }
            active.name = ActiveValue::Set(name);
            active.name_norm = ActiveValue::Set(name_norm);
        }
        if let Some(icon) = icon {
            active.icon = ActiveValue::Set(icon);
        }
        if let Some(color) = color {
            active.color = ActiveValue::Set(color);
        }

        Category::try_from(active.update(db_tx).await?)
    }

    async fn remove_category(
        &self,
        db_tx: &DatabaseTransaction,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let model = self
            .require_visible_category(db_tx, category_id, user_id)
            .await?;
        if model.is_system {
            return Err(EngineError::Conflict(
                "system categories cannot be deleted".to_string(),
            ));
        }
        if !model.owned_by(user_id) {
            return Err(EngineError::Unauthorized(
                "category not found or unauthorized".to_string(),
            ));
        }

        let references = transactions::Entity::find()
            .filter(transactions::Column::CategoryId.eq(model.id.clone()))
            .count(db_tx)
            .await?;
        if references > 0 {
            return Err(EngineError::Conflict(format!(
                "category is used by {references} transaction(s)"
            )));
        }

        categories::Entity::delete_by_id(model.id.clone())
            .exec(db_tx)
            .await?;
        tracing::info!(category_id = %model.id, "category deleted");
        Ok(())
    }

    /// First category of `kind` owned by `user_id` (or global when `None`),
    /// optionally matching a normalized name. System rows come first.
    async fn find_category(
        &self,
        db: &impl ConnectionTrait,
        user_id: Option<&str>,
        kind: TransactionKind,
        name_norm: Option<&str>,
    ) -> ResultEngine<Option<categories::Model>> {
        let mut query = categories::Entity::find()
            .filter(categories::Column::Kind.eq(kind.as_str()))
            .order_by_desc(categories::Column::IsSystem)
            .order_by_asc(categories::Column::CreatedAt);
        query = match user_id {
            Some(user_id) => query.filter(categories::Column::UserId.eq(user_id)),
            None => query.filter(categories::Column::UserId.is_null()),
        };
        if let Some(name_norm) = name_norm {
            query = query.filter(categories::Column::NameNorm.eq(name_norm));
        }
        Ok(query.one(db).await?)
    }

    /// Owner's category of `kind`, else a global one, else a new system
    /// category owned by the caller.
    async fn resolve_system_category(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        kind: TransactionKind,
        name: &str,
        icon: &str,
        by_name: bool,
    ) -> ResultEngine<String> {
        let name_norm = name_key(name);
        let name_filter = by_name.then_some(name_norm.as_str());
        if let Some(model) = self
            .find_category(db_tx, Some(user_id), kind, name_filter)
            .await?
        {
            return Ok(model.id);
        }
        if let Some(model) = self.find_category(db_tx, None, kind, name_filter).await? {
            return Ok(model.id);
        }

        tracing::debug!(user_id, kind = kind.as_str(), name, "creating system category");
        let category = self
            .insert_category(db_tx, Some(user_id), name, kind, icon, DEFAULT_COLOR, true)
            .await?;
        Ok(category.id.to_string())
    }

    /// Category every transfer of `user_id` is filed under.
    pub(super) async fn transfer_category(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<String> {
        self.resolve_system_category(
            db_tx,
            user_id,
            TransactionKind::Transfer,
            TRANSFER_CATEGORY,
            TRANSFER_ICON,
            false,
        )
        .await
    }

    /// Category opening balances of `user_id` are posted to.
    pub(super) async fn initial_balance_category(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<String> {
        self.resolve_system_category(
            db_tx,
            user_id,
            TransactionKind::Income,
            INITIAL_BALANCE_CATEGORY,
            INITIAL_BALANCE_ICON,
            true,
        )
        .await
    }

    /// Concrete category id for a posting.
    ///
    /// Transfers always get the resolved transfer category. Income and
    /// expense categories must be visible to the caller and of the same kind
    /// as the transaction.
    pub(super) async fn posting_category(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        posting: &Posting,
    ) -> ResultEngine<String> {
        let Some(category_id) = posting.category_id() else {
            return self.transfer_category(db_tx, user_id).await;
        };

        let model = self
            .require_visible_category(db_tx, category_id, user_id)
            .await?;
        let kind = posting.kind();
        if model.kind != kind.as_str() {
            return Err(EngineError::Validation(format!(
                "category '{}' is a {} category, not {}",
                model.name,
                model.kind,
                kind.as_str()
            )));
        }
        Ok(model.id)
    }
}
