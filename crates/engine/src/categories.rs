//! Category catalog entries.
//!
//! A category classifies transactions of one [`TransactionKind`]. Rows without
//! `user_id` are global system categories shared by every user.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, TransactionKind, util::parse_uuid};

pub const DEFAULT_ICON: &str = "circle";
pub const DEFAULT_COLOR: &str = "#6B7280";

/// Name of the system INCOME category opening balances are posted to.
pub const INITIAL_BALANCE_CATEGORY: &str = "Initial Balance";
/// Name of the category created for transfers when none is available.
pub const TRANSFER_CATEGORY: &str = "Transfer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub name: String,
    pub kind: TransactionKind,
    pub icon: String,
    pub color: String,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub name_norm: String,
    pub kind: String,
    pub icon: String,
    pub color: String,
    pub is_system: bool,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub(crate) fn owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }

    pub(crate) fn visible_to(&self, user_id: &str) -> bool {
        self.user_id.as_deref().is_none_or(|owner| owner == user_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "category")?,
            user_id: model.user_id,
            name: model.name,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            icon: model.icon,
            color: model.color,
            is_system: model.is_system,
            created_at: model.created_at,
        })
    }
}
