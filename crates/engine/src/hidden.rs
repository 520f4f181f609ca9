//! Per-user visibility overlay.
//!
//! A row `(user_id, target_kind, target_id)` means the user does not want to
//! see that system account or category. Hiding never touches the resource
//! itself.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Account, Category, EngineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Account,
    Category,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Category => "category",
        }
    }
}

impl TryFrom<&str> for ResourceKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "account" => Ok(Self::Account),
            "category" => Ok(Self::Category),
            other => Err(EngineError::Validation(format!(
                "invalid resource kind: {other}"
            ))),
        }
    }
}

/// A hidden resource together with the moment it was hidden.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HiddenResource {
    Account {
        account: Account,
        hidden_at: DateTime<Utc>,
    },
    Category {
        category: Category,
        hidden_at: DateTime<Utc>,
    },
}

impl HiddenResource {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Account { account, .. } => account.id,
            Self::Category { category, .. } => category.id,
        }
    }

    pub fn hidden_at(&self) -> DateTime<Utc> {
        match self {
            Self::Account { hidden_at, .. } | Self::Category { hidden_at, .. } => *hidden_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "hidden_resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_kind: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_id: String,
    pub hidden_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
