//! The module contains the `Account` struct and its entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// What kind of real-world place an account represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Cash,
    Bank,
    Credit,
    Investment,
    Loan,
    Other,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Credit => "credit",
            Self::Investment => "investment",
            Self::Loan => "loan",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for AccountType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "bank" => Ok(Self::Bank),
            "credit" => Ok(Self::Credit),
            "investment" => Ok(Self::Investment),
            "loan" => Ok(Self::Loan),
            "other" => Ok(Self::Other),
            other => Err(EngineError::Validation(format!(
                "invalid account type: {other}"
            ))),
        }
    }
}

/// An account.
///
/// A place where money is kept: a wallet, a bank account, a card. The
/// balance is the net effect of every transaction touching the account and
/// is kept in minor units.
///
/// Accounts with `is_system` set come from templates (or are global, when
/// `user_id` is `None`): they can be hidden per user but never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub name: String,
    pub account_type: Option<AccountType>,
    pub balance_minor: i64,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns `true` when `user_id` may see this account: it is owned by
    /// them or it is a global system account.
    pub fn visible_to(&self, user_id: &str) -> bool {
        self.user_id.as_deref().is_none_or(|owner| owner == user_id)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub name_norm: String,
    pub account_type: Option<String>,
    pub balance: i64,
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
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            user_id: model.user_id,
            name: model.name,
            account_type: model
                .account_type
                .as_deref()
                .map(AccountType::try_from)
                .transpose()?,
            balance_minor: model.balance,
            is_system: model.is_system,
            created_at: model.created_at,
        })
    }
}

/// Builds a fresh row with a zero balance.
pub(crate) fn new_row(
    user_id: Option<&str>,
    name: &str,
    name_norm: String,
    account_type: Option<AccountType>,
    is_system: bool,
) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        user_id: ActiveValue::Set(user_id.map(ToString::to_string)),
        name: ActiveValue::Set(name.to_string()),
        name_norm: ActiveValue::Set(name_norm),
        account_type: ActiveValue::Set(account_type.map(|t| t.as_str().to_string())),
        balance: ActiveValue::Set(0),
        is_system: ActiveValue::Set(is_system),
        created_at: ActiveValue::Set(Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_parsing_is_case_insensitive() {
        assert_eq!(AccountType::try_from("Bank").unwrap(), AccountType::Bank);
        assert_eq!(AccountType::try_from(" LOAN ").unwrap(), AccountType::Loan);
        assert!(AccountType::try_from("piggy").is_err());
    }

    #[test]
    fn global_accounts_are_visible_to_everyone() {
        let account = Account {
            id: Uuid::new_v4(),
            user_id: None,
            name: "Cash".to_string(),
            account_type: Some(AccountType::Cash),
            balance_minor: 0,
            is_system: true,
            created_at: Utc::now(),
        };
        assert!(account.visible_to("alice"));
        assert!(account.visible_to("bob"));

        let owned = Account {
            user_id: Some("alice".to_string()),
            ..account
        };
        assert!(owned.visible_to("alice"));
        assert!(!owned.visible_to("bob"));
    }
}
