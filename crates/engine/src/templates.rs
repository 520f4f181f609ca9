//! Default accounts and categories given to a new user.

use serde::{Deserialize, Serialize};

use crate::TransactionKind;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTemplate {
    pub name: String,
    #[serde(default)]
    pub balance_minor: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTemplate {
    pub name: String,
    pub kind: TransactionKind,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// The set of rows [`crate::Engine::initialize_user`] creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTemplates {
    #[serde(default)]
    pub accounts: Vec<AccountTemplate>,
    #[serde(default)]
    pub categories: Vec<CategoryTemplate>,
}

impl Default for SeedTemplates {
    fn default() -> Self {
        let account = |name: &str| AccountTemplate {
            name: name.to_string(),
            balance_minor: 0,
        };
        let category = |name: &str, kind, icon: &str, color: &str| CategoryTemplate {
            name: name.to_string(),
            kind,
            icon: Some(icon.to_string()),
            color: Some(color.to_string()),
        };
        Self {
            accounts: vec![account("Cash"), account("Bank")],
            categories: vec![
                category("Salary", TransactionKind::Income, "briefcase", "#16A34A"),
                category("Food", TransactionKind::Expense, "utensils", "#F97316"),
                category("Transport", TransactionKind::Expense, "car", "#2563EB"),
                category(
                    "Transfer",
                    TransactionKind::Transfer,
                    "arrow-left-right",
                    "#6B7280",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_parse_from_json_with_lowercase_kinds() {
        let json = r#"{
            "accounts": [{"name": "Wallet", "balance_minor": 1500}],
            "categories": [{"name": "Gifts", "kind": "income"}]
        }"#;
        let templates: SeedTemplates = serde_json::from_str(json).unwrap();
        assert_eq!(templates.accounts[0].balance_minor, 1500);
        assert_eq!(templates.categories[0].kind, TransactionKind::Income);
        assert_eq!(templates.categories[0].icon, None);
    }

    #[test]
    fn default_templates_cover_every_kind() {
        let templates = SeedTemplates::default();
        for kind in [
            TransactionKind::Income,
            TransactionKind::Expense,
            TransactionKind::Transfer,
        ] {
            assert!(templates.categories.iter().any(|c| c.kind == kind));
        }
    }
}
