use chrono::Utc;
use sea_orm::{Database, DatabaseConnection};

use engine::{
    AccountPatch, AccountRemoval, AccountType, CreateAccountCmd, CreateCategoryCmd, Engine,
    EngineError, ErrorKind, ResourceKind, SeedTemplates, TransactionDraft, TransactionKind,
    TransactionListFilter,
};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn initial_balance_amount(engine: &Engine, account_id: uuid::Uuid) -> Option<i64> {
    engine
        .list_transactions(
            "alice",
            &TransactionListFilter {
                account_id: Some(account_id),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .items
        .into_iter()
        .find(|tx| tx.is_initial_balance)
        .map(|tx| tx.amount_minor)
}

#[tokio::test]
async fn opening_balance_is_posted_as_initial_income() {
    let (engine, _db) = engine_with_db().await;
    let account = engine
        .create_account(
            CreateAccountCmd::new("alice", "  Main   Bank ", 12_500).account_type(AccountType::Bank),
        )
        .await
        .unwrap();

    assert_eq!(account.name, "Main Bank");
    assert_eq!(account.balance_minor, 12_500);
    assert_eq!(account.account_type, Some(AccountType::Bank));
    assert!(!account.is_system);
    assert_eq!(initial_balance_amount(&engine, account.id).await, Some(12_500));

    let categories = engine.list_categories("alice").await.unwrap();
    let initial = categories
        .iter()
        .find(|c| c.name == "Initial Balance")
        .expect("initial balance category");
    assert_eq!(initial.kind, TransactionKind::Income);
    assert!(initial.is_system);

    let empty = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 0))
        .await
        .unwrap();
    assert_eq!(initial_balance_amount(&engine, empty.id).await, None);
    assert!(engine.audit_balances("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn account_names_are_unique_per_owner() {
    let (engine, _db) = engine_with_db().await;
    engine
        .create_account(CreateAccountCmd::new("alice", "Savings", 0))
        .await
        .unwrap();

    let err = engine
        .create_account(CreateAccountCmd::new("alice", "SAVINGS", 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    engine
        .create_account(CreateAccountCmd::new("bob", "Savings", 0))
        .await
        .unwrap();

    let err = engine
        .create_account(CreateAccountCmd::new("alice", "   ", 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine
        .create_account(CreateAccountCmd::new("alice", "Debt", -1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn balance_edit_rewrites_the_initial_balance() {
    let (engine, _db) = engine_with_db().await;
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", TransactionKind::Expense))
        .await
        .unwrap();
    let account = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 1_000))
        .await
        .unwrap();
    engine
        .create_transaction(
            "alice",
            TransactionDraft::expense(account.id, food.id, 300, Utc::now()),
        )
        .await
        .unwrap();

    let patch = |balance| AccountPatch {
        balance_minor: Some(balance),
        ..Default::default()
    };

    let updated = engine
        .update_account(account.id, patch(1_200), "alice")
        .await
        .unwrap();
    assert_eq!(updated.balance_minor, 1_200);
    assert_eq!(initial_balance_amount(&engine, account.id).await, Some(1_500));

    // The expense keeps its share: the opening balance shrinks to 300.
    let updated = engine
        .update_account(account.id, patch(0), "alice")
        .await
        .unwrap();
    assert_eq!(updated.balance_minor, 0);
    assert_eq!(initial_balance_amount(&engine, account.id).await, Some(300));

    let wallet = engine
        .create_account(CreateAccountCmd::new("alice", "Wallet", 500))
        .await
        .unwrap();
    let updated = engine
        .update_account(wallet.id, patch(0), "alice")
        .await
        .unwrap();
    assert_eq!(updated.balance_minor, 0);
    assert_eq!(initial_balance_amount(&engine, wallet.id).await, None);

    let updated = engine
        .update_account(wallet.id, patch(250), "alice")
        .await
        .unwrap();
    assert_eq!(updated.balance_minor, 250);
    assert_eq!(initial_balance_amount(&engine, wallet.id).await, Some(250));

    // Income received later cannot be erased through the opening balance.
    let salary = engine
        .create_category(CreateCategoryCmd::new("alice", "Salary", TransactionKind::Income))
        .await
        .unwrap();
    engine
        .create_transaction(
            "alice",
            TransactionDraft::income(wallet.id, salary.id, 1_000, Utc::now()),
        )
        .await
        .unwrap();
    let err = engine
        .update_account(wallet.id, patch(100), "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.account(wallet.id, "alice").await.unwrap().balance_minor, 1_250);

    assert!(engine.audit_balances("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn rename_and_retype_leave_the_balance_alone() {
    let (engine, _db) = engine_with_db().await;
    let account = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 700))
        .await
        .unwrap();
    engine
        .create_account(CreateAccountCmd::new("alice", "Bank", 0))
        .await
        .unwrap();

    let updated = engine
        .update_account(
            account.id,
            AccountPatch {
                name: Some("Pocket".to_string()),
                account_type: Some(AccountType::Cash),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Pocket");
    assert_eq!(updated.account_type, Some(AccountType::Cash));
    assert_eq!(updated.balance_minor, 700);

    let err = engine
        .update_account(
            account.id,
            AccountPatch {
                name: Some("bank".to_string()),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = engine
        .update_account(account.id, AccountPatch::default(), "bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn delete_removes_initial_balance_but_not_history() {
    let (engine, _db) = engine_with_db().await;
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", TransactionKind::Expense))
        .await
        .unwrap();
    let cash = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 1_000))
        .await
        .unwrap();
    let bank = engine
        .create_account(CreateAccountCmd::new("alice", "Bank", 1_000))
        .await
        .unwrap();
    let savings = engine
        .create_account(CreateAccountCmd::new("alice", "Savings", 0))
        .await
        .unwrap();

    // Only an opening balance: deleted together with the account.
    assert_eq!(
        engine.delete_account(cash.id, "alice").await.unwrap(),
        AccountRemoval::Deleted
    );
    assert_eq!(
        engine.account(cash.id, "alice").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    engine
        .create_transaction(
            "alice",
            TransactionDraft::expense(bank.id, food.id, 100, Utc::now()),
        )
        .await
        .unwrap();
    let err = engine.delete_account(bank.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Being the destination of a transfer is history too.
    engine
        .create_transaction(
            "alice",
            TransactionDraft::transfer(bank.id, savings.id, 100, Utc::now()),
        )
        .await
        .unwrap();
    let err = engine.delete_account(savings.id, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(msg) if msg.contains("transaction history")));

    let err = engine.delete_account(bank.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn opening_balance_cannot_be_turned_into_a_transfer() {
    let (engine, _db) = engine_with_db().await;
    let x = engine
        .create_account(CreateAccountCmd::new("alice", "X", 1_000))
        .await
        .unwrap();
    let y = engine
        .create_account(CreateAccountCmd::new("alice", "Y", 2_000))
        .await
        .unwrap();
    let opening = engine
        .list_transactions(
            "alice",
            &TransactionListFilter {
                account_id: Some(y.id),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .items
        .into_iter()
        .find(|tx| tx.is_initial_balance)
        .unwrap();

    let err = engine
        .update_transaction(
            opening.id,
            "alice",
            TransactionDraft::transfer(x.id, y.id, 500, opening.occurred_at),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Moving it onto another account is rejected as well.
    let err = engine
        .update_transaction(
            opening.id,
            "alice",
            TransactionDraft::income(x.id, opening.category_id, 2_000, opening.occurred_at),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(engine.account(x.id, "alice").await.unwrap().balance_minor, 1_000);
    assert_eq!(engine.account(y.id, "alice").await.unwrap().balance_minor, 2_000);

    // The amount itself stays editable.
    let updated = engine
        .update_transaction(
            opening.id,
            "alice",
            TransactionDraft::income(y.id, opening.category_id, 2_500, opening.occurred_at),
        )
        .await
        .unwrap();
    assert!(updated.is_initial_balance);
    assert_eq!(engine.account(y.id, "alice").await.unwrap().balance_minor, 2_500);

    assert_eq!(
        engine.delete_account(x.id, "alice").await.unwrap(),
        AccountRemoval::Deleted
    );
    assert_eq!(engine.account(y.id, "alice").await.unwrap().balance_minor, 2_500);
    assert!(engine.audit_balances("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn system_accounts_are_hidden_instead_of_deleted() {
    let (engine, _db) = engine_with_db().await;
    let outcome = engine
        .initialize_user("alice", &SeedTemplates::default())
        .await
        .unwrap();
    assert_eq!(outcome.accounts_created, 2);

    let accounts = engine.list_accounts("alice").await.unwrap();
    let cash = accounts.iter().find(|a| a.name == "Cash").unwrap();
    assert!(cash.is_system);

    assert_eq!(
        engine.delete_account(cash.id, "alice").await.unwrap(),
        AccountRemoval::Hidden
    );
    // Deleting again is a no-op on the hidden relation.
    assert_eq!(
        engine.delete_account(cash.id, "alice").await.unwrap(),
        AccountRemoval::Hidden
    );

    let accounts = engine.list_accounts("alice").await.unwrap();
    assert!(accounts.iter().all(|a| a.id != cash.id));
    let hidden = engine
        .list_hidden(ResourceKind::Account, "alice")
        .await
        .unwrap();
    assert_eq!(hidden.len(), 1);
    assert_eq!(hidden[0].id(), cash.id);

    // The row itself is still there.
    assert_eq!(engine.account(cash.id, "alice").await.unwrap().name, "Cash");
}
