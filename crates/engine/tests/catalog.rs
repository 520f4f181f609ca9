use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    CategoryPatch, ChartRange, CreateAccountCmd, CreateCategoryCmd, Engine, ErrorKind,
    HiddenResource, ResourceKind, SeedTemplates, TransactionDraft, TransactionKind,
};
use migration::MigratorTrait;
use uuid::Uuid;

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

/// Inserts a category shared by every user.
async fn global_category(db: &DatabaseConnection, name: &str, kind: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO categories (id, user_id, name, name_norm, kind, icon, color, is_system, created_at) \
         VALUES (?, NULL, ?, ?, ?, 'circle', '#6B7280', ?, ?)",
        vec![
            id.to_string().into(),
            name.into(),
            name.to_lowercase().into(),
            kind.into(),
            true.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
    id
}

/// Inserts an account shared by every user.
async fn global_account(db: &DatabaseConnection, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO accounts (id, user_id, name, name_norm, balance, is_system, created_at) \
         VALUES (?, NULL, ?, ?, 0, ?, ?)",
        vec![
            id.to_string().into(),
            name.into(),
            name.to_lowercase().into(),
            true.into(),
            Utc::now().into(),
        ],
    ))
    .await
    .unwrap();
    id
}

#[tokio::test]
async fn listings_put_system_rows_first_and_skip_hidden_ones() {
    let (engine, db) = engine_with_db().await;
    let shared = global_category(&db, "Groceries", "EXPENSE").await;
    let shared_account = global_account(&db, "Petty Cash").await;
    engine
        .create_category(CreateCategoryCmd::new("alice", "Books", TransactionKind::Expense))
        .await
        .unwrap();
    engine
        .create_category(CreateCategoryCmd::new("bob", "Secret", TransactionKind::Expense))
        .await
        .unwrap();

    let names: Vec<_> = engine
        .list_categories("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Groceries", "Books"]);

    assert!(
        engine
            .hide_resource(ResourceKind::Category, shared, "alice")
            .await
            .unwrap()
    );
    // Hiding twice is a no-op.
    assert!(
        !engine
            .hide_resource(ResourceKind::Category, shared, "alice")
            .await
            .unwrap()
    );

    let names: Vec<_> = engine
        .list_categories("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Books"]);
    // Bob still sees it.
    assert!(
        engine
            .list_categories("bob")
            .await
            .unwrap()
            .iter()
            .any(|c| c.id == shared)
    );

    assert!(
        engine
            .hide_resource(ResourceKind::Account, shared_account, "alice")
            .await
            .unwrap()
    );
    assert!(engine.list_accounts("alice").await.unwrap().is_empty());
    assert_eq!(engine.list_accounts("bob").await.unwrap().len(), 1);

    let hidden = engine
        .list_hidden(ResourceKind::Category, "alice")
        .await
        .unwrap();
    assert!(matches!(
        hidden.as_slice(),
        [HiddenResource::Category { category, .. }] if category.id == shared
    ));

    assert!(
        engine
            .unhide_resource(ResourceKind::Category, shared, "alice")
            .await
            .unwrap()
    );
    assert!(
        !engine
            .unhide_resource(ResourceKind::Category, shared, "alice")
            .await
            .unwrap()
    );
    assert_eq!(engine.list_categories("alice").await.unwrap().len(), 2);
}

#[tokio::test]
async fn only_system_resources_can_be_hidden() {
    let (engine, _db) = engine_with_db().await;
    let own = engine
        .create_category(CreateCategoryCmd::new("alice", "Books", TransactionKind::Expense))
        .await
        .unwrap();
    let err = engine
        .hide_resource(ResourceKind::Category, own.id, "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine
        .hide_resource(ResourceKind::Category, own.id, "bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = engine
        .hide_resource(ResourceKind::Account, Uuid::new_v4(), "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn categories_in_use_or_system_cannot_be_deleted() {
    let (engine, db) = engine_with_db().await;
    let shared = global_category(&db, "Utilities", "EXPENSE").await;
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", TransactionKind::Expense))
        .await
        .unwrap();
    let spare = engine
        .create_category(CreateCategoryCmd::new("alice", "Spare", TransactionKind::Expense))
        .await
        .unwrap();
    let account = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 1_000))
        .await
        .unwrap();
    let tx = engine
        .create_transaction(
            "alice",
            TransactionDraft::expense(account.id, food.id, 100, Utc::now()),
        )
        .await
        .unwrap();

    let err = engine.delete_category(food.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = engine.delete_category(shared, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = engine.delete_category(spare.id, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    engine.delete_category(spare.id, "alice").await.unwrap();
    let err = engine.delete_category(spare.id, "alice").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Once nothing references it, it can go.
    engine.delete_transaction(tx, "alice").await.unwrap();
    engine.delete_category(food.id, "alice").await.unwrap();
}

#[tokio::test]
async fn category_names_are_unique_per_kind() {
    let (engine, _db) = engine_with_db().await;
    let gifts = engine
        .create_category(
            CreateCategoryCmd::new("alice", "Gifts", TransactionKind::Expense)
                .icon("gift")
                .color("#abc"),
        )
        .await
        .unwrap();
    assert_eq!(gifts.icon, "gift");
    assert_eq!(gifts.color, "#ABC");

    let err = engine
        .create_category(CreateCategoryCmd::new("alice", "gifts", TransactionKind::Expense))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Same name for another kind is fine.
    engine
        .create_category(CreateCategoryCmd::new("alice", "Gifts", TransactionKind::Income))
        .await
        .unwrap();

    let err = engine
        .create_category(
            CreateCategoryCmd::new("alice", "Bad", TransactionKind::Expense).color("blue"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn update_category_restyles_owned_rows_only() {
    let (engine, db) = engine_with_db().await;
    let shared = global_category(&db, "Utilities", "EXPENSE").await;
    let books = engine
        .create_category(CreateCategoryCmd::new("alice", "Books", TransactionKind::Expense))
        .await
        .unwrap();

    let updated = engine
        .update_category(
            books.id,
            CategoryPatch {
                name: Some("Reading".to_string()),
                icon: Some("book".to_string()),
                color: Some("#112233".to_string()),
            },
            "alice",
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Reading");
    assert_eq!(updated.icon, "book");
    assert_eq!(updated.kind, TransactionKind::Expense);

    let err = engine
        .update_category(shared, CategoryPatch::default(), "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = engine
        .update_category(books.id, CategoryPatch::default(), "bob")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn initialize_user_runs_once() {
    let (engine, _db) = engine_with_db().await;
    let templates = SeedTemplates::default();

    let first = engine.initialize_user("alice", &templates).await.unwrap();
    assert!(!first.already_initialized);
    assert_eq!(first.accounts_created, 2);
    assert_eq!(first.categories_created, 4);

    let second = engine.initialize_user("alice", &templates).await.unwrap();
    assert!(second.already_initialized);
    assert_eq!(second.accounts_created, 0);

    let categories = engine.list_categories("alice").await.unwrap();
    assert!(categories.iter().all(|c| c.is_system));
    assert_eq!(categories.len(), 4);
    assert!(engine.list_categories("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn reports_count_income_and_expense_only() {
    let (engine, _db) = engine_with_db().await;
    let salary = engine
        .create_category(CreateCategoryCmd::new("alice", "Salary", TransactionKind::Income))
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", TransactionKind::Expense))
        .await
        .unwrap();
    let cash = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 5_000))
        .await
        .unwrap();
    let bank = engine
        .create_account(CreateAccountCmd::new("alice", "Bank", 0))
        .await
        .unwrap();

    let at = |month, day| Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap();
    for draft in [
        TransactionDraft::income(bank.id, salary.id, 10_000, at(9, 1)),
        TransactionDraft::expense(bank.id, food.id, 2_000, at(9, 15)),
        TransactionDraft::income(bank.id, salary.id, 12_000, at(10, 1)),
        TransactionDraft::expense(bank.id, food.id, 3_000, at(10, 2)),
        TransactionDraft::transfer(cash.id, bank.id, 1_000, at(10, 3)),
    ] {
        engine.create_transaction("alice", draft).await.unwrap();
    }

    let summary = engine
        .monthly_summary(
            "alice",
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(summary.days, 31);
    assert_eq!(summary.total_income_minor, 12_000);
    assert_eq!(summary.total_expense_minor, 3_000);
    assert_eq!(summary.net_minor, 9_000);
    assert_eq!(summary.expense_by_category.len(), 1);
    assert_eq!(summary.expense_by_category[0].name, "Food");

    let err = engine
        .monthly_summary(
            "alice",
            NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stats = engine.dashboard_stats("alice", at(10, 19)).await.unwrap();
    assert_eq!(stats.total_balance_minor, 5_000 + 10_000 - 2_000 + 12_000 - 3_000);
    assert_eq!(stats.month_income_minor, 12_000);
    assert_eq!(stats.last_month_income_minor, 10_000);
    assert_eq!(stats.month_expense_minor, 3_000);
    assert_eq!(stats.income_change_bp, 2_000);
    assert_eq!(stats.expense_change_bp, 5_000);
    assert_eq!(stats.savings_rate_bp, 7_500);
}

#[tokio::test]
async fn chart_series_buckets_by_month() {
    let (engine, _db) = engine_with_db().await;
    let salary = engine
        .create_category(CreateCategoryCmd::new("alice", "Salary", TransactionKind::Income))
        .await
        .unwrap();
    let food = engine
        .create_category(CreateCategoryCmd::new("alice", "Food", TransactionKind::Expense))
        .await
        .unwrap();
    let cash = engine
        .create_account(CreateAccountCmd::new("alice", "Cash", 5_000))
        .await
        .unwrap();
    let bank = engine
        .create_account(CreateAccountCmd::new("alice", "Bank", 0))
        .await
        .unwrap();

    let at = |month, day| Utc.with_ymd_and_hms(2026, month, day, 12, 0, 0).unwrap();
    for draft in [
        TransactionDraft::income(bank.id, salary.id, 4_000, at(8, 10)),
        TransactionDraft::income(bank.id, salary.id, 10_000, at(9, 1)),
        TransactionDraft::expense(bank.id, food.id, 2_000, at(9, 15)),
        TransactionDraft::income(bank.id, salary.id, 12_000, at(10, 1)),
        TransactionDraft::expense(bank.id, food.id, 3_000, at(10, 2)),
        TransactionDraft::transfer(cash.id, bank.id, 1_000, at(10, 3)),
    ] {
        engine.create_transaction("alice", draft).await.unwrap();
    }
    let now = at(10, 19);

    let series = engine
        .chart_series("alice", ChartRange::SixMonths, now)
        .await
        .unwrap();
    let rows: Vec<_> = series
        .iter()
        .map(|p| (p.label.as_str(), p.income_minor, p.expense_minor, p.savings_minor))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("May 2026", 0, 0, 0),
            ("Jun 2026", 0, 0, 0),
            ("Jul 2026", 0, 0, 0),
            ("Aug 2026", 4_000, 0, 4_000),
            ("Sep 2026", 10_000, 2_000, 8_000),
            ("Oct 2026", 12_000, 3_000, 9_000),
        ]
    );
    assert_eq!(series[5].from, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
    assert_eq!(series[5].to, NaiveDate::from_ymd_opt(2026, 10, 31).unwrap());

    let month = engine
        .chart_series("alice", ChartRange::Month, now)
        .await
        .unwrap();
    assert_eq!(month.len(), 1);
    assert_eq!(month[0].income_minor, 12_000);

    let year = engine
        .chart_series("alice", ChartRange::Year, now)
        .await
        .unwrap();
    assert_eq!(year.len(), 12);
    assert_eq!(year[0].label, "Nov 2025");
    assert_eq!(year.iter().map(|p| p.income_minor).sum::<i64>(), 26_000);

    let custom = engine
        .chart_series(
            "alice",
            ChartRange::Custom {
                from: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
                to: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].label, "Sep 15, 2026 - Oct 2, 2026");
    assert_eq!(custom[0].income_minor, 12_000);
    assert_eq!(custom[0].expense_minor, 5_000);
    assert_eq!(custom[0].savings_minor, 7_000);

    let err = engine
        .chart_series(
            "alice",
            ChartRange::Custom {
                from: NaiveDate::from_ymd_opt(2026, 10, 2).unwrap(),
                to: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            },
            now,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let other = engine
        .chart_series("bob", ChartRange::SixMonths, now)
        .await
        .unwrap();
    assert!(other.iter().all(|p| p.income_minor == 0 && p.expense_minor == 0));
}
