use ksql::{Connection, Error, KsqlDb, Provider, Record, Table, params};
use std::sync::LazyLock;
use tokio::sync::Mutex;

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Account {
    #[ksql("id")]
    id: i64,
    #[ksql("owner")]
    owner: String,
    #[ksql("balance")]
    balance: i64,
}

#[derive(Record, Default, Debug)]
struct Count {
    #[ksql("count")]
    count: i64,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn count_accounts<C: Connection>(db: &mut KsqlDb<C>) -> i64 {
    let mut count = Count::default();
    db.query_one(
        &mut count,
        "SELECT COUNT(*) AS count FROM ksql_accounts",
        params![],
    )
    .await
    .expect("Failed to count the accounts");
    count.count
}

pub async fn transactions<C: Connection>(db: &mut KsqlDb<C>) {
    let _lock = MUTEX.lock().await;
    let table = Table::new("ksql_accounts");

    // Setup
    db.exec("DROP TABLE IF EXISTS ksql_accounts", params![])
        .await
        .expect("Failed to drop ksql_accounts table");
    db.exec(
        "CREATE TABLE ksql_accounts (id INTEGER PRIMARY KEY, owner TEXT NOT NULL, balance INTEGER NOT NULL)",
        params![],
    )
    .await
    .expect("Failed to create ksql_accounts table");

    // Commit
    let accounts = table.clone();
    let ids = db
        .transaction(|tx| {
            Box::pin(async move {
                let mut alice = Account {
                    owner: "Alice".into(),
                    balance: 100,
                    ..Default::default()
                };
                tx.insert(&accounts, &mut alice).await?;
                let mut bob = Account {
                    owner: "Bob".into(),
                    balance: 50,
                    ..Default::default()
                };
                tx.insert(&accounts, &mut bob).await?;
                Ok::<_, Error>((alice.id, bob.id))
            })
        })
        .await
        .expect("Failed to commit the accounts");
    assert_ne!(ids.0, 0);
    assert_ne!(ids.1, 0);
    assert_eq!(count_accounts(db).await, 2);

    // Rollback on error
    let accounts = table.clone();
    let error = db
        .transaction(|tx| {
            Box::pin(async move {
                tx.patch(
                    &accounts,
                    &Account {
                        id: ids.0,
                        owner: "Alice".into(),
                        balance: 0,
                    },
                )
                .await?;
                tx.insert(
                    &accounts,
                    &mut Account {
                        owner: "Mallory".into(),
                        balance: 1_000_000,
                        ..Default::default()
                    },
                )
                .await?;
                Err::<(), _>(Error::msg("insufficient funds"))
            })
        })
        .await
        .expect_err("The transaction must fail");
    assert!(format!("{:#}", error).contains("insufficient funds"));
    assert_eq!(count_accounts(db).await, 2, "The insert must be rolled back");
    let mut alice = Account::default();
    db.query_one(
        &mut alice,
        "FROM ksql_accounts WHERE owner = 'Alice'",
        params![],
    )
    .await
    .expect("Failed to query Alice");
    assert_eq!(alice.balance, 100, "The patch must be rolled back");

    // Nested calls reuse the open transaction
    let accounts = table.clone();
    db.transaction(|tx| {
        Box::pin(async move {
            tx.delete(&accounts, ids.1).await?;
            let inner = accounts.clone();
            tx.transaction(|tx| {
                Box::pin(async move {
                    tx.exec(
                        "UPDATE ksql_accounts SET balance = balance + 50",
                        params![],
                    )
                    .await?;
                    tx.delete(&inner, ids.0).await
                })
            })
            .await
        })
    })
    .await
    .expect("Failed to run the nested transaction");
    assert_eq!(count_accounts(db).await, 0);
}
