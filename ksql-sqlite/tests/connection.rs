#[cfg(test)]
mod tests {
    use ksql::{Connection, Executor, Provider, QueryResult, Value, params, stream::TryStreamExt};
    use ksql_sqlite::SqliteConnection;
    use ksql_tests::{init_logs, silent_logs};
    use std::path::Path;
    use tokio::{fs, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::const_new(());

    async fn memory() -> SqliteConnection {
        SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in memory database")
    }

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/ksql_creation.sqlite";
        let _guard = MUTEX.lock().await;
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH))
            .await
            .expect("Could not open the database");
        fs::remove_file(DB_PATH)
            .await
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{}?mode=ro", DB_PATH))
                    .await
                    .is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                SqliteConnection::connect("postgres://some_value")
                    .await
                    .is_err()
            );
        };
    }

    #[tokio::test]
    async fn types() {
        init_logs();
        let mut connection = memory().await;
        let rows: Vec<_> = connection
            .fetch("SELECT NULL AS a, 42 AS b, 1.5 AS c, 'text' AS d, x'0102' AS e".into())
            .try_collect()
            .await
            .expect("Failed to select the literals");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.names(), ["a", "b", "c", "d", "e"]);
        assert_eq!(
            row.values(),
            [
                Value::Null,
                Value::Int64(Some(42)),
                Value::Float64(Some(1.5)),
                Value::Varchar(Some("text".into())),
                Value::Blob(Some([1u8, 2].into())),
            ]
        );
    }

    #[tokio::test]
    async fn statements() {
        init_logs();
        let mut connection = memory().await;
        let results: Vec<_> = connection
            .run("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)".into())
            .try_collect()
            .await
            .expect("Failed to create the table");
        assert!(matches!(results.as_slice(), [QueryResult::Affected(_)]));
        let affected = connection
            .execute(ksql::Query::new(
                "INSERT INTO t (v) VALUES (?), (?)",
                params!["a", "b"],
            ))
            .await
            .expect("Failed to insert the rows");
        assert_eq!(affected.rows_affected, 2);
        assert_eq!(affected.last_affected_id, Some(2));
        silent_logs! {
            assert!(
                connection
                    .execute("INSERT INTO t (v) VALUES (?)".into())
                    .await
                    .is_err(),
                "Missing parameters must be rejected"
            );
            assert!(
                connection
                    .execute("SELECT 1; SELECT 2".into())
                    .await
                    .is_err(),
                "Multiple statements must be rejected"
            );
            assert!(
                connection
                    .execute("SELEC 1".into())
                    .await
                    .is_err(),
                "Syntax errors must be reported"
            );
        }
    }

    #[tokio::test]
    async fn transaction_rollback() {
        init_logs();
        let mut db = ksql::KsqlDb::new(memory().await);
        db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", params![])
            .await
            .expect("Failed to create the table");
        let result = db
            .transaction(|tx| {
                Box::pin(async move {
                    tx.exec("INSERT INTO t (v) VALUES ('x')", params![]).await?;
                    Err::<(), _>(ksql::Error::msg("stop"))
                })
            })
            .await;
        assert!(result.is_err());
        let count = db
            .exec("DELETE FROM t", params![])
            .await
            .expect("Failed to delete the rows");
        assert_eq!(count, 0, "The insert must have been rolled back");
    }
}
