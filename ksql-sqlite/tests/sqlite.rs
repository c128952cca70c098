#[cfg(test)]
mod tests {
    use ksql::Connection;
    use ksql_sqlite::SqliteConnection;
    use ksql_tests::{execute_tests, init_logs};
    use std::path::Path;
    use tokio::{fs, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::const_new(());

    #[tokio::test]
    async fn sqlite_memory() {
        init_logs();
        let connection = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in memory database");
        execute_tests(connection).await;
    }

    #[tokio::test]
    async fn sqlite_file() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/ksql_tests.sqlite";
        let _guard = MUTEX.lock().await;
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).await.expect(
                format!("Failed to remove existing test database file {}", DB_PATH).as_str(),
            );
        }
        let connection = SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not open the database");
        execute_tests(connection).await;
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created by the tests"
        );
    }
}
