use crate::placeholder;
use ksql::{Connection, KsqlDb, Provider, Record, Table, is_not_found, params};

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct User {
    #[ksql("id")]
    id: i64,
    #[ksql("name")]
    name: String,
    #[ksql("age")]
    age: Option<i32>,
}

/// Reads the columns under a different case than the one they are declared with.
#[derive(Record, Default, Debug)]
struct UserName {
    #[ksql("name")]
    name: String,
    #[ksql("age")]
    age: i32,
}

pub async fn users<C: Connection>(db: &mut KsqlDb<C>) {
    let dialect = db.connection().dialect();
    let table = Table::new("ksql_users");

    // Setup
    db.exec("DROP TABLE IF EXISTS ksql_users", params![])
        .await
        .expect("Failed to drop ksql_users table");
    db.exec(
        "CREATE TABLE ksql_users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        params![],
    )
    .await
    .expect("Failed to create ksql_users table");

    // Insert
    let mut fernanda = User {
        name: "Fernanda".into(),
        ..Default::default()
    };
    db.insert(&table, &mut fernanda)
        .await
        .expect("Failed to insert Fernanda");
    assert_ne!(fernanda.id, 0, "The generated ID must be written back");
    let mut bia = User {
        name: "Bia".into(),
        age: Some(0),
        ..Default::default()
    };
    db.insert(&table, &mut bia)
        .await
        .expect("Failed to insert Bia");
    assert_ne!(bia.id, 0);
    assert_ne!(bia.id, fernanda.id);

    // Query one
    let by_id = format!("FROM ksql_users WHERE id = {}", placeholder(dialect, 1));
    let mut user = User::default();
    db.query_one(&mut user, &by_id, params![fernanda.id])
        .await
        .expect("Failed to query Fernanda");
    assert_eq!(user, fernanda);
    assert_eq!(user.age, None);
    db.query_one(&mut user, &by_id, params![bia.id])
        .await
        .expect("Failed to query Bia");
    assert_eq!(user, bia);
    assert_eq!(user.age, Some(0), "A zero must not read back as NULL");

    // Query many
    let mut users = Vec::<User>::new();
    db.query(&mut users, "FROM ksql_users ORDER BY id", params![])
        .await
        .expect("Failed to query the users");
    assert_eq!(users, [fernanda.clone(), bia.clone()]);
    let mut names = Vec::<UserName>::new();
    db.query(
        &mut names,
        "SELECT NAME, AGE FROM ksql_users ORDER BY id",
        params![],
    )
    .await
    .expect("Failed to query the user names");
    assert_eq!(names.len(), 2);
    assert_eq!(names[0].name, "Fernanda");
    assert_eq!(names[0].age, 0, "NULL must read as the default");
    assert_eq!(names[1].name, "Bia");

    // Empty result keeps the collection empty
    db.query(
        &mut users,
        &format!("FROM ksql_users WHERE name = {}", placeholder(dialect, 1)),
        params!["Nobody"],
    )
    .await
    .expect("Failed to query a missing user");
    assert!(users.is_empty());

    // Patch
    db.patch(
        &table,
        &User {
            id: bia.id,
            name: "Bia Santos".into(),
            age: None,
        },
    )
    .await
    .expect("Failed to patch Bia");
    db.query_one(&mut user, &by_id, params![bia.id])
        .await
        .expect("Failed to query the patched Bia");
    assert_eq!(user.name, "Bia Santos");
    assert_eq!(user.age, Some(0), "A NULL field must not be updated");
    let error = db
        .patch(
            &table,
            &User {
                id: 999_999,
                name: "Ghost".into(),
                age: None,
            },
        )
        .await
        .expect_err("Patching a missing row must fail");
    assert!(is_not_found(&error), "Unexpected error: {:#}", error);

    // Exec
    let affected = db
        .exec(
            &format!(
                "UPDATE ksql_users SET age = {} WHERE id = {}",
                placeholder(dialect, 1),
                placeholder(dialect, 2)
            ),
            params![27, fernanda.id],
        )
        .await
        .expect("Failed to update Fernanda's age");
    assert_eq!(affected, 1);

    // Delete
    db.delete(&table, fernanda.id)
        .await
        .expect("Failed to delete Fernanda by ID");
    db.delete(&table, &bia)
        .await
        .expect("Failed to delete Bia by record");
    let error = db
        .delete(&table, bia.id)
        .await
        .expect_err("Deleting a row twice must fail");
    assert!(is_not_found(&error), "Unexpected error: {:#}", error);
    let error = db
        .query_one(&mut user, &by_id, params![fernanda.id])
        .await
        .expect_err("Fernanda should be gone");
    assert!(is_not_found(&error), "Unexpected error: {:#}", error);
}
