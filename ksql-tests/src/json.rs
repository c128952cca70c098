use crate::placeholder;
use ksql::{Connection, KsqlDb, Provider, Record, Table, params};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
struct Address {
    street: String,
    city: String,
    floor: Option<u8>,
}

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Profile {
    #[ksql("id")]
    id: i64,
    #[ksql("address,json")]
    address: Option<Address>,
    #[ksql("tags,json")]
    tags: Vec<String>,
    #[ksql("created_at,timeNowUTC/skipUpdates")]
    created_at: Option<OffsetDateTime>,
    #[ksql("updated_at,timeNowUTC")]
    updated_at: Option<OffsetDateTime>,
    #[ksql("note,skipInserts")]
    note: Option<String>,
}

pub async fn json<C: Connection>(db: &mut KsqlDb<C>) {
    let dialect = db.connection().dialect();
    let table = Table::new("ksql_profiles");
    let by_id = format!("FROM ksql_profiles WHERE id = {}", placeholder(dialect, 1));

    // Setup
    db.exec("DROP TABLE IF EXISTS ksql_profiles", params![])
        .await
        .expect("Failed to drop ksql_profiles table");
    db.exec(
        "CREATE TABLE ksql_profiles (id INTEGER PRIMARY KEY, address TEXT, tags TEXT, created_at TEXT, updated_at TEXT, note TEXT)",
        params![],
    )
    .await
    .expect("Failed to create ksql_profiles table");

    // Insert
    let before = OffsetDateTime::now_utc();
    let address = Address {
        street: "Rua Augusta 1508".into(),
        city: "São Paulo".into(),
        floor: Some(3),
    };
    let mut profile = Profile {
        address: Some(address.clone()),
        tags: vec!["admin".into(), "beta".into()],
        note: Some("never stored".into()),
        ..Default::default()
    };
    db.insert(&table, &mut profile)
        .await
        .expect("Failed to insert the profile");
    let mut stored = Profile::default();
    db.query_one(&mut stored, &by_id, params![profile.id])
        .await
        .expect("Failed to query the profile");
    assert_eq!(stored.address, Some(address.clone()));
    assert_eq!(stored.tags, ["admin", "beta"]);
    assert_eq!(stored.note, None, "skipInserts column must not be inserted");
    let created_at = stored
        .created_at
        .expect("timeNowUTC column must be set on insert");
    assert!(created_at >= before);
    assert!(stored.updated_at.is_some());

    // A NULL document reads as the default
    let mut empty = Profile::default();
    db.insert(&table, &mut empty)
        .await
        .expect("Failed to insert an empty profile");
    db.query_one(&mut stored, &by_id, params![empty.id])
        .await
        .expect("Failed to query the empty profile");
    assert_eq!(stored.address, None);
    assert!(stored.tags.is_empty());

    // Patch
    db.patch(
        &table,
        &Profile {
            id: profile.id,
            tags: vec!["admin".into()],
            note: Some("stored on update".into()),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to patch the profile");
    db.query_one(&mut stored, &by_id, params![profile.id])
        .await
        .expect("Failed to query the patched profile");
    assert_eq!(stored.address, Some(address), "A None document must not be updated");
    assert_eq!(stored.tags, ["admin"]);
    assert_eq!(stored.note.as_deref(), Some("stored on update"));
    assert_eq!(
        stored.created_at,
        Some(created_at),
        "skipUpdates column must not be updated"
    );
    let updated_at = stored
        .updated_at
        .expect("timeNowUTC column must be set on update");
    assert!(updated_at >= created_at);
}
