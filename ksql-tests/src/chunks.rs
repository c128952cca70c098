use ksql::{
    ChunkParser, Connection, Error, KsqlDb, KsqlError, Provider, Record, Table, params,
};

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Item {
    #[ksql("id")]
    id: i64,
    #[ksql("name")]
    name: String,
}

const ALL_ITEMS: &str = "FROM ksql_items ORDER BY id";

pub async fn chunks<C: Connection>(db: &mut KsqlDb<C>) {
    let table = Table::new("ksql_items");

    // Setup
    db.exec("DROP TABLE IF EXISTS ksql_items", params![])
        .await
        .expect("Failed to drop ksql_items table");
    db.exec(
        "CREATE TABLE ksql_items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        params![],
    )
    .await
    .expect("Failed to create ksql_items table");
    for name in ["first", "second", "third"] {
        db.insert(
            &table,
            &mut Item {
                name: name.into(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to insert an item");
    }

    // Last chunk is partial
    let mut sizes = Vec::new();
    let mut names = Vec::new();
    db.query_chunks(ChunkParser {
        query: ALL_ITEMS,
        params: params![],
        chunk_size: 2,
        for_each_chunk: |chunk: &[Item]| {
            sizes.push(chunk.len());
            names.extend(chunk.iter().map(|v| v.name.clone()));
            Ok(())
        },
    })
    .await
    .expect("Failed to read the items in chunks");
    assert_eq!(sizes, [2, 1]);
    assert_eq!(names, ["first", "second", "third"]);

    // Exact multiple produces no empty chunk
    db.insert(
        &table,
        &mut Item {
            name: "fourth".into(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to insert the fourth item");
    let mut sizes = Vec::new();
    db.query_chunks(ChunkParser {
        query: ALL_ITEMS,
        params: params![],
        chunk_size: 2,
        for_each_chunk: |chunk: &[Item]| {
            sizes.push(chunk.len());
            Ok(())
        },
    })
    .await
    .expect("Failed to read the items in chunks");
    assert_eq!(sizes, [2, 2]);

    // Larger than the result
    let mut sizes = Vec::new();
    db.query_chunks(ChunkParser {
        query: ALL_ITEMS,
        params: params![],
        chunk_size: 100,
        for_each_chunk: |chunk: &[Item]| {
            sizes.push(chunk.len());
            Ok(())
        },
    })
    .await
    .expect("Failed to read the items in one chunk");
    assert_eq!(sizes, [4]);

    // Abort stops without error
    let mut calls = 0;
    db.query_chunks(ChunkParser {
        query: ALL_ITEMS,
        params: params![],
        chunk_size: 1,
        for_each_chunk: |_: &[Item]| {
            calls += 1;
            Err(Error::from(KsqlError::AbortIteration))
        },
    })
    .await
    .expect("Aborting must not be an error");
    assert_eq!(calls, 1);

    // Any other error is returned
    let mut calls = 0;
    let error = db
        .query_chunks(ChunkParser {
            query: ALL_ITEMS,
            params: params![],
            chunk_size: 3,
            for_each_chunk: |_: &[Item]| {
                calls += 1;
                Err(Error::msg("chunk rejected"))
            },
        })
        .await
        .expect_err("The callback error must be returned");
    assert_eq!(calls, 1);
    assert!(format!("{:#}", error).contains("chunk rejected"));

    // Zero is not a chunk size
    let error = db
        .query_chunks(ChunkParser {
            query: ALL_ITEMS,
            params: params![],
            chunk_size: 0,
            for_each_chunk: |_: &[Item]| Ok(()),
        })
        .await
        .expect_err("A zero chunk size must be rejected");
    assert!(matches!(
        KsqlError::of(&error),
        Some(KsqlError::InvalidChunkSize)
    ));
}
