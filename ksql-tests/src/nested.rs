use ksql::{Connection, KsqlDb, KsqlError, Provider, Record, Table, params};

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Author {
    #[ksql("id")]
    id: i64,
    #[ksql("name")]
    name: String,
}

#[derive(Record, Default, Debug, Clone, PartialEq)]
struct Post {
    #[ksql("id")]
    id: i64,
    #[ksql("author_id")]
    author_id: i64,
    #[ksql("title")]
    title: String,
}

#[derive(Record, Default, Debug)]
struct AuthorPost {
    #[tablename("a")]
    author: Author,
    #[tablename("p")]
    post: Post,
}

const JOINED: &str = "FROM ksql_authors AS a JOIN ksql_posts AS p ON p.author_id = a.id ORDER BY p.id";

pub async fn nested<C: Connection>(db: &mut KsqlDb<C>) {
    let authors = Table::new("ksql_authors");
    let posts = Table::new("ksql_posts");

    // Setup
    for (drop, create) in [
        (
            "DROP TABLE IF EXISTS ksql_posts",
            "CREATE TABLE ksql_posts (id INTEGER PRIMARY KEY, author_id INTEGER NOT NULL, title TEXT NOT NULL)",
        ),
        (
            "DROP TABLE IF EXISTS ksql_authors",
            "CREATE TABLE ksql_authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        ),
    ] {
        db.exec(drop, params![])
            .await
            .expect("Failed to drop a nested test table");
        db.exec(create, params![])
            .await
            .expect("Failed to create a nested test table");
    }
    let mut ada = Author {
        name: "Ada".into(),
        ..Default::default()
    };
    db.insert(&authors, &mut ada)
        .await
        .expect("Failed to insert Ada");
    let mut grace = Author {
        name: "Grace".into(),
        ..Default::default()
    };
    db.insert(&authors, &mut grace)
        .await
        .expect("Failed to insert Grace");
    let mut inserted = Vec::new();
    for (author, title) in [
        (&ada, "Notes on the analytical engine"),
        (&grace, "Compilers for everyone"),
        (&ada, "Bernoulli numbers"),
    ] {
        let mut post = Post {
            author_id: author.id,
            title: title.into(),
            ..Default::default()
        };
        db.insert(&posts, &mut post)
            .await
            .expect("Failed to insert a post");
        inserted.push(post);
    }

    // Join
    let mut rows = Vec::<AuthorPost>::new();
    db.query(&mut rows, JOINED, params![])
        .await
        .expect("Failed to query the joined authors and posts");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].author, ada);
    assert_eq!(rows[0].post, inserted[0]);
    assert_eq!(rows[1].author, grace);
    assert_eq!(rows[1].post, inserted[1]);
    assert_eq!(rows[2].author, ada);
    assert_eq!(rows[2].post.title, "Bernoulli numbers");

    let mut row = AuthorPost::default();
    db.query_one(&mut row, JOINED, params![])
        .await
        .expect("Failed to query the first joined row");
    assert_eq!(row.author.name, "Ada");

    // An explicit SELECT cannot be mapped onto a nested record
    let error = db
        .query(
            &mut rows,
            "SELECT a.id, a.name, p.id, p.author_id, p.title FROM ksql_authors AS a JOIN ksql_posts AS p ON p.author_id = a.id",
            params![],
        )
        .await
        .expect_err("A nested record must reject an explicit SELECT");
    assert!(matches!(
        KsqlError::of(&error),
        Some(KsqlError::NestedStructWithSelect { .. })
    ));
}
