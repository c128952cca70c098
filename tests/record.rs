#[cfg(test)]
mod tests {
    use ksql::{
        KsqlError, POSTGRES, Record, RowLabeled, RowNames, SQLITE, SQLSERVER, StructInfoCache,
        Value, fill_many, fill_one,
    };
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use std::{str::FromStr, sync::Arc};
    use uuid::Uuid;

    #[derive(Record, Default, Debug, Clone, PartialEq)]
    struct User {
        #[ksql("id")]
        id: i64,
        #[ksql("name")]
        name: String,
        #[ksql("age")]
        age: i32,
        /// Not a column
        visits: u32,
    }

    #[derive(Record, Default, Debug, PartialEq)]
    struct Invoice {
        #[ksql("uid")]
        uid: Uuid,
        #[ksql("total")]
        total: Decimal,
        #[ksql("paid")]
        paid: Option<bool>,
    }

    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Theme {
        dark: bool,
        accent: String,
    }

    #[derive(Record, Default, Debug)]
    struct Settings {
        #[ksql("theme,json")]
        theme: Theme,
        #[ksql("labels,json")]
        labels: Option<Vec<String>>,
    }

    #[derive(Record, Default, Debug)]
    struct Duplicated {
        #[ksql("name")]
        first: String,
        #[ksql("name,skipUpdates")]
        second: String,
    }

    #[derive(Record, Default, Debug, PartialEq)]
    struct Post {
        #[ksql("id")]
        id: i64,
        #[ksql("title")]
        title: String,
    }

    #[derive(Record, Default, Debug)]
    struct UserPost {
        #[tablename("u")]
        user: User,
        #[tablename("p")]
        post: Post,
    }

    #[derive(Record, Default, Debug)]
    struct NestedNested {
        #[tablename("x")]
        inner: UserPost,
    }

    fn row(labels: &[&str], values: Vec<Value>) -> RowLabeled {
        let labels: RowNames = labels.iter().map(|v| v.to_string()).collect();
        RowLabeled::new(labels, values.into())
    }

    #[test]
    fn resolve_is_cached() {
        let cache = StructInfoCache::new();
        assert!(cache.is_empty());
        let first = cache.resolve::<User>().expect("Failed to resolve User");
        let second = cache.resolve::<User>().expect("Failed to resolve User");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.fields().len(), 3, "Untagged fields are not columns");
        assert_eq!(first.by_name("age").index, 2);
        assert!(!first.by_name("visits").valid);
    }

    #[test]
    fn select_clause_per_dialect() {
        let cache = StructInfoCache::new();
        assert_eq!(
            &*cache.select_clause::<User>(&SQLITE).unwrap(),
            "SELECT `id`, `name`, `age`"
        );
        assert_eq!(
            &*cache.select_clause::<User>(&POSTGRES).unwrap(),
            r#"SELECT "id", "name", "age""#
        );
        assert_eq!(
            &*cache.select_clause::<UserPost>(&SQLSERVER).unwrap(),
            "SELECT [u].[id], [u].[name], [u].[age], [p].[id], [p].[title]"
        );
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let cache = StructInfoCache::new();
        let error = cache.resolve::<Duplicated>().unwrap_err();
        assert!(matches!(
            KsqlError::of(&error),
            Some(KsqlError::DuplicateColumn { column, .. }) if column == "name"
        ));
        assert!(cache.is_empty(), "Invalid records are not cached");
    }

    #[test]
    fn nested_members_must_be_plain() {
        let cache = StructInfoCache::new();
        assert!(cache.resolve::<UserPost>().unwrap().is_nested());
        let error = cache.resolve::<NestedNested>().unwrap_err();
        assert!(matches!(
            KsqlError::of(&error),
            Some(KsqlError::InvalidShape { .. })
        ));
    }

    #[test]
    fn fill_by_name() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let mut user = User {
            visits: 3,
            ..Default::default()
        };
        fill_one(
            &cache,
            &info,
            row(
                &["age", "extra", "name"],
                vec![
                    Value::Int64(Some(0)),
                    Value::Varchar(Some("ignored".into())),
                    Value::Varchar(Some("Bia".into())),
                ],
            ),
            &mut user,
        )
        .expect("Failed to fill the user");
        assert_eq!(
            user,
            User {
                id: 0,
                name: "Bia".into(),
                age: 0,
                visits: 3,
            }
        );
    }

    #[test]
    fn fill_nulls_with_defaults() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let mut user = User {
            age: 40,
            ..Default::default()
        };
        fill_one(
            &cache,
            &info,
            row(&["ID", "age"], vec![Value::Int64(Some(5)), Value::Null]),
            &mut user,
        )
        .expect("Failed to fill the user");
        assert_eq!(user.id, 5);
        assert_eq!(user.age, 0);
    }

    #[test]
    fn fill_typed_values() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<Invoice>().unwrap();
        let uid = Uuid::from_str("6f9619ff-8b86-d011-b42d-00cf4fc964ff").unwrap();
        let mut invoice = Invoice::default();
        fill_one(
            &cache,
            &info,
            row(
                &["uid", "total", "paid"],
                vec![
                    Value::Varchar(Some(uid.to_string())),
                    Value::Varchar(Some("19.90".into())),
                    Value::Int64(Some(1)),
                ],
            ),
            &mut invoice,
        )
        .expect("Failed to fill the invoice");
        assert_eq!(
            invoice,
            Invoice {
                uid,
                total: Decimal::from_str("19.90").unwrap(),
                paid: Some(true),
            }
        );
    }

    #[test]
    fn decode_errors_name_the_field() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let error = fill_one(
            &cache,
            &info,
            row(&["age"], vec![Value::Varchar(Some("forty".into()))]),
            &mut User::default(),
        )
        .unwrap_err();
        let message = format!("{:#}", error);
        assert!(message.contains("`age`"), "{}", message);
        assert!(message.contains("User"), "{}", message);
    }

    #[test]
    fn fill_nested_by_position() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<UserPost>().unwrap();
        let mut joined = UserPost::default();
        fill_one(
            &cache,
            &info,
            row(
                &["id", "name", "age", "id", "title"],
                vec![
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("Fernanda".into())),
                    Value::Int64(Some(31)),
                    Value::Int64(Some(10)),
                    Value::Varchar(Some("Hello".into())),
                ],
            ),
            &mut joined,
        )
        .expect("Failed to fill the nested record");
        assert_eq!(joined.user.id, 1);
        assert_eq!(joined.user.name, "Fernanda");
        assert_eq!(joined.user.age, 31);
        assert_eq!(
            joined.post,
            Post {
                id: 10,
                title: "Hello".into()
            }
        );

        let error = fill_one(
            &cache,
            &info,
            row(&["id", "name"], vec![Value::Int64(Some(1)), Value::Null]),
            &mut joined,
        )
        .unwrap_err();
        assert!(matches!(
            KsqlError::of(&error),
            Some(KsqlError::InvalidShape { .. })
        ));
    }

    #[test]
    fn fill_many_replaces_content() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<Post>().unwrap();
        let mut posts = vec![Post {
            id: 99,
            title: "stale".into(),
        }];
        fill_many(
            &cache,
            &info,
            [
                row(&["id"], vec![Value::Int64(Some(1))]),
                row(&["id"], vec![Value::Int64(Some(2))]),
            ],
            &mut posts,
        )
        .expect("Failed to fill the posts");
        assert_eq!(
            posts,
            [
                Post {
                    id: 1,
                    title: "".into()
                },
                Post {
                    id: 2,
                    title: "".into()
                }
            ]
        );
        fill_many(&cache, &info, Vec::new(), &mut posts).expect("Failed to fill no posts");
        assert!(posts.is_empty());
    }

    #[test]
    fn fill_json_documents() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<Settings>().unwrap();
        assert!(info.by_name("theme").modifiers.serialize_as_json);
        let mut settings = Settings::default();
        fill_one(
            &cache,
            &info,
            row(
                &["theme", "labels"],
                vec![
                    Value::Blob(Some(br#"{"dark":true,"accent":"teal"}"#.to_vec().into())),
                    Value::Varchar(Some(r#"["a","b"]"#.into())),
                ],
            ),
            &mut settings,
        )
        .expect("Failed to fill the JSON documents");
        assert_eq!(
            settings.theme,
            Theme {
                dark: true,
                accent: "teal".into()
            }
        );
        assert_eq!(settings.labels, Some(vec!["a".into(), "b".into()]));

        fill_one(
            &cache,
            &info,
            row(&["theme", "labels"], vec![Value::Null, Value::Null]),
            &mut settings,
        )
        .expect("Failed to fill the NULL documents");
        assert_eq!(settings.theme, Theme::default());
        assert_eq!(settings.labels, None);

        let error = fill_one(
            &cache,
            &info,
            row(&["labels"], vec![Value::Int64(Some(1))]),
            &mut settings,
        )
        .unwrap_err();
        assert!(format!("{:#}", error).contains("`labels`"));
        assert_eq!(
            settings.encode_field(1).unwrap(),
            Value::Null,
            "A None document is NULL"
        );
    }
}
