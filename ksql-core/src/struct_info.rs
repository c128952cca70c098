use crate::{Dialect, FieldDecl, KsqlError, Record, Result, write_select_columns};
use std::{
    any::{self, TypeId},
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

/// Behaviors attached to a column through the modifier list of its tag.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    /// Stored as a JSON document.
    pub serialize_as_json: bool,
    /// Never written by inserts.
    pub skip_inserts: bool,
    /// Never written by updates.
    pub skip_updates: bool,
    /// Written with the current UTC time instead of the field value.
    pub time_now_utc: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        serialize_as_json: false,
        skip_inserts: false,
        skip_updates: false,
        time_now_utc: false,
    };
}

/// Splits a tag like `"created_at,timeNowUTC/skipUpdates"` into the column
/// name and its modifiers. Modifiers are separated by `,` or `/`.
pub fn parse_tag(field: &str, tag: &str) -> Result<(String, Modifiers)> {
    let (name, rest) = tag.split_once(',').unwrap_or((tag, ""));
    let name = name.trim();
    if name.is_empty() {
        return Err(KsqlError::EmptyColumnName {
            field: field.to_owned(),
        }
        .into());
    }
    let mut modifiers = Modifiers::default();
    for modifier in rest.split([',', '/']).map(str::trim).filter(|v| !v.is_empty()) {
        match modifier {
            "json" => modifiers.serialize_as_json = true,
            "skipInserts" => modifiers.skip_inserts = true,
            "skipUpdates" => modifiers.skip_updates = true,
            "timeNowUTC" => modifiers.time_now_utc = true,
            _ => {
                return Err(KsqlError::UnknownModifier {
                    field: field.to_owned(),
                    modifier: modifier.to_owned(),
                }
                .into());
            }
        }
    }
    Ok((name.to_owned(), modifiers))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Column name, or table alias for the fields of a nested struct.
    pub name: String,
    /// Declaration position of the field.
    pub index: usize,
    /// False for the placeholder returned by lookups that do not match.
    pub valid: bool,
    pub modifiers: Modifiers,
}

static INVALID_FIELD: FieldInfo = FieldInfo {
    name: String::new(),
    index: 0,
    valid: false,
    modifiers: Modifiers::NONE,
};

/// Column metadata of a record type, computed once and shared through
/// [`StructInfoCache`].
#[derive(Debug, Clone)]
pub struct StructInfo {
    type_name: &'static str,
    is_nested: bool,
    fields: Vec<FieldInfo>,
    by_index: HashMap<usize, usize>,
    by_name: HashMap<String, usize>,
    // Lowercase name to position, `None` when two columns fold to the same name
    by_folded_name: HashMap<String, Option<usize>>,
}

impl StructInfo {
    /// Builds the metadata from the declared fields.
    ///
    /// Plain `ksql` tags win: `tablename` tags are only considered when no
    /// field carries a `ksql` tag, and then the struct is nested.
    pub fn from_decls(type_name: &'static str, decls: &[FieldDecl]) -> Result<StructInfo> {
        let mut fields = Vec::with_capacity(decls.len());
        for (index, decl) in decls.iter().enumerate() {
            let Some(tag) = decl.tag else {
                continue;
            };
            if let Some(alias) = decl.table_alias {
                log::warn!(
                    "Field `{}` of `{}` has both a ksql tag and the tablename `{}`, the tablename is ignored",
                    decl.ident,
                    type_name,
                    alias
                );
            }
            let (name, modifiers) = parse_tag(decl.ident, tag)?;
            fields.push(FieldInfo {
                name,
                index,
                valid: true,
                modifiers,
            });
        }
        let mut is_nested = false;
        if fields.is_empty() {
            for (index, decl) in decls.iter().enumerate() {
                let Some(alias) = decl.table_alias else {
                    continue;
                };
                let name = alias.trim();
                if name.is_empty() {
                    return Err(KsqlError::EmptyColumnName {
                        field: decl.ident.to_owned(),
                    }
                    .into());
                }
                fields.push(FieldInfo {
                    name: name.to_owned(),
                    index,
                    valid: true,
                    modifiers: Modifiers::default(),
                });
            }
            is_nested = !fields.is_empty();
        }
        let mut by_index = HashMap::with_capacity(fields.len());
        let mut by_name = HashMap::with_capacity(fields.len());
        let mut by_folded_name = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), position).is_some() {
                return Err(KsqlError::DuplicateColumn {
                    type_name,
                    column: field.name.clone(),
                }
                .into());
            }
            by_index.insert(field.index, position);
            by_folded_name
                .entry(field.name.to_lowercase())
                .and_modify(|v| *v = None)
                .or_insert(Some(position));
        }
        Ok(StructInfo {
            type_name,
            is_nested,
            fields,
            by_index,
            by_name,
            by_folded_name,
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_nested(&self) -> bool {
        self.is_nested
    }

    /// Mapped fields in declaration order.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn by_index(&self, index: usize) -> &FieldInfo {
        self.by_index
            .get(&index)
            .map(|&i| &self.fields[i])
            .unwrap_or(&INVALID_FIELD)
    }

    /// Exact match first, then a case insensitive match if it is unambiguous.
    pub fn by_name(&self, name: &str) -> &FieldInfo {
        if let Some(&i) = self.by_name.get(name) {
            return &self.fields[i];
        }
        match self.by_folded_name.get(&name.to_lowercase()) {
            Some(Some(i)) => &self.fields[*i],
            _ => &INVALID_FIELD,
        }
    }
}

/// Process lifetime cache of [`StructInfo`] keyed by record type, plus the
/// generated SELECT clauses keyed by record type and dialect.
///
/// Entries are never evicted. Two concurrent misses on the same type compute
/// the same value and the last write wins.
#[derive(Default, Debug)]
pub struct StructInfoCache {
    infos: RwLock<HashMap<TypeId, Arc<StructInfo>>>,
    selects: RwLock<HashMap<(TypeId, &'static str), Arc<str>>>,
}

static GLOBAL_CACHE: LazyLock<Arc<StructInfoCache>> =
    LazyLock::new(|| Arc::new(StructInfoCache::new()));

impl StructInfoCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Shared instance used when no cache is injected.
    pub fn global() -> Arc<StructInfoCache> {
        GLOBAL_CACHE.clone()
    }

    pub fn resolve<R: Record>(&self) -> Result<Arc<StructInfo>> {
        let key = TypeId::of::<R>();
        if let Some(info) = self
            .infos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(info.clone());
        }
        let type_name = any::type_name::<R>();
        let info = StructInfo::from_decls(type_name, R::declared_fields())?;
        if info.is_nested() {
            for field in info.fields() {
                let nested = R::nested_struct_info(self, field.index).ok_or_else(|| {
                    KsqlError::InvalidShape {
                        type_name,
                        reason: format!(
                            "field `{}` is tagged with tablename but does not hold a record",
                            field.name
                        ),
                    }
                })??;
                if nested.is_nested() || nested.fields().is_empty() {
                    return Err(KsqlError::InvalidShape {
                        type_name,
                        reason: format!(
                            "the record `{}` of table `{}` must have plain ksql tags",
                            nested.type_name(),
                            field.name
                        ),
                    }
                    .into());
                }
            }
        }
        let info = Arc::new(info);
        self.infos
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, info.clone());
        Ok(info)
    }

    /// The `SELECT ...` clause listing the columns of `R` for `dialect`.
    pub fn select_clause<R: Record>(&self, dialect: &dyn Dialect) -> Result<Arc<str>> {
        let key = (TypeId::of::<R>(), dialect.name());
        if let Some(select) = self
            .selects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(select.clone());
        }
        let info = self.resolve::<R>()?;
        let mut select = String::with_capacity(16 + info.fields().len() * 16);
        select.push_str("SELECT ");
        write_select_columns::<R>(self, dialect, &info, &mut select)?;
        let select: Arc<str> = select.into();
        self.selects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, select.clone());
        Ok(select)
    }

    /// Number of record types resolved so far.
    pub fn len(&self) -> usize {
        self.infos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn decl(
        ident: &'static str,
        tag: Option<&'static str>,
        table_alias: Option<&'static str>,
    ) -> FieldDecl {
        FieldDecl {
            ident,
            tag,
            table_alias,
        }
    }

    #[test]
    fn parse_tag_modifiers() {
        assert_eq!(
            parse_tag("name", "name").unwrap(),
            ("name".to_string(), Modifiers::default())
        );
        let (name, modifiers) = parse_tag("created", "created_at,timeNowUTC/skipUpdates").unwrap();
        assert_eq!(name, "created_at");
        assert!(modifiers.time_now_utc);
        assert!(modifiers.skip_updates);
        assert!(!modifiers.skip_inserts);
        let (_, modifiers) = parse_tag("address", " address , json").unwrap();
        assert!(modifiers.serialize_as_json);
        assert!(matches!(
            KsqlError::of(&parse_tag("x", "x,yaml").unwrap_err()),
            Some(KsqlError::UnknownModifier { .. })
        ));
        assert!(matches!(
            KsqlError::of(&parse_tag("x", ",json").unwrap_err()),
            Some(KsqlError::EmptyColumnName { .. })
        ));
    }

    #[test]
    fn plain_fields_skip_untagged() {
        let info = StructInfo::from_decls(
            "User",
            &[
                decl("id", Some("id"), None),
                decl("cache", None, None),
                decl("name", Some("name"), None),
            ],
        )
        .unwrap();
        assert!(!info.is_nested());
        assert_eq!(info.fields().len(), 2);
        assert_eq!(info.by_name("name").index, 2);
        assert!(info.by_name("name").valid);
        assert!(!info.by_name("cache").valid);
        assert!(!info.by_index(1).valid);
        assert_eq!(info.by_index(0).name, "id");
    }

    #[test]
    fn duplicate_columns_fail() {
        let error = StructInfo::from_decls(
            "User",
            &[decl("a", Some("name"), None), decl("b", Some("name"), None)],
        )
        .unwrap_err();
        assert_eq!(
            KsqlError::of(&error),
            Some(&KsqlError::DuplicateColumn {
                type_name: "User",
                column: "name".into()
            })
        );
    }

    #[test]
    fn table_aliases_make_a_nested_struct() {
        let info = StructInfo::from_decls(
            "UserPost",
            &[decl("user", None, Some("u")), decl("post", None, Some("p"))],
        )
        .unwrap();
        assert!(info.is_nested());
        assert_eq!(info.by_name("p").index, 1);
    }

    #[test]
    fn ksql_tags_win_over_table_aliases() {
        let info = StructInfo::from_decls(
            "Mixed",
            &[
                decl("id", Some("id"), Some("t")),
                decl("post", None, Some("p")),
            ],
        )
        .unwrap();
        assert!(!info.is_nested());
        assert_eq!(info.fields().len(), 1);
        assert!(!info.by_name("p").valid);
    }

    #[test]
    fn names_fall_back_to_case_insensitive() {
        let info = StructInfo::from_decls(
            "User",
            &[decl("name", Some("name"), None), decl("age", Some("Age"), None)],
        )
        .unwrap();
        assert_eq!(info.by_name("NAME").index, 0);
        assert_eq!(info.by_name("age").index, 1);
        let info = StructInfo::from_decls(
            "Ambiguous",
            &[decl("a", Some("name"), None), decl("b", Some("Name"), None)],
        )
        .unwrap();
        assert_eq!(info.by_name("Name").index, 1);
        assert!(!info.by_name("NAME").valid);
    }

    #[derive(Default)]
    struct Account {
        id: i64,
        owner: String,
    }

    impl Record for Account {
        fn declared_fields() -> &'static [FieldDecl] {
            static FIELDS: [FieldDecl; 2] = [
                FieldDecl {
                    ident: "id",
                    tag: Some("id"),
                    table_alias: None,
                },
                FieldDecl {
                    ident: "owner",
                    tag: Some("owner"),
                    table_alias: None,
                },
            ];
            &FIELDS
        }
        fn encode_field(&self, index: usize) -> Result<Value> {
            match index {
                0 => crate::encode_value(&self.id),
                1 => crate::encode_value(&self.owner),
                _ => Err(crate::unmapped_field::<Self>(index)),
            }
        }
        fn decode_field(&mut self, index: usize, value: Value) -> Result<()> {
            match index {
                0 => crate::decode_value(&mut self.id, value),
                1 => crate::decode_value(&mut self.owner, value),
                _ => Err(crate::unmapped_field::<Self>(index)),
            }
        }
    }

    #[test]
    fn concurrent_resolve() {
        let cache = Arc::new(StructInfoCache::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.resolve::<Account>().unwrap())
            })
            .collect();
        let resolved: Vec<Arc<StructInfo>> = handles
            .into_iter()
            .map(|v| v.join().expect("The resolving thread panicked"))
            .collect();
        assert_eq!(cache.len(), 1);
        let cached = cache.resolve::<Account>().unwrap();
        for info in &resolved {
            assert_eq!(info.fields(), cached.fields());
        }
        assert_eq!(cached.by_name("owner").index, 1);
    }
}
