/// A table and the ordered list of its ID columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    id_columns: Vec<String>,
}

impl Table {
    /// Table identified by the single `id` column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_columns: vec!["id".to_string()],
        }
    }

    /// Replace the ID columns, an empty list keeps the default `id`.
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if !ids.is_empty() {
            self.id_columns = ids;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_columns(&self) -> &[String] {
        &self.id_columns
    }

    pub fn is_composite(&self) -> bool {
        self.id_columns.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_id() {
        let table = Table::new("users");
        assert_eq!(table.id_columns(), ["id"]);
        assert!(!table.is_composite());
        let table = Table::new("user_permissions").with_ids(["user_id", "perm_id"]);
        assert_eq!(table.id_columns(), ["user_id", "perm_id"]);
        assert!(table.is_composite());
        assert_eq!(Table::new("t").with_ids(Vec::<String>::new()).id_columns(), ["id"]);
    }
}
