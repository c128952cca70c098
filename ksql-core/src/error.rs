use crate::Error;

/// Conditions a caller may want to tell apart from a generic failure.
///
/// They travel inside [`Error`](crate::Error) like any other error, recover
/// them with `error.downcast_ref::<KsqlError>()` or with the helpers below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KsqlError {
    /// The operation succeeded but matched no rows.
    #[error("ksql: the query returned no results")]
    NotFound,
    /// Every candidate field was excluded from the update.
    #[error("ksql: the provided record has no values to update")]
    NoValuesToUpdate,
    /// Returned by a chunk callback to stop the iteration early, never surfaced to the caller.
    #[error("ksql: abort iteration, should only be used inside query_chunks callbacks")]
    AbortIteration,
    #[error("ksql: invalid shape for `{type_name}`: {reason}")]
    InvalidShape {
        type_name: &'static str,
        reason: String,
    },
    #[error("ksql: `{type_name}` has two fields mapped to the same column `{column}`")]
    DuplicateColumn {
        type_name: &'static str,
        column: String,
    },
    #[error("ksql: unknown modifier `{modifier}` on field `{field}`")]
    UnknownModifier { field: String, modifier: String },
    #[error("ksql: field `{field}` has an empty column name in its tag")]
    EmptyColumnName { field: String },
    #[error("ksql: `{type_name}` has no fields tagged with ksql or tablename")]
    MissingTags { type_name: &'static str },
    /// Either the record does not declare the ID column or its value is zero.
    #[error("ksql: missing required ID field `{column}` on record")]
    MissingId { column: String },
    #[error(
        "ksql: nested struct `{type_name}` requires a query starting with FROM, the SELECT clause is generated"
    )]
    NestedStructWithSelect { type_name: &'static str },
    #[error("ksql: the chunk size must be greater than zero")]
    InvalidChunkSize,
}

impl KsqlError {
    pub fn of(error: &Error) -> Option<&KsqlError> {
        error.downcast_ref::<KsqlError>()
    }
}

pub fn is_not_found(error: &Error) -> bool {
    KsqlError::of(error) == Some(&KsqlError::NotFound)
}

pub fn is_abort_iteration(error: &Error) -> bool {
    KsqlError::of(error) == Some(&KsqlError::AbortIteration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn sentinels_survive_context() {
        let error = Err::<(), _>(KsqlError::NotFound)
            .context("While running the query")
            .unwrap_err();
        assert!(is_not_found(&error));
        assert!(!is_abort_iteration(&error));
        let error: Error = KsqlError::AbortIteration.into();
        assert!(is_abort_iteration(&error));
    }
}
