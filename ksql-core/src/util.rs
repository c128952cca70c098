use std::borrow::Cow;

/// Calls `f` for every value, pushing `separator` between the fragments that
/// actually wrote something.
pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Truncates long text (queries, values) used inside log and error messages.
pub fn truncate_str(value: &str) -> Cow<'_, str> {
    let end = value
        .char_indices()
        .nth(497)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    if end < value.len() {
        Cow::Owned(format!("{}...", value[..end].trim_end()))
    } else {
        Cow::Borrowed(value)
    }
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        $crate::truncate_str(&$query)
    };
}

/// First whitespace separated token of the query.
pub fn first_token(query: &str) -> &str {
    query.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_by_skips_empty_fragments() {
        let mut out = String::from("SET ");
        separated_by(
            &mut out,
            ["a", "", "b"],
            |out, v| out.push_str(v),
            ", ",
        );
        assert_eq!(out, "SET a, b");
    }

    #[test]
    fn truncate_long_keeps_short_queries() {
        assert_eq!(format!("{}", truncate_long!("SELECT 1")), "SELECT 1");
        let long = "é".repeat(600);
        let truncated = format!("{}", truncate_long!(long));
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 500);
    }

    #[test]
    fn first_token_ignores_leading_whitespace() {
        assert_eq!(first_token("\n\t FROM users"), "FROM");
        assert_eq!(first_token(""), "");
    }
}
