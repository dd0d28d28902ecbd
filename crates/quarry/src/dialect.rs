//! SQL dialect configuration and field escaping.
//!
//! A [`Dialect`] is supplied once per compiler instance and never mutated.
//! Escaping is pure and heavily repeated across queries against the same
//! entities, so results are memoized in a process-wide guarded map keyed by
//! `(field, escape_char)`. Losing a racing insert is fine; recomputation is
//! cheap.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

/// Fields starting with this character skip escaping entirely, passing raw
/// SQL snippets through verbatim.
pub const UNESCAPE_SENTINEL: char = '^';

static FIELD_CACHE: LazyLock<RwLock<HashMap<String, String>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// SQL-flavor-specific rendering rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Character wrapped around identifier segments.
    pub escape_char: String,
    /// Placeholder token: repeated as-is, or suffixed with an ordinal.
    pub placeholder: String,
    /// Whether placeholders carry an incrementing ordinal (`$1`, `$2`, ...).
    pub ordinal: bool,
    /// Whether the dialect supports `INSERT INTO t DEFAULT VALUES`.
    pub insert_default_values: bool,
}

impl Dialect {
    pub fn postgres() -> Self {
        Self {
            escape_char: "\"".into(),
            placeholder: "$".into(),
            ordinal: true,
            insert_default_values: true,
        }
    }

    pub fn mysql() -> Self {
        Self {
            escape_char: "`".into(),
            placeholder: "?".into(),
            ordinal: false,
            insert_default_values: false,
        }
    }

    pub fn sqlite() -> Self {
        Self {
            escape_char: "\"".into(),
            placeholder: "?".into(),
            ordinal: false,
            insert_default_values: true,
        }
    }

    /// Escape a field name for this dialect.
    ///
    /// Each dot-separated segment is wrapped in the escape character, except:
    /// a leading [`UNESCAPE_SENTINEL`] disables escaping; inside a function
    /// call only the innermost token is escaped; a qualified wildcard
    /// (`t.*`) escapes the qualifier only; a bare `*` passes through.
    pub fn escape(&self, field: &str) -> String {
        if self.escape_char.is_empty() || field == "*" {
            return field.to_string();
        }

        let key = format!("{field}\u{0}{}", self.escape_char);
        if let Some(cached) = FIELD_CACHE
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return cached.clone();
        }

        let escaped = self.escape_uncached(field);
        FIELD_CACHE
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, escaped.clone());
        escaped
    }

    fn escape_uncached(&self, field: &str) -> String {
        let e = &self.escape_char;
        if let Some(raw) = field.strip_prefix(UNESCAPE_SENTINEL) {
            return raw.to_string();
        }
        if let (Some(start), Some(end)) = (field.find('('), field.rfind(')'))
            && end > start
        {
            let inner = self.escape_uncached(&field[start + 1..end]);
            return format!("{}{}{}", &field[..=start], inner, &field[end..]);
        }
        if let Some(qualifier) = field.strip_suffix(".*") {
            return format!("{e}{qualifier}{e}.*");
        }
        field
            .split('.')
            .map(|segment| format!("{e}{segment}{e}"))
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_each_dot_segment() {
        let d = Dialect::mysql();
        assert_eq!(d.escape("id"), "`id`");
        assert_eq!(d.escape("users.id"), "`users`.`id`");
    }

    #[test]
    fn sentinel_skips_escaping() {
        let d = Dialect::postgres();
        assert_eq!(d.escape("^count(*) AS total"), "count(*) AS total");
    }

    #[test]
    fn function_call_escapes_inner_token_only() {
        let d = Dialect::mysql();
        assert_eq!(d.escape("count(id)"), "count(`id`)");
        assert_eq!(d.escape("max(users.age)"), "max(`users`.`age`)");
    }

    #[test]
    fn qualified_wildcard_escapes_qualifier_only() {
        let d = Dialect::mysql();
        assert_eq!(d.escape("*"), "*");
        assert_eq!(d.escape("users.*"), "`users`.*");
    }

    #[test]
    fn escaping_is_idempotent_across_calls() {
        let d = Dialect::postgres();
        assert_eq!(d.escape("users.name"), d.escape("users.name"));
    }

    #[test]
    fn cache_is_keyed_by_escape_char() {
        let pg = Dialect::postgres();
        let my = Dialect::mysql();
        assert_eq!(pg.escape("email"), "\"email\"");
        assert_eq!(my.escape("email"), "`email`");
    }

    #[test]
    fn concurrent_escaping_is_consistent() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    let d = Dialect::postgres();
                    (0..100)
                        .map(|i| d.escape(&format!("t.col_{}", i % 10)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut results = handles.into_iter().map(|h| h.join().unwrap());
        let first = results.next().unwrap();
        for other in results {
            assert_eq!(first, other);
        }
    }
}
