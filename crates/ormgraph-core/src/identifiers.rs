//! Identifier validation and quoting.
//!
//! Entity and attribute names are checked once at bootstrap so that graph
//! text and dotted attribute paths can be tokenized unambiguously. Table and
//! column names are quoted when SQL fragments are rendered.

use std::sync::OnceLock;

use regex::Regex;

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

/// Check whether `name` is usable as an entity or attribute name.
///
/// Names must start with a letter or underscore and contain only ASCII
/// alphanumerics and underscores; `.`, `(`, `)`, `:` and `,` are reserved for
/// graph paths and graph text.
///
/// # Examples
///
/// ```
/// use ormgraph_core::is_valid_identifier;
///
/// assert!(is_valid_identifier("employees"));
/// assert!(!is_valid_identifier("bar.foos"));
/// assert!(!is_valid_identifier("1st"));
/// ```
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use ormgraph_core::quote_ident;
///
/// assert_eq!(quote_ident("foo"), "\"foo\"");
/// assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a column expression with a table alias.
///
/// Formulas are returned with every `{alias}` placeholder substituted, since
/// they cannot be quoted as a single identifier.
#[inline]
pub fn qualify(alias: &str, expression: &str, is_formula: bool) -> String {
    if is_formula {
        expression.replace("{alias}", alias)
    } else {
        format!("{}.{}", alias, quote_ident(expression))
    }
}
