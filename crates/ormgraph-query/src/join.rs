//! JOIN clauses of fetch statements.

use serde::Serialize;

use ormgraph_core::quote_ident;

/// Types of SQL joins used by fetch statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinType {
    Inner,
    Left,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    /// Type of join
    pub join_type: JoinType,
    /// Table to join
    pub table: &'static str,
    /// Table alias
    pub alias: String,
    /// ON condition, already qualified with aliases
    pub on: String,
    /// Dotted fetch path that introduced the join; empty for inheritance joins
    pub path: String,
}

impl Join {
    /// Create an INNER JOIN.
    pub fn inner(table: &'static str, alias: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            join_type: JoinType::Inner,
            table,
            alias: alias.into(),
            on: on.into(),
            path: String::new(),
        }
    }

    /// Create a LEFT JOIN.
    pub fn left(table: &'static str, alias: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            join_type: JoinType::Left,
            table,
            alias: alias.into(),
            on: on.into(),
            path: String::new(),
        }
    }

    /// Record the fetch path this join serves.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Generate SQL for this JOIN clause, with a leading space.
    pub fn to_sql(&self) -> String {
        format!(
            " {} {} AS {} ON {}",
            self.join_type.as_str(),
            quote_ident(self.table),
            self.alias,
            self.on
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_join_sql() {
        let join = Join::left("bar", "t1", "t1.\"id\" = t0.\"bar_id\"").path("bar");
        assert_eq!(join.to_sql(), " LEFT JOIN \"bar\" AS t1 ON t1.\"id\" = t0.\"bar_id\"");
        assert_eq!(join.path, "bar");
    }

    #[test]
    fn test_inner_join_sql() {
        let join = Join::inner("employee", "t1", "t1.\"id\" = t0.\"id\"");
        assert!(join.to_sql().starts_with(" INNER JOIN \"employee\""));
        assert!(join.path.is_empty());
    }
}
