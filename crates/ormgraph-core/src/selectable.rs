//! Selectable (column / formula) mappings.
//!
//! A logical attribute maps onto zero or more physical selectables: a basic
//! attribute onto one column, a to-one association onto its foreign key
//! columns, an embeddable onto the columns of all its parts. The SQL layer
//! walks these collections in declaration order to lay out the `SELECT` list
//! and the result-set extraction indices.
//!
//! Visiting is offset based: [`SelectableMappings::for_each_selectable_from`]
//! hands each selectable to the consumer at `offset + local_index` and
//! returns how many it visited. Callers composing several collections thread
//! the running offset through those return values, never through shared
//! mutable counters.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::{BoundsError, Result};
use crate::types::SqlType;

/// One physical column or SQL formula participating in an attribute mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectableMapping {
    /// Table (or secondary table) the selectable lives in.
    pub table: &'static str,
    /// Column name, or the formula text for formulas.
    pub expression: Cow<'static, str>,
    /// Whether `expression` is a formula rather than a column.
    pub is_formula: bool,
    /// JDBC-level type descriptor.
    pub sql_type: SqlType,
    pub nullable: bool,
    pub insertable: bool,
    pub updatable: bool,
}

impl SelectableMapping {
    /// Create a nullable, insertable and updatable column mapping.
    pub const fn column(table: &'static str, name: &'static str, sql_type: SqlType) -> Self {
        Self {
            table,
            expression: Cow::Borrowed(name),
            is_formula: false,
            sql_type,
            nullable: true,
            insertable: true,
            updatable: true,
        }
    }

    /// Create a column mapping with a computed name.
    pub fn named_column(table: &'static str, name: String, sql_type: SqlType) -> Self {
        Self {
            expression: Cow::Owned(name),
            ..Self::column(table, "", sql_type)
        }
    }

    /// Create a formula mapping.
    ///
    /// Formulas are read-only: never insertable, never updatable. `{alias}`
    /// inside the formula text is replaced by the owning table alias when the
    /// formula is rendered.
    pub const fn formula(table: &'static str, formula: &'static str, sql_type: SqlType) -> Self {
        Self {
            table,
            expression: Cow::Borrowed(formula),
            is_formula: true,
            sql_type,
            nullable: true,
            insertable: false,
            updatable: false,
        }
    }

    /// Set nullability.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set whether the column participates in INSERT statements.
    pub const fn insertable(mut self, value: bool) -> Self {
        self.insertable = value && !self.is_formula;
        self
    }

    /// Set whether the column participates in UPDATE statements.
    pub const fn updatable(mut self, value: bool) -> Self {
        self.updatable = value && !self.is_formula;
        self
    }

    /// The JDBC mapping (SQL type descriptor) of this selectable.
    pub const fn jdbc_mapping(&self) -> &SqlType {
        &self.sql_type
    }
}

/// A container for multiple selectable (column, formula) mappings.
///
/// Implementations are built once at bootstrap and are read-only thereafter,
/// so they can be shared across threads without synchronization.
pub trait SelectableMappings: fmt::Debug + Send + Sync {
    /// The number of selectables owned directly by this mapping.
    fn count(&self) -> usize;

    /// Get the selectable at the given position.
    ///
    /// Fails with a bounds error unless `index < count()`.
    fn selectable(&self, index: usize) -> Result<&SelectableMapping>;

    /// Visit each contained selectable in declaration order.
    ///
    /// The consumer receives `offset + i` for the i-th selectable. Returns the
    /// number of selectables visited, which always equals [`count`](Self::count).
    fn for_each_selectable_from(
        &self,
        offset: usize,
        consumer: &mut dyn FnMut(usize, &SelectableMapping),
    ) -> usize;

    /// Same as [`for_each_selectable_from`](Self::for_each_selectable_from)
    /// with an offset of `0`.
    fn for_each_selectable(&self, consumer: &mut dyn FnMut(usize, &SelectableMapping)) {
        self.for_each_selectable_from(0, consumer);
    }

    /// The JDBC mappings of the contained selectables, in visit order.
    fn jdbc_mappings(&self) -> Cow<'_, [SqlType]> {
        let mut results = Vec::with_capacity(self.count());
        self.for_each_selectable(&mut |_, selectable| {
            results.push(selectable.jdbc_mapping().clone());
        });
        Cow::Owned(results)
    }
}

/// Visit several collections back to back, starting at `offset`.
///
/// Returns the total number of selectables visited, so the caller can keep
/// offsetting past the whole group.
pub fn for_each_selectable_in(
    collections: &[&dyn SelectableMappings],
    offset: usize,
    consumer: &mut dyn FnMut(usize, &SelectableMapping),
) -> usize {
    let mut span = 0;
    for collection in collections {
        span += collection.for_each_selectable_from(offset + span, consumer);
    }
    span
}

/// An ordered, immutable list of selectables.
///
/// The JDBC mappings are collected once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectableList {
    selectables: Vec<SelectableMapping>,
    #[serde(skip)]
    jdbc_mappings: Vec<SqlType>,
}

impl SelectableList {
    /// Create a list from selectables in declaration order.
    pub fn new(selectables: Vec<SelectableMapping>) -> Self {
        let jdbc_mappings = selectables
            .iter()
            .map(|s| s.jdbc_mapping().clone())
            .collect();
        Self {
            selectables,
            jdbc_mappings,
        }
    }

    /// A list with no selectables (e.g. the inverse side of an association).
    pub const fn empty() -> Self {
        Self {
            selectables: Vec::new(),
            jdbc_mappings: Vec::new(),
        }
    }

    /// A list holding one selectable.
    pub fn single(selectable: SelectableMapping) -> Self {
        Self::new(vec![selectable])
    }

    /// Iterate the selectables in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, SelectableMapping> {
        self.selectables.iter()
    }

    /// Check whether the list holds no selectables.
    pub fn is_empty(&self) -> bool {
        self.selectables.is_empty()
    }
}

impl SelectableMappings for SelectableList {
    fn count(&self) -> usize {
        self.selectables.len()
    }

    fn selectable(&self, index: usize) -> Result<&SelectableMapping> {
        self.selectables.get(index).ok_or_else(|| {
            BoundsError {
                index,
                count: self.selectables.len(),
            }
            .into()
        })
    }

    fn for_each_selectable_from(
        &self,
        offset: usize,
        consumer: &mut dyn FnMut(usize, &SelectableMapping),
    ) -> usize {
        for (i, selectable) in self.selectables.iter().enumerate() {
            consumer(offset + i, selectable);
        }
        self.selectables.len()
    }

    fn jdbc_mappings(&self) -> Cow<'_, [SqlType]> {
        Cow::Borrowed(&self.jdbc_mappings)
    }
}

impl FromIterator<SelectableMapping> for SelectableList {
    fn from_iter<I: IntoIterator<Item = SelectableMapping>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Selectables of an embeddable: an ordered sequence of nested collections.
///
/// Visiting chains the parts, offsetting each by the widths the previous
/// parts reported. The owner never needs to know the total in advance.
#[derive(Debug, Default)]
pub struct CompositeSelectables {
    parts: Vec<Box<dyn SelectableMappings>>,
}

impl CompositeSelectables {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a nested collection.
    #[must_use]
    pub fn part(mut self, part: impl SelectableMappings + 'static) -> Self {
        self.parts.push(Box::new(part));
        self
    }

    /// Number of nested collections.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

impl SelectableMappings for CompositeSelectables {
    fn count(&self) -> usize {
        self.parts.iter().map(|p| p.count()).sum()
    }

    fn selectable(&self, index: usize) -> Result<&SelectableMapping> {
        let mut local = index;
        for part in &self.parts {
            let width = part.count();
            if local < width {
                return part.selectable(local);
            }
            local -= width;
        }
        Err(BoundsError {
            index,
            count: self.count(),
        }
        .into())
    }

    fn for_each_selectable_from(
        &self,
        offset: usize,
        consumer: &mut dyn FnMut(usize, &SelectableMapping),
    ) -> usize {
        let mut span = 0;
        for part in &self.parts {
            span += part.for_each_selectable_from(offset + span, consumer);
        }
        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn address() -> CompositeSelectables {
        CompositeSelectables::new()
            .part(SelectableList::new(vec![
                SelectableMapping::column("company", "street", SqlType::Text),
                SelectableMapping::column("company", "city", SqlType::VarChar(80)),
            ]))
            .part(SelectableList::single(
                SelectableMapping::column("company", "zip", SqlType::Char(5)).nullable(false),
            ))
    }

    #[test]
    fn test_list_count_and_lookup() {
        let list = SelectableList::new(vec![
            SelectableMapping::column("foo", "id", SqlType::BigInt),
            SelectableMapping::column("foo", "bar_id", SqlType::BigInt),
        ]);
        assert_eq!(list.count(), 2);
        assert_eq!(list.selectable(1).unwrap().expression, "bar_id");
    }

    #[test]
    fn test_list_out_of_range() {
        let list = SelectableList::single(SelectableMapping::column("foo", "id", SqlType::BigInt));
        match list.selectable(1) {
            Err(Error::Bounds(e)) => {
                assert_eq!(e.index, 1);
                assert_eq!(e.count, 1);
            }
            other => panic!("expected bounds error, got {other:?}"),
        }
        assert!(SelectableList::empty().selectable(0).is_err());
    }

    #[test]
    fn test_visit_applies_offset_and_returns_count() {
        let list = SelectableList::new(vec![
            SelectableMapping::column("foo", "a", SqlType::Integer),
            SelectableMapping::column("foo", "b", SqlType::Integer),
            SelectableMapping::column("foo", "c", SqlType::Integer),
        ]);
        let mut seen = Vec::new();
        let visited =
            list.for_each_selectable_from(10, &mut |i, s| seen.push((i, s.expression.to_string())));
        assert_eq!(visited, 3);
        assert_eq!(
            seen,
            vec![(10, "a".to_string()), (11, "b".to_string()), (12, "c".to_string())]
        );
    }

    #[test]
    fn test_offsets_are_contiguous_across_collections() {
        let id = SelectableList::single(SelectableMapping::column("company", "id", SqlType::BigInt));
        let addr = address();
        let name = SelectableList::single(SelectableMapping::column("company", "name", SqlType::Text));
        let collections: [&dyn SelectableMappings; 3] = [&id, &addr, &name];

        let mut indices = Vec::new();
        let mut running = 0;
        for c in collections {
            let visited = c.for_each_selectable_from(running, &mut |i, _| indices.push(i));
            assert_eq!(visited, c.count());
            running += visited;
        }
        assert_eq!(indices, (0..5).collect::<Vec<_>>());

        let mut again = Vec::new();
        let total = for_each_selectable_in(&collections, 0, &mut |i, _| again.push(i));
        assert_eq!(total, 5);
        assert_eq!(again, indices);
    }

    #[test]
    fn test_composite_reports_width_and_positional_lookup() {
        let addr = address();
        assert_eq!(addr.part_count(), 2);
        assert_eq!(addr.count(), 3);
        assert_eq!(addr.selectable(2).unwrap().expression, "zip");
        assert!(addr.selectable(3).is_err());

        let mut seen = Vec::new();
        let width = addr.for_each_selectable_from(4, &mut |i, s| seen.push((i, s.expression.to_string())));
        assert_eq!(width, 3);
        assert_eq!(
            seen,
            vec![
                (4, "street".to_string()),
                (5, "city".to_string()),
                (6, "zip".to_string())
            ]
        );
    }

    #[test]
    fn test_jdbc_mappings_match_visit_order() {
        let addr = address();
        let derived = addr.jdbc_mappings();
        assert_eq!(
            derived.as_ref(),
            &[SqlType::Text, SqlType::VarChar(80), SqlType::Char(5)]
        );
        // Repeated calls observe the same state.
        assert_eq!(addr.jdbc_mappings(), derived);

        let list = SelectableList::new(vec![
            SelectableMapping::column("foo", "id", SqlType::BigInt),
            SelectableMapping::formula("foo", "upper({alias}.name)", SqlType::Text),
        ]);
        assert!(matches!(list.jdbc_mappings(), Cow::Borrowed(_)));
        assert_eq!(list.jdbc_mappings().as_ref(), &[SqlType::BigInt, SqlType::Text]);
    }

    #[test]
    fn test_formula_is_read_only() {
        let f = SelectableMapping::formula("foo", "1", SqlType::Integer)
            .insertable(true)
            .updatable(true);
        assert!(f.is_formula);
        assert!(!f.insertable);
        assert!(!f.updatable);
    }
}
