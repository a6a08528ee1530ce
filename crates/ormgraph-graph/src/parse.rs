//! Text form of entity graphs.
//!
//! ```text
//! graph    := item ("," item)*
//! item     := name (":" subtype)? ("(" graph ")")?
//! ```
//!
//! `bar(foos)` adds a subgraph on `bar` keyed by its declared target;
//! `managers:Manager(friends)` keys the subgraph by a subtype. Naming a bare
//! attribute twice is harmless, but opening a second subgraph with the same
//! key under one node is a duplicate-subgraph error, as with
//! [`Subgraph::add_subgraph_of`]. Nesting is limited to
//! [`MAX_NESTING_DEPTH`] levels.

use std::sync::Arc;

use ormgraph_core::{Error, Metamodel, Result};

use crate::graph::EntityGraph;
use crate::subgraph::Subgraph;

/// Deepest subgraph nesting accepted in graph text.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Parse `text` into a new graph rooted at `root`.
///
/// # Example
///
/// ```ignore
/// let graph = parse_graph(&metamodel, "Company", "employees(managers, friends)")?;
/// ```
pub fn parse_graph(metamodel: &Arc<Metamodel>, root: &str, text: &str) -> Result<EntityGraph> {
    let mut graph = EntityGraph::new(metamodel, root)?;
    parse_into(&mut graph, text)?;
    Ok(graph)
}

/// Parse `text` and add its nodes to an existing graph.
///
/// On error the graph keeps the nodes parsed before the failing position.
pub fn parse_into(graph: &mut EntityGraph, text: &str) -> Result<()> {
    let mut parser = GraphParser::new(text);
    parser.parse_list(graph.root_mut())?;
    parser.skip_whitespace();
    if let Some(c) = parser.peek_char() {
        return Err(Error::parse(parser.pos, format!("unexpected '{c}'")));
    }
    Ok(())
}

#[derive(Debug)]
struct GraphParser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> GraphParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// The character at the cursor. The cursor only ever advances over ASCII,
    /// so it sits on a char boundary.
    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self, what: &str) -> Result<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(Error::parse(start, format!("expected {what}")));
        }
        let input = self.input;
        Ok(&input[start..self.pos])
    }

    fn parse_list(&mut self, level: &mut Subgraph) -> Result<()> {
        loop {
            self.parse_item(level)?;
            if !self.eat(b',') {
                return Ok(());
            }
        }
    }

    fn parse_item(&mut self, level: &mut Subgraph) -> Result<()> {
        let name = self.identifier("attribute name")?;
        let subtype = if self.eat(b':') {
            Some(self.identifier("subtype name")?)
        } else {
            None
        };

        if self.eat(b'(') {
            if self.depth == MAX_NESTING_DEPTH {
                return Err(Error::parse(
                    self.pos,
                    format!("subgraphs nested deeper than {MAX_NESTING_DEPTH} levels"),
                ));
            }
            let nested = match subtype {
                Some(subtype) => level.add_subgraph_of(name, subtype)?,
                None => level.add_subgraph(name)?,
            };
            self.depth += 1;
            self.parse_list(nested)?;
            self.depth -= 1;
            if !self.eat(b')') {
                return Err(Error::parse(self.pos, "expected ')'"));
            }
        } else if subtype.is_some() {
            return Err(Error::parse(self.pos, "expected '(' after subtype"));
        } else {
            level.add_attribute_node(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use ormgraph_core::{GraphErrorKind, MetadataErrorKind};

    #[test]
    fn test_parse_flat() {
        let graph = parse_graph(&fixtures::model(), "Foo", "bar, baz").unwrap();
        assert_eq!(graph.attribute_names(), vec!["bar", "baz"]);
    }

    #[test]
    fn test_parse_nested_and_subtype() {
        let graph = parse_graph(
            &fixtures::model(),
            "Company",
            "employees( managers, friends, managers:Manager(managers, friends) )",
        )
        .unwrap();
        let employees = graph.find_attribute_node("employees").unwrap();
        let employee = employees.subgraph("Employee").unwrap();
        assert_eq!(employee.attribute_names(), vec!["managers", "friends"]);
        let managers = employee.find_attribute_node("managers").unwrap();
        assert_eq!(
            managers.subgraph("Manager").unwrap().attribute_names(),
            vec!["managers", "friends"]
        );
    }

    #[test]
    fn test_parse_matches_builder() {
        let model = fixtures::model();
        let parsed = parse_graph(&model, "Foo", "bar(foos), baz").unwrap();

        let mut built = EntityGraph::new(&model, "Foo").unwrap();
        built.add_subgraph("bar").unwrap().add_attribute_node("foos").unwrap();
        built.add_attribute_node("baz").unwrap();
        assert_eq!(parsed, built);
    }

    #[test]
    fn test_repeated_bare_attribute_is_one_node() {
        let graph = parse_graph(&fixtures::model(), "Foo", "bar, bar(foos), bar").unwrap();
        assert_eq!(graph.attribute_names(), vec!["bar"]);
        let bar = graph.find_attribute_node("bar").unwrap();
        assert_eq!(bar.subgraphs().len(), 1);
    }

    #[test]
    fn test_repeated_subgraph_is_duplicate() {
        let model = fixtures::model();
        let err = parse_graph(&model, "Foo", "bar(foos), bar(foos)").unwrap_err();
        assert_eq!(err.graph_kind(), Some(GraphErrorKind::DuplicateSubgraph));

        let err = parse_graph(
            &model,
            "Company",
            "employees(managers:Manager(friends), managers:Manager(managers))",
        )
        .unwrap_err();
        assert_eq!(err.graph_kind(), Some(GraphErrorKind::DuplicateSubgraph));

        // Distinct keys under one attribute are fine.
        parse_graph(&model, "Company", "employees(friends(friends), friends:Manager(friends))")
            .unwrap();
    }

    #[test]
    fn test_nesting_depth_is_capped() {
        let model = fixtures::model();
        let nested = |levels: usize| {
            let mut text = "friends".to_string();
            for _ in 0..levels {
                text = format!("friends({text})");
            }
            text
        };
        parse_graph(&model, "Employee", &nested(MAX_NESTING_DEPTH)).unwrap();
        let err = parse_graph(&model, "Employee", &nested(MAX_NESTING_DEPTH + 1)).unwrap_err();
        assert_eq!(err.graph_kind(), Some(GraphErrorKind::Parse));
        assert!(err.to_string().contains("nested deeper"), "{err}");
    }

    #[test]
    fn test_non_ascii_input_is_reported_whole() {
        let err = parse_graph(&fixtures::model(), "Foo", "bar é").unwrap_err();
        assert_eq!(err.graph_kind(), Some(GraphErrorKind::Parse));
        assert!(err.to_string().contains("unexpected 'é'"), "{err}");
        assert!(err.to_string().contains("offset 4"), "{err}");
    }

    #[test]
    fn test_parse_into_existing_graph() {
        let mut graph = EntityGraph::new(&fixtures::model(), "Foo").unwrap();
        graph.add_attribute_node("baz").unwrap();
        parse_into(&mut graph, "bar").unwrap();
        assert_eq!(graph.attribute_names(), vec!["baz", "bar"]);
    }

    #[test]
    fn test_parse_errors_carry_position() {
        let model = fixtures::model();
        for (text, offset) in [("", 0), ("bar,", 4), ("bar(foos", 8), ("bar baz", 4), ("bar:Bar", 7)] {
            let err = parse_graph(&model, "Foo", text).unwrap_err();
            assert_eq!(err.graph_kind(), Some(GraphErrorKind::Parse), "{text:?}");
            assert!(err.to_string().contains(&format!("offset {offset}")), "{text:?}: {err}");
        }
    }

    #[test]
    fn test_parse_unknown_attribute_is_metadata_error() {
        let err = parse_graph(&fixtures::model(), "Foo", "bar(bogus)").unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::UnknownAttribute));
    }
}
