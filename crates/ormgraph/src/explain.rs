//! Explain output: a fetch plan together with the statements it issues.

use ormgraph_core::{Metamodel, Result};
use ormgraph_graph::GraphHint;
use ormgraph_query::{FetchPlan, SqlShape, plan_shapes};
use ormgraph_session::Session;
use serde::Serialize;

/// A fetch plan and its SQL shapes, root statement first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    pub plan: FetchPlan,
    pub statements: Vec<SqlShape>,
}

impl Explain {
    /// Explain a plan built elsewhere.
    pub fn from_plan(metamodel: &Metamodel, plan: FetchPlan) -> Result<Self> {
        let statements = plan_shapes(metamodel, &plan)?;
        Ok(Self { plan, statements })
    }

    /// Explain what `session.find(entity, _, hint)` would do.
    #[tracing::instrument(level = "debug", skip(session, hint))]
    pub fn for_load(session: &Session, entity: &str, hint: Option<&GraphHint>) -> Result<Self> {
        let plan = session.explain(entity, hint)?;
        Self::from_plan(session.metamodel(), plan)
    }

    /// Rendered statements, root first.
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(SqlShape::to_sql).collect()
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
