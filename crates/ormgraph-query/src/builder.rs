//! The fetch plan builder.
//!
//! Turns resolved fetch sets plus association metadata into join / select /
//! lazy decisions. Within one SQL statement at most one collection is joined:
//! joining two sibling collections multiplies their rows, so every further
//! requested collection is loaded by a secondary select, which starts a new
//! statement of its own.

use std::sync::Arc;

use ormgraph_core::{
    AttributeKind, AttributeMapping, Error, FetchType, GraphErrorKind, Metamodel, Result,
};
use ormgraph_graph::{GraphHint, GraphSemantic, ResolvedFetchSet, resolve};

use crate::config::{CollectionFetchPolicy, FetchPlanConfig};
use crate::plan::{EntityPlan, Fetch, FetchPlan, FetchSource, FetchStyle};

/// Builds [`FetchPlan`]s from graph hints or from metadata defaults.
#[derive(Debug, Clone)]
pub struct FetchPlanBuilder {
    metamodel: Arc<Metamodel>,
    config: FetchPlanConfig,
}

impl FetchPlanBuilder {
    pub fn new(metamodel: Arc<Metamodel>, config: FetchPlanConfig) -> Self {
        Self { metamodel, config }
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.metamodel
    }

    pub fn config(&self) -> &FetchPlanConfig {
        &self.config
    }

    /// Plan a load of the hint's root type.
    pub fn build(&self, hint: &GraphHint) -> Result<FetchPlan> {
        self.plan_for(hint.root_type(), Some(hint))
    }

    /// Plan a load of `entity` from metadata defaults alone.
    pub fn default_plan(&self, entity: &str) -> Result<FetchPlan> {
        self.plan_for(entity, None)
    }

    /// Plan a load of `entity`, optionally driven by a graph hint.
    ///
    /// The graph's root must be `entity` or one of its supertypes, and the
    /// graph must have been built against this builder's metamodel.
    #[tracing::instrument(level = "debug", skip(self, hint), fields(graph = hint.is_some()))]
    pub fn plan_for(&self, entity: &str, hint: Option<&GraphHint>) -> Result<FetchPlan> {
        let root = self.metamodel.entity(entity)?.name;
        if let Some(hint) = hint {
            if !Arc::ptr_eq(hint.graph().metamodel(), &self.metamodel) {
                return Err(Error::config(
                    "entity graph was built against a different metamodel",
                ));
            }
            if !self.metamodel.is_subtype_of(root, hint.root_type()) {
                return Err(Error::graph(
                    GraphErrorKind::TypeMismatch,
                    format!(
                        "a graph on '{}' cannot drive a load of '{}'",
                        hint.root_type(),
                        root
                    ),
                ));
            }
        }

        let mut walk = Walk {
            metamodel: &self.metamodel,
            config: &self.config,
            semantic: hint.map(GraphHint::semantic),
            path: Vec::new(),
        };
        let mut statement = Statement::default();
        let mut site = Site::new(root);
        let mut plans = Vec::new();
        for concrete in self.metamodel.concrete_types_of(root)? {
            let resolved = match hint {
                Some(hint) => Some(resolve(hint.graph(), concrete)?),
                None => None,
            };
            plans.push(walk.plan_entity(concrete, resolved.as_ref(), 0, &mut statement, &mut site)?);
        }

        let plan = FetchPlan {
            root,
            semantic: walk.semantic,
            plans,
        };
        tracing::debug!(
            root = plan.root,
            concrete_types = plan.plans.len(),
            statements = plan.statement_count(),
            "Built fetch plan"
        );
        Ok(plan)
    }
}

/// Per-statement state: whether a collection is already joined.
#[derive(Debug, Default)]
struct Statement {
    collection_joined: bool,
}

/// Eager styles already chosen at one join site, keyed by declaring type and
/// attribute. Concrete types planned at the same site share one set of
/// tables, so an inherited association gets one decision for all of them.
#[derive(Debug)]
struct Site {
    /// The entity type declared at the site.
    declared: &'static str,
    decided: Vec<((&'static str, &'static str), FetchStyle)>,
}

impl Site {
    fn new(declared: &'static str) -> Self {
        Self {
            declared,
            decided: Vec::new(),
        }
    }

    fn style(&self, key: (&'static str, &'static str)) -> Option<FetchStyle> {
        self.decided
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, style)| *style)
    }
}

struct Walk<'a> {
    metamodel: &'a Metamodel,
    config: &'a FetchPlanConfig,
    semantic: Option<GraphSemantic>,
    /// Entities being planned, outermost first.
    path: Vec<&'static str>,
}

impl Walk<'_> {
    fn plan_entity(
        &mut self,
        entity: &'static str,
        resolved: Option<&ResolvedFetchSet>,
        depth: usize,
        statement: &mut Statement,
        site: &mut Site,
    ) -> Result<EntityPlan> {
        self.path.push(entity);
        let fetches = self.plan_fetches(entity, resolved, depth, statement, site);
        self.path.pop();
        Ok(EntityPlan {
            entity,
            fetches: fetches?,
        })
    }

    fn plan_fetches(
        &mut self,
        entity: &'static str,
        resolved: Option<&ResolvedFetchSet>,
        depth: usize,
        statement: &mut Statement,
        site: &mut Site,
    ) -> Result<Vec<Fetch>> {
        let metamodel = self.metamodel;
        let mut fetches = Vec::new();
        for attribute in metamodel.attributes(entity)? {
            if !attribute.kind.is_association() {
                continue;
            }
            let target = metamodel.association_target(attribute)?.name;
            let declared_by = metamodel.declaring_type(entity, attribute.name)?.name;
            let requested = resolved.and_then(|r| r.attribute(attribute.name));
            let narrowed_to = (declared_by != site.declared
                && metamodel.is_subtype_of(declared_by, site.declared))
            .then_some(declared_by);

            let (eager, source) = match (requested, self.semantic) {
                (Some(_), _) => (true, FetchSource::Graph),
                (None, Some(GraphSemantic::Fetch)) => (false, FetchSource::FetchGraph),
                (None, _) => (attribute.fetch == FetchType::Eager, FetchSource::Default),
            };
            let mut fetch = Fetch {
                attribute: attribute.name,
                declared_by,
                kind: attribute.kind,
                style: FetchStyle::Lazy,
                source,
                narrowed_to,
                target,
                targets: Vec::new(),
            };
            if !eager {
                tracing::trace!(entity, attribute = attribute.name, ?source, "Lazy");
                fetches.push(fetch);
                continue;
            }

            let concrete_targets = metamodel.concrete_types_of(target)?;
            if source == FetchSource::Default
                && concrete_targets.iter().any(|t| self.path.contains(t))
            {
                tracing::debug!(
                    entity,
                    attribute = attribute.name,
                    target,
                    "Eager default association closes a cycle; deferring to a secondary select"
                );
                fetch.style = FetchStyle::Select;
                fetches.push(fetch);
                continue;
            }

            let key = (declared_by, attribute.name);
            let style = match site.style(key) {
                Some(style) => style,
                None => {
                    let style = self.choose_style(attribute, depth + 1, statement);
                    site.decided.push((key, style));
                    style
                }
            };
            tracing::trace!(entity, attribute = attribute.name, ?source, style = style.as_str(), "Eager");
            fetch.style = style;

            let mut nested_site = Site::new(target);
            let mut own_statement = Statement::default();
            let (nested_depth, nested_statement) = match style {
                FetchStyle::Join => (depth + 1, &mut *statement),
                _ => (0, &mut own_statement),
            };
            for concrete in concrete_targets {
                let nested = requested.and_then(|r| r.nested_for(concrete));
                fetch.targets.push(self.plan_entity(
                    concrete,
                    nested,
                    nested_depth,
                    nested_statement,
                    &mut nested_site,
                )?);
            }
            fetches.push(fetch);
        }
        Ok(fetches)
    }

    fn choose_style(
        &self,
        attribute: &AttributeMapping,
        depth: usize,
        statement: &mut Statement,
    ) -> FetchStyle {
        if !self.config.allows_join_at(depth) {
            return FetchStyle::Select;
        }
        match attribute.kind {
            AttributeKind::OneToMany | AttributeKind::ManyToMany => {
                if self.config.collection_fetch == CollectionFetchPolicy::AlwaysSelect
                    || statement.collection_joined
                {
                    FetchStyle::Select
                } else {
                    statement.collection_joined = true;
                    FetchStyle::Join
                }
            }
            _ => FetchStyle::Join,
        }
    }
}
