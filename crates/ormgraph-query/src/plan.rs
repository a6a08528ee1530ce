//! Fetch plans: the per-association join / select / lazy decisions.

use serde::Serialize;

use ormgraph_core::{AttributeKind, Result};
use ormgraph_graph::GraphSemantic;

/// How one association is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchStyle {
    /// Fetched by a join in the owner's statement.
    Join,
    /// Fetched by a secondary select, which opens a new statement.
    Select,
    /// Left as a proxy or uninitialized collection.
    Lazy,
}

impl FetchStyle {
    pub const fn is_eager(self) -> bool {
        !matches!(self, FetchStyle::Lazy)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FetchStyle::Join => "join",
            FetchStyle::Select => "select",
            FetchStyle::Lazy => "lazy",
        }
    }
}

/// Why an association got its style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchSource {
    /// Requested by the entity graph.
    Graph,
    /// The association's declared fetch type.
    Default,
    /// Forced lazy because a fetch graph does not name it.
    FetchGraph,
}

/// The plan for one association of one concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fetch {
    pub attribute: &'static str,
    /// Entity declaring the attribute (the owner or one of its supertypes).
    pub declared_by: &'static str,
    pub kind: AttributeKind,
    pub style: FetchStyle,
    pub source: FetchSource,
    /// Set when the attribute is declared on a strict subtype of the type
    /// declared at this fetch site, so it applies only to owners of that
    /// subtype.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrowed_to: Option<&'static str>,
    /// Declared target entity.
    pub target: &'static str,
    /// Plans for each concrete target type, when eager.
    ///
    /// Empty for lazy fetches, and for eager default fetches where planning
    /// stopped at a cycle of eager associations; such targets are planned
    /// when they are loaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<EntityPlan>,
}

impl Fetch {
    pub fn is_eager(&self) -> bool {
        self.style.is_eager()
    }

    /// Eager, but the target plans were not computed up front.
    pub fn is_deferred(&self) -> bool {
        self.is_eager() && self.targets.is_empty()
    }

    /// The dotted path of this fetch below `prefix`.
    ///
    /// A fetch narrowed to a subtype qualifies its owner segment the way the
    /// graph syntax does, so `Dog.toys` and `Cat.toys` below `pets` become
    /// `pets:Dog.toys` and `pets:Cat.toys`.
    pub fn path(&self, prefix: &str) -> String {
        fetch_path(prefix, self.narrowed_to, self.attribute)
    }

    /// The plan for targets whose runtime type is `concrete_type`.
    pub fn target_plan(&self, concrete_type: &str) -> Option<&EntityPlan> {
        self.targets.iter().find(|p| p.entity == concrete_type)
    }
}

pub(crate) fn fetch_path(
    prefix: &str,
    narrowed_to: Option<&str>,
    attribute: &str,
) -> String {
    match (narrowed_to, prefix.is_empty()) {
        (None, true) => attribute.to_string(),
        (None, false) => format!("{prefix}.{attribute}"),
        (Some(owner), _) => format!("{prefix}:{owner}.{attribute}"),
    }
}

/// The fetches for one concrete entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityPlan {
    pub entity: &'static str,
    /// One entry per association, inherited ones first.
    pub fetches: Vec<Fetch>,
}

impl EntityPlan {
    pub fn fetch(&self, attribute: &str) -> Option<&Fetch> {
        self.fetches.iter().find(|f| f.attribute == attribute)
    }

    /// Associations that are initialized when the entity is loaded.
    pub fn eager_fetches(&self) -> impl Iterator<Item = &Fetch> {
        self.fetches.iter().filter(|f| f.is_eager())
    }

    fn collect_selects(&self, prefix: &str, out: &mut Vec<String>) {
        for fetch in &self.fetches {
            let path = fetch.path(prefix);
            if fetch.style == FetchStyle::Select && !out.contains(&path) {
                out.push(path.clone());
            }
            for target in &fetch.targets {
                target.collect_selects(&path, out);
            }
        }
    }
}

/// A complete fetch plan for a load of `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    /// The requested entity type.
    pub root: &'static str,
    /// Graph semantic, or `None` for a plan built from metadata defaults.
    pub semantic: Option<GraphSemantic>,
    /// One plan per concrete type the root can take.
    pub plans: Vec<EntityPlan>,
}

impl FetchPlan {
    /// The plan for a root instance whose runtime type is `concrete_type`.
    pub fn for_type(&self, concrete_type: &str) -> Option<&EntityPlan> {
        self.plans.iter().find(|p| p.entity == concrete_type)
    }

    /// Dotted paths of the associations loaded by secondary selects.
    pub fn secondary_selects(&self) -> Vec<String> {
        let mut out = Vec::new();
        for plan in &self.plans {
            plan.collect_selects("", &mut out);
        }
        out
    }

    /// Number of statements a load following this plan issues, counting one
    /// per distinct secondary-select path. Paths of fetches narrowed to
    /// different subtypes never coincide.
    pub fn statement_count(&self) -> usize {
        1 + self.secondary_selects().len()
    }

    /// Render as pretty-printed JSON ("explain" output).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
