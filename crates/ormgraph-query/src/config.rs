//! Fetch plan configuration.

use serde::Serialize;

/// How eagerly requested collections are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CollectionFetchPolicy {
    /// Join the first collection of each statement, select the rest.
    #[default]
    JoinFirst,
    /// Always load collections with a secondary select.
    AlwaysSelect,
}

/// Fetch plan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchPlanConfig {
    /// Maximum join depth within one statement. Deeper eager fetches become
    /// secondary selects; `Some(0)` disables joins entirely.
    pub max_fetch_depth: Option<usize>,
    /// Collection join policy
    pub collection_fetch: CollectionFetchPolicy,
}

impl FetchPlanConfig {
    /// Create the default configuration: unbounded join depth, first
    /// collection joined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum join depth.
    pub fn max_fetch_depth(mut self, depth: usize) -> Self {
        self.max_fetch_depth = Some(depth);
        self
    }

    /// Set the collection fetch policy.
    pub fn collection_fetch(mut self, policy: CollectionFetchPolicy) -> Self {
        self.collection_fetch = policy;
        self
    }

    /// Whether a join at `depth` (root fetches are depth 1) is allowed.
    pub fn allows_join_at(&self, depth: usize) -> bool {
        self.max_fetch_depth.is_none_or(|max| depth <= max)
    }
}
