//! Hierarchical policy store.
//!
//! A [`PolicyStore`] keeps per-entity allow/suppress state as a prefix tree
//! over lower-cased path segments. Two rules are deliberately asymmetric:
//!
//! - [`PolicyStore::check_access`] is a point lookup. Only the flags on the
//!   terminal node of the queried path are consulted, so a suppressed
//!   ancestor does not by itself block a descendant that is allowed.
//! - [`PolicyStore::flatten`] prunes every subtree rooted at a suppressed
//!   node, whatever `allowed` flags sit beneath it.
//!
//! A path under a suppressed ancestor can therefore be `Allowed` on lookup
//! while never being exported. Both behaviors are kept as-is.
//!
//! The store performs no internal synchronization. It has a single writer;
//! readers running concurrently with a writer need an external lock or a
//! cloned snapshot.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use symbiont_core::{FieldPath, PathSegment};

/// Result of a point lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessDecision {
    /// Terminal node is allowed and not suppressed
    Allowed,
    /// Path is unknown, or known but never allowed
    DeniedNotFound,
    /// Terminal node is suppressed; wins over any allowance
    BlockedSuppressed,
}

impl AccessDecision {
    /// Whether the field may pass
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl std::fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => write!(f, "ALLOWED"),
            Self::DeniedNotFound => write!(f, "DENIED_NOT_FOUND"),
            Self::BlockedSuppressed => write!(f, "BLOCKED_SUPPRESSED"),
        }
    }
}

/// One node of the policy trie
///
/// A node is exclusively owned by its parent. Nothing is shared between
/// stores; transduction copies flag values and creates fresh nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyNode {
    children: HashMap<PathSegment, PolicyNode>,
    allowed: bool,
    suppressed: bool,
}

impl PolicyNode {
    /// Create an empty node with both flags cleared
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist marker
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Suppression marker
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Look up a direct child
    #[must_use]
    pub fn child(&self, segment: &PathSegment) -> Option<&PolicyNode> {
        self.children.get(segment)
    }

    /// Iterate over direct children
    pub fn children(&self) -> impl Iterator<Item = (&PathSegment, &PolicyNode)> {
        self.children.iter()
    }

    /// Get the child for `segment`, inserting an empty node if missing
    fn child_or_insert(&mut self, segment: PathSegment) -> &mut PolicyNode {
        self.children.entry(segment).or_default()
    }

    /// Whether this node or any node below it is suppressed
    ///
    /// Full subtree scan, O(size of subtree). A maintained per-node counter
    /// would make this O(1) without changing results.
    #[must_use]
    pub fn has_suppressed_descendant(&self) -> bool {
        self.suppressed
            || self
                .children
                .values()
                .any(PolicyNode::has_suppressed_descendant)
    }

    fn count(&self) -> usize {
        1 + self.children.values().map(PolicyNode::count).sum::<usize>()
    }
}

/// Outcome of a transduction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransductionReport {
    /// Nodes whose `suppressed` flag went from false to true
    pub newly_suppressed: usize,
    /// Nodes created to carry suppression knowledge
    pub created: usize,
}

impl TransductionReport {
    /// Whether the target changed at all
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.newly_suppressed == 0 && self.created == 0
    }
}

/// Per-entity policy trie
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyStore {
    root: PolicyNode,
}

impl PolicyStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the trie
    #[must_use]
    pub fn root(&self) -> &PolicyNode {
        &self.root
    }

    /// Total number of nodes, root included
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.count()
    }

    /// Whether nothing has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Whitelist `path`, creating intermediate nodes as needed
    ///
    /// Empty or malformed paths are ignored.
    pub fn allow_path(&mut self, path: &str) {
        let path = FieldPath::parse(path);
        if let Some(node) = self.node_or_insert(&path) {
            node.allowed = true;
            tracing::debug!(path = %path, "allowed path");
        }
    }

    /// Suppress `path`, creating intermediate nodes as needed
    ///
    /// Never clears `allowed`; suppression simply wins at lookup time.
    pub fn suppress_path(&mut self, path: &str) {
        let path = FieldPath::parse(path);
        if let Some(node) = self.node_or_insert(&path) {
            node.suppressed = true;
            tracing::debug!(path = %path, "suppressed path");
        }
    }

    /// Point lookup of `path`
    ///
    /// Fails fast with [`AccessDecision::DeniedNotFound`] at the first
    /// missing segment and never creates nodes.
    #[must_use]
    pub fn check_access(&self, path: &str) -> AccessDecision {
        let Some(node) = self.node(&FieldPath::parse(path)) else {
            return AccessDecision::DeniedNotFound;
        };

        if node.suppressed {
            AccessDecision::BlockedSuppressed
        } else if node.allowed {
            AccessDecision::Allowed
        } else {
            AccessDecision::DeniedNotFound
        }
    }

    /// Find the node at `path` without creating anything
    #[must_use]
    pub fn node(&self, path: &FieldPath) -> Option<&PolicyNode> {
        if path.is_empty() {
            return None;
        }
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    fn node_or_insert(&mut self, path: &FieldPath) -> Option<&mut PolicyNode> {
        if path.is_empty() {
            return None;
        }
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node.child_or_insert(segment.clone());
        }
        Some(node)
    }

    /// Copy suppression knowledge from `source` into this store
    ///
    /// Walks both tries in lock-step. A suppressed source node suppresses
    /// the matching node here. A source child with no counterpart here is
    /// materialized (with `allowed` cleared) only if it, or something below
    /// it, is suppressed. Never sets `allowed`, never removes nodes.
    pub fn transduce_immunity(&mut self, source: &PolicyStore) -> TransductionReport {
        let mut report = TransductionReport::default();
        transduce_node(&mut self.root, &source.root, &mut report);
        tracing::debug!(
            newly_suppressed = report.newly_suppressed,
            created = report.created,
            "transduced immunity"
        );
        report
    }

    /// Export every allowed, non-suppressed path
    ///
    /// Suppressed nodes are not descended into, so their whole subtree is
    /// absent from the output.
    #[must_use]
    pub fn flatten(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        flatten_node(&self.root, &FieldPath::default(), &mut out);
        out
    }
}

fn transduce_node(target: &mut PolicyNode, source: &PolicyNode, report: &mut TransductionReport) {
    if source.suppressed && !target.suppressed {
        target.suppressed = true;
        report.newly_suppressed += 1;
    }

    for (segment, source_child) in &source.children {
        if let Some(target_child) = target.children.get_mut(segment) {
            transduce_node(target_child, source_child, report);
        } else if source_child.has_suppressed_descendant() {
            report.created += 1;
            let target_child = target.child_or_insert(segment.clone());
            transduce_node(target_child, source_child, report);
        }
    }
}

fn flatten_node(node: &PolicyNode, path: &FieldPath, out: &mut BTreeSet<String>) {
    if node.allowed && !node.suppressed && !path.is_empty() {
        out.insert(path.to_string());
    }

    if node.suppressed {
        return;
    }

    for (segment, child) in &node.children {
        flatten_node(child, &path.child(segment.clone()), out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_allow_then_check() {
        let mut store = PolicyStore::new();
        store.allow_path("user.profile");
        assert_eq!(store.check_access("user.profile"), AccessDecision::Allowed);
    }

    #[test]
    fn test_allow_then_suppress() {
        let mut store = PolicyStore::new();
        store.allow_path("payload.content");
        store.suppress_path("payload.content");
        assert_eq!(
            store.check_access("payload.content"),
            AccessDecision::BlockedSuppressed
        );
    }

    #[test]
    fn test_suppress_then_allow_still_blocked() {
        let mut store = PolicyStore::new();
        store.suppress_path("user.input");
        store.allow_path("user.input");
        assert_eq!(store.check_access("user.input"), AccessDecision::BlockedSuppressed);
    }

    #[test]
    fn test_unknown_path() {
        let store = PolicyStore::new();
        assert_eq!(store.check_access("unknown.path"), AccessDecision::DeniedNotFound);
    }

    #[test]
    fn test_intermediate_node_is_not_allowed() {
        let mut store = PolicyStore::new();
        store.allow_path("user.address.city");
        assert_eq!(store.check_access("user.address"), AccessDecision::DeniedNotFound);
        assert_eq!(store.check_access("user.address.city"), AccessDecision::Allowed);
    }

    #[test]
    fn test_case_insensitive() {
        let mut store = PolicyStore::new();
        store.allow_path("User.Profile");
        assert_eq!(store.check_access("USER.profile"), AccessDecision::Allowed);
        assert!(store.flatten().contains("user.profile"));
    }

    #[test]
    fn test_empty_and_malformed_paths_are_noops() {
        let mut store = PolicyStore::new();
        store.allow_path("");
        store.suppress_path("");
        store.allow_path("a..b");
        assert!(store.is_empty());
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.check_access(""), AccessDecision::DeniedNotFound);
        assert_eq!(store.check_access("a..b"), AccessDecision::DeniedNotFound);
    }

    #[test]
    fn test_node_count() {
        let mut store = PolicyStore::new();
        assert!(store.is_empty());
        assert_eq!(store.node_count(), 1);

        store.allow_path("user.name");
        store.allow_path("user.email");
        assert!(!store.is_empty());
        assert_eq!(store.node_count(), 4);
    }

    #[test]
    fn test_check_access_does_not_create_nodes() {
        let store = PolicyStore::new();
        let _ = store.check_access("a.b.c");
        assert!(store.is_empty());
    }

    #[test]
    fn test_point_lookup_ignores_suppressed_ancestor() {
        let mut store = PolicyStore::new();
        store.allow_path("x.y");
        store.suppress_path("x");
        assert_eq!(store.check_access("x.y"), AccessDecision::Allowed);
        assert!(store.flatten().is_empty());
    }

    #[test]
    fn test_flatten_basic() {
        let mut store = PolicyStore::new();
        store.allow_path("user.name");
        store.allow_path("user.email");
        store.allow_path("order.id");
        let expected: BTreeSet<String> = ["user.name", "user.email", "order.id"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(store.flatten(), expected);
    }

    #[test]
    fn test_flatten_excludes_suppressed_leaf() {
        let mut store = PolicyStore::new();
        store.allow_path("payload.header");
        store.allow_path("payload.content");
        store.suppress_path("payload.content");
        let flat = store.flatten();
        assert!(flat.contains("payload.header"));
        assert!(!flat.contains("payload.content"));
    }

    #[test]
    fn test_flatten_prunes_suppressed_subtree() {
        let mut store = PolicyStore::new();
        store.allow_path("x.y");
        store.allow_path("x.z");
        store.suppress_path("x");
        assert!(store.flatten().is_empty());
    }

    #[test]
    fn test_flatten_keeps_allowed_ancestor_and_descendant() {
        let mut store = PolicyStore::new();
        store.allow_path("user");
        store.allow_path("user.name");
        let flat = store.flatten();
        assert!(flat.contains("user"));
        assert!(flat.contains("user.name"));
    }

    #[test]
    fn test_transduction_creates_blocking_node() {
        let mut source = PolicyStore::new();
        source.suppress_path("shared.vulnerability");

        let mut target = PolicyStore::new();
        assert_eq!(
            target.check_access("shared.vulnerability"),
            AccessDecision::DeniedNotFound
        );

        let report = target.transduce_immunity(&source);
        assert_eq!(report.created, 2);
        assert_eq!(report.newly_suppressed, 1);
        assert_eq!(
            target.check_access("shared.vulnerability"),
            AccessDecision::BlockedSuppressed
        );
        // The intermediate node only carries the path
        assert_eq!(target.check_access("shared"), AccessDecision::DeniedNotFound);
    }

    #[test]
    fn test_transduction_suppresses_existing_node() {
        let mut source = PolicyStore::new();
        source.allow_path("payload.content");
        source.suppress_path("payload.content");

        let mut target = PolicyStore::new();
        target.allow_path("payload.content");

        let report = target.transduce_immunity(&source);
        assert_eq!(report.created, 0);
        assert_eq!(report.newly_suppressed, 1);
        assert_eq!(
            target.check_access("payload.content"),
            AccessDecision::BlockedSuppressed
        );
    }

    #[test]
    fn test_transduction_ignores_clean_subtrees() {
        let mut source = PolicyStore::new();
        source.allow_path("order.id");
        source.allow_path("order.amount");

        let mut target = PolicyStore::new();
        let report = target.transduce_immunity(&source);
        assert!(report.is_noop());
        assert!(target.is_empty());
        assert_eq!(target.check_access("order.id"), AccessDecision::DeniedNotFound);
    }

    #[test]
    fn test_transduction_never_sets_allowed() {
        let mut source = PolicyStore::new();
        source.allow_path("a.b");
        source.suppress_path("a.b.c");

        let mut target = PolicyStore::new();
        target.transduce_immunity(&source);
        assert_eq!(target.check_access("a.b"), AccessDecision::DeniedNotFound);
        assert_eq!(target.check_access("a.b.c"), AccessDecision::BlockedSuppressed);
        assert!(target.flatten().is_empty());
    }

    #[test]
    fn test_transduction_is_idempotent() {
        let mut source = PolicyStore::new();
        source.suppress_path("a.b");
        let mut target = PolicyStore::new();
        target.transduce_immunity(&source);
        let again = target.transduce_immunity(&source);
        assert!(again.is_noop());
    }

    #[test]
    fn test_has_suppressed_descendant() {
        let mut store = PolicyStore::new();
        store.allow_path("a.b");
        assert!(!store.root().has_suppressed_descendant());
        store.suppress_path("a.b.c.d");
        assert!(store.root().has_suppressed_descendant());
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]", 1..4).prop_map(|parts| parts.join("."))
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allow(String),
        Suppress(String),
    }

    fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![
                path_strategy().prop_map(Op::Allow),
                path_strategy().prop_map(Op::Suppress),
            ],
            0..24,
        )
    }

    fn build(ops: &[Op]) -> PolicyStore {
        let mut store = PolicyStore::new();
        for op in ops {
            match op {
                Op::Allow(p) => store.allow_path(p),
                Op::Suppress(p) => store.suppress_path(p),
            }
        }
        store
    }

    proptest! {
        #[test]
        fn prop_suppression_overrides(ops in ops_strategy(), path in path_strategy()) {
            let mut store = build(&ops);
            store.suppress_path(&path);
            store.allow_path(&path);
            prop_assert_eq!(store.check_access(&path), AccessDecision::BlockedSuppressed);
        }

        #[test]
        fn prop_flatten_respects_suppressed_ancestors(ops in ops_strategy()) {
            let store = build(&ops);
            let flat = store.flatten();
            for exported in &flat {
                let exported = FieldPath::parse(exported);
                let segments = exported.segments();
                for depth in 1..=segments.len() {
                    let prefix = FieldPath::from_segments(segments[..depth].to_vec());
                    let node = store.node(&prefix).unwrap();
                    prop_assert!(!node.is_suppressed());
                }
                prop_assert_eq!(store.check_access(&exported.to_string()), AccessDecision::Allowed);
            }
        }

        #[test]
        fn prop_transduction_monotone(source_ops in ops_strategy(), target_ops in ops_strategy(), queries in prop::collection::vec(path_strategy(), 1..16)) {
            let source = build(&source_ops);
            let mut target = build(&target_ops);
            let before: Vec<AccessDecision> = queries.iter().map(|p| target.check_access(p)).collect();
            let before_flat = target.flatten();

            target.transduce_immunity(&source);

            for (p, was) in queries.iter().zip(before) {
                let now = target.check_access(p);
                if source.check_access(p) == AccessDecision::BlockedSuppressed {
                    prop_assert_eq!(now, AccessDecision::BlockedSuppressed);
                }
                if was == AccessDecision::BlockedSuppressed {
                    prop_assert_eq!(now, AccessDecision::BlockedSuppressed);
                }
                if now == AccessDecision::Allowed {
                    prop_assert_eq!(was, AccessDecision::Allowed);
                }
            }
            prop_assert!(target.flatten().is_subset(&before_flat));
        }
    }
}
