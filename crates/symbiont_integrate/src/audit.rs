//! Audit helpers over merged policies.

use crate::draft::{MergedPolicy, PolicyDraft};
use std::collections::{BTreeMap, BTreeSet};

/// Fields `new` allows that `old` did not
///
/// # Errors
///
/// Returns the added fields when `new` is not a subset of `old`
pub fn check_non_expansion(old: &MergedPolicy, new: &MergedPolicy) -> Result<(), BTreeSet<String>> {
    let expanded: BTreeSet<String> = new
        .minimum_allowed_fields
        .difference(&old.minimum_allowed_fields)
        .cloned()
        .collect();

    if expanded.is_empty() {
        Ok(())
    } else {
        tracing::warn!(flow_id = %new.flow_id, ?expanded, "policy expansion detected");
        Err(expanded)
    }
}

/// For each retained field, the sources that proposed it
///
/// Only drafts for the same flow at the merged version are considered.
#[must_use]
pub fn trace_sources(merged: &MergedPolicy, drafts: &[PolicyDraft]) -> BTreeMap<String, Vec<String>> {
    let contributing: Vec<&PolicyDraft> = drafts
        .iter()
        .filter(|d| d.flow_id == merged.flow_id && d.policy_version == merged.policy_version)
        .collect();

    merged
        .minimum_allowed_fields
        .iter()
        .map(|field| {
            let sources = contributing
                .iter()
                .filter(|d| d.minimum_allowed_fields.contains(field))
                .map(|d| d.source_id.clone())
                .collect();
            (field.clone(), sources)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::merge;

    fn drafts() -> Vec<PolicyDraft> {
        vec![
            PolicyDraft::new("f", "/x", 1, ["a", "b", "c"], "old"),
            PolicyDraft::new("f", "/x", 2, ["a", "b", "c"], "s1"),
            PolicyDraft::new("f", "/x", 2, ["a", "b"], "s2"),
            PolicyDraft::new("g", "/y", 2, ["a"], "other"),
        ]
    }

    #[test]
    fn test_trace_sources() {
        let drafts = drafts();
        let merged = merge(&drafts).unwrap();
        let trace = trace_sources(&merged["f"], &drafts);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace["a"], vec!["s1", "s2"]);
        assert_eq!(trace["b"], vec!["s1", "s2"]);
    }

    #[test]
    fn test_non_expansion_ok() {
        let drafts = drafts();
        let merged = merge(&drafts).unwrap();
        let mut narrower = merged["f"].clone();
        narrower.minimum_allowed_fields.remove("b");
        assert_eq!(check_non_expansion(&merged["f"], &narrower), Ok(()));
        assert_eq!(check_non_expansion(&merged["f"], &merged["f"]), Ok(()));
    }

    #[test]
    fn test_non_expansion_violation() {
        let drafts = drafts();
        let merged = merge(&drafts).unwrap();
        let mut wider = merged["f"].clone();
        wider.minimum_allowed_fields.insert("token".to_string());
        let expanded = check_non_expansion(&merged["f"], &wider).unwrap_err();
        assert_eq!(expanded, ["token".to_string()].into_iter().collect());
    }
}
