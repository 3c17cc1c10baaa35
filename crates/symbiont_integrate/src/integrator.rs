//! Multi-source draft merge and verification.
//!
//! Merge is most-restrictive-wins: per flow, only drafts at the highest
//! version count, and the result is the intersection of their fields.
//! Verification then strips globally forbidden fields and, when a receiver
//! schema is known, anything the receiver does not need. Neither step ever
//! adds a field.

use crate::draft::{MergedPolicy, PolicyDraft, VerificationStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use symbiont_core::{CoreError, FieldPath};

/// Integration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrateError {
    /// No drafts were supplied to merge
    #[error("No policy drafts provided for merging")]
    EmptyInput,
}

impl From<IntegrateError> for CoreError {
    fn from(err: IntegrateError) -> Self {
        match err {
            IntegrateError::EmptyInput => CoreError::EmptyInput {
                what: "policy drafts".to_string(),
            },
        }
    }
}

/// Verification inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Global denylist
    pub forbidden_fields: BTreeSet<String>,
    /// Fields the receiver actually requires, when known
    pub receiver_required: Option<BTreeSet<String>>,
}

impl IntegratorConfig {
    /// Create a config with a denylist only
    #[must_use]
    pub fn with_forbidden<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            forbidden_fields: fields.into_iter().map(Into::into).collect(),
            receiver_required: None,
        }
    }

    /// Set the receiver schema
    #[must_use]
    pub fn with_receiver<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.receiver_required = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Merge drafts per flow
///
/// # Errors
///
/// Returns [`IntegrateError::EmptyInput`] if `drafts` is empty
pub fn merge(drafts: &[PolicyDraft]) -> Result<BTreeMap<String, MergedPolicy>, IntegrateError> {
    if drafts.is_empty() {
        return Err(IntegrateError::EmptyInput);
    }

    let mut groups: BTreeMap<&str, Vec<&PolicyDraft>> = BTreeMap::new();
    for draft in drafts {
        groups.entry(draft.flow_id.as_str()).or_default().push(draft);
    }

    let mut merged = BTreeMap::new();
    for (flow_id, group) in groups {
        let policy = merge_flow(flow_id, &group);
        merged.insert(flow_id.to_string(), policy);
    }
    Ok(merged)
}

fn merge_flow(flow_id: &str, group: &[&PolicyDraft]) -> MergedPolicy {
    let max_version = group
        .iter()
        .map(|d| d.policy_version)
        .max()
        .unwrap_or_default();

    let (active, stale): (Vec<&PolicyDraft>, Vec<&PolicyDraft>) = group
        .iter()
        .copied()
        .partition(|d| d.policy_version == max_version);

    if !stale.is_empty() {
        let dropped: Vec<&str> = stale.iter().map(|d| d.source_id.as_str()).collect();
        tracing::warn!(
            flow_id,
            max_version,
            ?dropped,
            "ignoring {} drafts with older versions",
            stale.len()
        );
    }

    let mut fields = active
        .first()
        .map(|d| d.minimum_allowed_fields.clone())
        .unwrap_or_default();
    for draft in active.iter().skip(1) {
        fields.retain(|f| draft.minimum_allowed_fields.contains(f));
    }

    let target_endpoint = active
        .first()
        .map(|d| d.target_endpoint.clone())
        .unwrap_or_default();
    if active.iter().any(|d| d.target_endpoint != target_endpoint) {
        tracing::warn!(flow_id, %target_endpoint, "drafts disagree on target endpoint; using the first");
    }

    MergedPolicy {
        flow_id: flow_id.to_string(),
        target_endpoint,
        policy_version: max_version,
        minimum_allowed_fields: fields,
        source_ids: active.iter().map(|d| d.source_id.clone()).collect(),
        verification_status: VerificationStatus::Pending,
        notes: None,
    }
}

/// Verify a merged policy against a denylist and optional receiver schema
///
/// Total: offending fields are removed rather than failing the policy, and
/// every removal is recorded in `notes`. Returns the verified policy and
/// whether it was clean.
///
/// Fields are compared in normalized path form, so `Admin_Token` is caught
/// by a denylist entry `admin_token`. Notes list fields as submitted.
#[must_use]
pub fn verify(
    merged: &MergedPolicy,
    forbidden_fields: &BTreeSet<String>,
    receiver_required: Option<&BTreeSet<String>>,
) -> (MergedPolicy, bool) {
    let fields = &merged.minimum_allowed_fields;
    let forbidden = normalized(forbidden_fields);
    let violated: BTreeSet<String> = fields
        .iter()
        .filter(|f| forbidden.contains(&normalize(f)))
        .cloned()
        .collect();
    let excess: BTreeSet<String> = receiver_required
        .map(|required| {
            let required = normalized(required);
            fields
                .iter()
                .filter(|f| !required.contains(&normalize(f)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let mut verified = merged.clone();

    if violated.is_empty() && excess.is_empty() {
        verified.verification_status = VerificationStatus::ValidatedSuccess;
        tracing::debug!(flow_id = %merged.flow_id, "verification passed");
        return (verified, true);
    }

    let mut reasons = Vec::new();
    if !violated.is_empty() {
        reasons.push(format!("Removed global violation fields: {}", list(&violated)));
    }
    if !excess.is_empty() {
        reasons.push(format!(
            "Removed fields not required by receiver: {}",
            list(&excess)
        ));
    }
    reasons.push("Policy auto-fixed instead of rejected".to_string());
    let note = reasons.join("; ");

    verified
        .minimum_allowed_fields
        .retain(|f| !violated.contains(f) && !excess.contains(f));
    verified.verification_status = VerificationStatus::FixedAndValidated;
    verified.notes = Some(match &merged.notes {
        Some(previous) => format!("{previous}; {note}"),
        None => note,
    });

    tracing::warn!(
        flow_id = %merged.flow_id,
        notes = verified.notes.as_deref().unwrap_or_default(),
        "verification repaired policy"
    );
    (verified, false)
}

/// Canonical path form; malformed input collapses to the empty string
fn normalize(field: &str) -> String {
    FieldPath::parse(field).to_string()
}

fn normalized(fields: &BTreeSet<String>) -> BTreeSet<String> {
    fields.iter().map(|f| normalize(f)).collect()
}

fn list(fields: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = fields.iter().map(|f| format!("{f:?}")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Merge and verify with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct PolicyIntegrator {
    config: IntegratorConfig,
}

impl PolicyIntegrator {
    /// Create an integrator
    #[must_use]
    pub fn new(config: IntegratorConfig) -> Self {
        Self { config }
    }

    /// Integrator configuration
    #[must_use]
    pub fn config(&self) -> &IntegratorConfig {
        &self.config
    }

    /// See [`merge`]
    ///
    /// # Errors
    ///
    /// Returns [`IntegrateError::EmptyInput`] if `drafts` is empty
    pub fn merge(
        &self,
        drafts: &[PolicyDraft],
    ) -> Result<BTreeMap<String, MergedPolicy>, IntegrateError> {
        merge(drafts)
    }

    /// See [`verify`], using the configured denylist and receiver schema
    #[must_use]
    pub fn verify(&self, merged: &MergedPolicy) -> (MergedPolicy, bool) {
        verify(
            merged,
            &self.config.forbidden_fields,
            self.config.receiver_required.as_ref(),
        )
    }

    /// Verify every merged policy
    #[must_use]
    pub fn verify_all(
        &self,
        merged: &BTreeMap<String, MergedPolicy>,
    ) -> BTreeMap<String, MergedPolicy> {
        merged
            .iter()
            .map(|(flow_id, policy)| (flow_id.clone(), self.verify(policy).0))
            .collect()
    }
}
