//! Policy proposals and their merged form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One source's proposed field allowlist for a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDraft {
    /// Flow identity, e.g. `AuthService->InventoryService:/api/v1/reserve`
    pub flow_id: String,
    /// Endpoint the flow targets
    pub target_endpoint: String,
    /// Monotonically increasing per flow
    pub policy_version: u64,
    /// Fields the source needs to pass
    pub minimum_allowed_fields: BTreeSet<String>,
    /// Proposing source
    pub source_id: String,
    /// Submission time
    pub timestamp: DateTime<Utc>,
}

impl PolicyDraft {
    /// Create a draft stamped with the current time
    #[must_use]
    pub fn new<I, S>(
        flow_id: &str,
        target_endpoint: &str,
        policy_version: u64,
        fields: I,
        source_id: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flow_id: flow_id.to_string(),
            target_endpoint: target_endpoint.to_string(),
            policy_version,
            minimum_allowed_fields: fields.into_iter().map(Into::into).collect(),
            source_id: source_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Build a draft from observed traffic
    ///
    /// The proposed fields are what the requester sends intersected with
    /// what the receiver needs; see [`minimum_field_set`].
    #[must_use]
    pub fn from_observation(
        flow_id: &str,
        target_endpoint: &str,
        policy_version: u64,
        requester_fields: &BTreeSet<String>,
        receiver_fields: &BTreeSet<String>,
        source_id: &str,
    ) -> Self {
        Self::new(
            flow_id,
            target_endpoint,
            policy_version,
            minimum_field_set(requester_fields, receiver_fields),
            source_id,
        )
    }
}

/// Fields both sent by the requester and needed by the receiver
#[must_use]
pub fn minimum_field_set(
    requester_fields: &BTreeSet<String>,
    receiver_fields: &BTreeSet<String>,
) -> BTreeSet<String> {
    requester_fields
        .intersection(receiver_fields)
        .cloned()
        .collect()
}

/// Verification state of a merged policy
///
/// `Pending` moves to exactly one of the two terminal states per merge
/// cycle. A new submission starts a new cycle at `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Merged, not yet verified
    Pending,
    /// Verified with nothing removed
    ValidatedSuccess,
    /// Verified after removing offending fields
    FixedAndValidated,
}

impl VerificationStatus {
    /// Whether verification has run
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::ValidatedSuccess => write!(f, "VALIDATED_SUCCESS"),
            Self::FixedAndValidated => write!(f, "FIXED_AND_VALIDATED"),
        }
    }
}

/// Most-restrictive combination of the current drafts for one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPolicy {
    /// Flow identity
    pub flow_id: String,
    /// Endpoint the flow targets
    pub target_endpoint: String,
    /// Version all contributing drafts share
    pub policy_version: u64,
    /// Intersection of contributing drafts' fields
    pub minimum_allowed_fields: BTreeSet<String>,
    /// Contributing drafts' sources
    pub source_ids: Vec<String>,
    /// Verification state
    pub verification_status: VerificationStatus,
    /// Audit trail of what verification removed and why
    pub notes: Option<String>,
}

impl MergedPolicy {
    /// Whether `field` is allowed
    #[must_use]
    pub fn allows(&self, field: &str) -> bool {
        self.minimum_allowed_fields.contains(field)
    }
}
