//! Merge, verify, materialize and compile in one pass.

use crate::draft::{MergedPolicy, PolicyDraft};
use crate::integrator::{IntegrateError, PolicyIntegrator};
use serde::{Deserialize, Serialize};
use symbiont_policy::{ExecutionArtifact, PolicyCompiler, PolicyStore};

impl MergedPolicy {
    /// Replay every retained field into a fresh store
    #[must_use]
    pub fn materialize(&self) -> PolicyStore {
        let mut store = PolicyStore::new();
        for field in &self.minimum_allowed_fields {
            store.allow_path(field);
        }
        store
    }
}

/// One flow's verified policy and the artifact compiled from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledFlow {
    /// Verified policy
    pub policy: MergedPolicy,
    /// Data-plane artifact
    pub artifact: ExecutionArtifact,
}

/// Draft-to-artifact pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    integrator: PolicyIntegrator,
    compiler: PolicyCompiler,
}

impl Pipeline {
    /// Create a pipeline
    #[must_use]
    pub fn new(integrator: PolicyIntegrator, compiler: PolicyCompiler) -> Self {
        Self {
            integrator,
            compiler,
        }
    }

    /// Run every flow in `drafts` through merge, verify and compile
    ///
    /// Output is ordered by flow id.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrateError::EmptyInput`] if `drafts` is empty
    pub fn run(&self, drafts: &[PolicyDraft]) -> Result<Vec<CompiledFlow>, IntegrateError> {
        let merged = self.integrator.merge(drafts)?;

        let flows: Vec<CompiledFlow> = merged
            .values()
            .map(|policy| {
                let (policy, _) = self.integrator.verify(policy);
                let store = policy.materialize();
                let artifact =
                    self.compiler
                        .compile(&store, &policy.target_endpoint, policy.policy_version);
                CompiledFlow { policy, artifact }
            })
            .collect();

        tracing::info!(drafts = drafts.len(), flows = flows.len(), "pipeline complete");
        Ok(flows)
    }
}
