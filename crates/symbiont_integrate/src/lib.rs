//! SYMBIONT Policy Integration
//!
//! Merges field allowlist drafts proposed by independent sources for the
//! same flow, verifies the result against a global denylist and the
//! receiver's schema, and compiles it for the data plane.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod draft;
pub mod integrator;
pub mod pipeline;

pub use audit::{check_non_expansion, trace_sources};
pub use draft::{minimum_field_set, MergedPolicy, PolicyDraft, VerificationStatus};
pub use integrator::{merge, verify, IntegrateError, IntegratorConfig, PolicyIntegrator};
pub use pipeline::{CompiledFlow, Pipeline};
