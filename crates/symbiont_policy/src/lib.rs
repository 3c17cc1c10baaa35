//! SYMBIONT Policy Engine
//!
//! Hierarchical field-level access control for service traffic.
//! A trie store decides per path, compiles to a flat O(1) artifact,
//! and shares suppression knowledge between stores.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compiler;
pub mod enforce;
pub mod registry;
pub mod store;
pub mod threat;

pub use compiler::{
    ArtifactAction, ArtifactError, ArtifactMetadata, CompilerConfig, ExecutionArtifact,
    PolicyCompiler, FIELD_PRESENT,
};
pub use enforce::{flatten_payload_keys, FilterAction, PayloadFilter, ScrubbedPayload};
pub use registry::{RegistryError, ResponseSummary, StoreRegistry};
pub use store::{AccessDecision, PolicyNode, PolicyStore, TransductionReport};
pub use threat::{
    FixedThreatModel, ThreatEvent, ThreatFeatures, ThreatModel, ThreatVerdict,
    ThresholdThreatModel,
};
