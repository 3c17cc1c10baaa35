//! Compile-to-flat: turns a [`PolicyStore`] into an [`ExecutionArtifact`].
//!
//! The artifact is what the data-plane filter consumes. It is a whitelist:
//! a flattened payload key present in `allowed_fields` passes, anything
//! absent is unauthorized.

use crate::store::PolicyStore;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use symbiont_core::{CoreError, Digest, FieldPath};

/// Presence marker stored for every allowed field
pub const FIELD_PRESENT: u8 = 1;

/// Artifact errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// Artifact JSON could not be decoded
    #[error("Invalid artifact encoding: {0}")]
    Decode(String),

    /// Key in `allowed_fields` is not a normalized field path
    #[error("Malformed allowed field: {0:?}")]
    MalformedField(String),

    /// Presence marker other than 1
    #[error("Field {field} has presence marker {marker}, expected 1")]
    BadMarker {
        /// Offending field
        field: String,
        /// Marker found
        marker: u8,
    },
}

impl From<ArtifactError> for CoreError {
    fn from(err: ArtifactError) -> Self {
        CoreError::Validation {
            field: "artifact".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Action applied to fields present in the lookup map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactAction {
    /// Listed fields pass; everything else is denied
    #[default]
    Allow,
}

/// Compiler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Version string stamped on every artifact
    pub artifact_version: String,
    /// Free-form note carried in artifact metadata
    pub optimization_note: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            artifact_version: "1.0".to_string(),
            optimization_note: "Optimized for O(1) field lookup using Hash Map.".to_string(),
        }
    }
}

/// Artifact metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Version of the policy the artifact was compiled from
    pub source_policy_version: u64,
    /// Compile time
    pub compiled_at: DateTime<Utc>,
    /// Free-form note
    pub optimization_note: String,
}

/// Immutable O(1)-lookup policy artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionArtifact {
    /// Artifact format version
    pub artifact_version: String,
    /// Endpoint the artifact guards
    pub target_endpoint: String,
    /// Default action for listed fields
    pub action: ArtifactAction,
    /// Allowed field path to presence marker, sorted by path
    pub allowed_fields: IndexMap<String, u8>,
    /// Provenance
    pub metadata: ArtifactMetadata,
}

impl ExecutionArtifact {
    /// Whether `path` is authorized
    ///
    /// Lower-cases the input to match the store's normalization.
    #[must_use]
    pub fn permits(&self, path: &str) -> bool {
        self.allowed_fields.contains_key(path)
            || self.allowed_fields.contains_key(path.to_lowercase().as_str())
    }

    /// Number of allowed fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed_fields.len()
    }

    /// An empty map means deny-all
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        self.allowed_fields.is_empty()
    }

    /// Content fingerprint
    ///
    /// Covers the version, endpoint, source policy version and the allowed
    /// paths; excludes the compile time, so recompiling unchanged state
    /// yields the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Digest {
        let policy_version = self.metadata.source_policy_version.to_be_bytes();
        let mut parts: Vec<&[u8]> = vec![
            self.artifact_version.as_bytes(),
            self.target_endpoint.as_bytes(),
            policy_version.as_slice(),
        ];
        parts.extend(self.allowed_fields.keys().map(String::as_bytes));
        Digest::compute_parts(parts)
    }

    /// Check every key is a normalized path with the presence marker
    ///
    /// # Errors
    ///
    /// Returns the first malformed entry
    pub fn validate(&self) -> Result<(), ArtifactError> {
        for (field, marker) in &self.allowed_fields {
            let parsed = FieldPath::parse(field);
            if parsed.is_empty() || parsed.to_string() != *field {
                return Err(ArtifactError::MalformedField(field.clone()));
            }
            if *marker != FIELD_PRESENT {
                return Err(ArtifactError::BadMarker {
                    field: field.clone(),
                    marker: *marker,
                });
            }
        }
        Ok(())
    }

    /// Decode and validate an artifact
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid or fails [`Self::validate`]
    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let artifact: Self =
            serde_json::from_str(json).map_err(|e| ArtifactError::Decode(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Encode as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Store-to-artifact compiler
#[derive(Debug, Clone, Default)]
pub struct PolicyCompiler {
    config: CompilerConfig,
}

impl PolicyCompiler {
    /// Create a compiler
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Compiler configuration
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile the current state of `store`
    ///
    /// Runs `flatten` once; callers sharing the store with a writer should
    /// pass a cloned snapshot. An empty store compiles to an empty map.
    #[must_use]
    pub fn compile(
        &self,
        store: &PolicyStore,
        target_endpoint: &str,
        policy_version: u64,
    ) -> ExecutionArtifact {
        self.compile_at(store, target_endpoint, policy_version, Utc::now())
    }

    /// Compile with an explicit timestamp
    #[must_use]
    pub fn compile_at(
        &self,
        store: &PolicyStore,
        target_endpoint: &str,
        policy_version: u64,
        compiled_at: DateTime<Utc>,
    ) -> ExecutionArtifact {
        let allowed_fields: IndexMap<String, u8> = store
            .flatten()
            .into_iter()
            .map(|path| (path, FIELD_PRESENT))
            .collect();

        tracing::debug!(
            target_endpoint,
            policy_version,
            fields = allowed_fields.len(),
            "compiled execution artifact"
        );

        ExecutionArtifact {
            artifact_version: self.config.artifact_version.clone(),
            target_endpoint: target_endpoint.to_string(),
            action: ArtifactAction::Allow,
            allowed_fields,
            metadata: ArtifactMetadata {
                source_policy_version: policy_version,
                compiled_at,
                optimization_note: self.config.optimization_note.clone(),
            },
        }
    }
}
