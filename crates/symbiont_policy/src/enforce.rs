//! Payload audit and scrubbing against a compiled artifact.
//!
//! Nested payload keys are flattened to the same dotted convention the
//! store uses (`{"user": {"name": ..}}` becomes `user.name`). Only leaf
//! paths are checked. Array elements share their parent's path. Anything
//! absent from the artifact is unauthorized; nothing is implicitly allowed.

use crate::compiler::ExecutionArtifact;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use symbiont_core::PATH_SEPARATOR;

/// What to do with a payload that carries unauthorized fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterAction {
    /// Remove unauthorized leaves and forward the rest
    #[default]
    Scrub,
    /// Reject the whole payload
    Block,
}

/// Result of filtering one payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrubbedPayload {
    /// Payload after filtering; `None` when blocked
    pub payload: Option<Value>,
    /// Unauthorized paths found, sorted
    pub removed: Vec<String>,
    /// Action that was applied
    pub action: FilterAction,
}

impl ScrubbedPayload {
    /// Whether the payload was forwarded
    #[must_use]
    pub fn is_forwarded(&self) -> bool {
        self.payload.is_some()
    }

    /// Whether anything was stripped or the payload was blocked
    #[must_use]
    pub fn is_scrubbed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Collect every leaf path of a JSON value
///
/// An empty key yields an empty segment (`""` at the top level, `"a."`
/// below `a`), which no artifact authorizes. A scalar with no key at all,
/// such as a bare top-level value, is reported as `""`.
#[must_use]
pub fn flatten_payload_keys(value: &Value) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_leaves(value, None, &mut out);
    out
}

/// `prefix` is `None` above the first key
fn join(prefix: Option<&str>, key: &str) -> String {
    let key = key.to_lowercase();
    match prefix {
        None => key,
        Some(prefix) => format!("{prefix}{PATH_SEPARATOR}{key}"),
    }
}

fn collect_leaves(value: &Value, prefix: Option<&str>, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_leaves(child, Some(&join(prefix, key)), out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_leaves(item, prefix, out);
            }
        }
        _ => {
            out.insert(prefix.unwrap_or_default().to_string());
        }
    }
}

/// Data-plane style filter backed by an [`ExecutionArtifact`]
pub struct PayloadFilter<'a> {
    artifact: &'a ExecutionArtifact,
    action: FilterAction,
}

impl<'a> PayloadFilter<'a> {
    /// Create a scrubbing filter
    #[must_use]
    pub fn new(artifact: &'a ExecutionArtifact) -> Self {
        Self {
            artifact,
            action: FilterAction::Scrub,
        }
    }

    /// Set the action
    #[must_use]
    pub fn with_action(mut self, action: FilterAction) -> Self {
        self.action = action;
        self
    }

    /// Unauthorized leaf paths in `payload`
    #[must_use]
    pub fn audit(&self, payload: &Value) -> Vec<String> {
        flatten_payload_keys(payload)
            .into_iter()
            .filter(|path| !self.artifact.permits(path))
            .collect()
    }

    /// Apply the configured action
    #[must_use]
    pub fn apply(&self, payload: &Value) -> ScrubbedPayload {
        let removed = self.audit(payload);

        let payload = match self.action {
            FilterAction::Block if !removed.is_empty() => {
                tracing::warn!(fields = ?removed, "blocked payload with unauthorized fields");
                None
            }
            FilterAction::Block => Some(payload.clone()),
            FilterAction::Scrub => {
                if !removed.is_empty() {
                    tracing::debug!(fields = ?removed, "scrubbed unauthorized fields");
                }
                Some(self.scrub(payload, None))
            }
        };

        ScrubbedPayload {
            payload,
            removed,
            action: self.action,
        }
    }

    /// Rebuild `value` keeping only authorized leaves
    ///
    /// Objects and arrays left empty by scrubbing are dropped. An
    /// unauthorized bare scalar becomes `null`.
    fn scrub(&self, value: &Value, prefix: Option<&str>) -> Value {
        match value {
            Value::Object(map) => {
                let mut kept = Map::new();
                for (key, child) in map {
                    let path = join(prefix, key);
                    if let Some(child) = self.scrub_child(child, Some(&path)) {
                        kept.insert(key.clone(), child);
                    }
                }
                Value::Object(kept)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| self.scrub_child(item, prefix))
                    .collect(),
            ),
            other => self.scrub_child(other, prefix).unwrap_or(Value::Null),
        }
    }

    fn scrub_child(&self, child: &Value, path: Option<&str>) -> Option<Value> {
        match child {
            Value::Object(_) | Value::Array(_) => {
                let scrubbed = self.scrub(child, path);
                let emptied = match (&scrubbed, child) {
                    (Value::Object(after), Value::Object(before)) => {
                        after.is_empty() && !before.is_empty()
                    }
                    (Value::Array(after), Value::Array(before)) => {
                        after.is_empty() && !before.is_empty()
                    }
                    _ => false,
                };
                (!emptied).then_some(scrubbed)
            }
            _ => self
                .artifact
                .permits(path.unwrap_or_default())
                .then(|| child.clone()),
        }
    }
}
