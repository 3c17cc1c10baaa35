//! Named collection of policy stores.
//!
//! The registry is an ordinary value owned by the caller and passed to
//! whatever orchestrates containment and propagation.

use crate::store::{PolicyStore, TransductionReport};
use crate::threat::{ThreatEvent, ThreatModel, ThreatVerdict};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use symbiont_core::CoreError;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Service already registered
    #[error("Store already registered: {0}")]
    AlreadyRegistered(String),
    /// Service not found
    #[error("Store not found: {0}")]
    NotFound(String),
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyRegistered(id) => CoreError::AlreadyExists {
                kind: "Store".to_string(),
                id,
            },
            RegistryError::NotFound(id) => CoreError::NotFound {
                kind: "Store".to_string(),
                id,
            },
        }
    }
}

/// Outcome of [`StoreRegistry::respond`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    /// Service where the event was observed
    pub service: String,
    /// Path the event concerned
    pub path: String,
    /// Verdict the threat model returned
    pub verdict: ThreatVerdict,
    /// Per-service transduction results, in registration order
    pub propagated: Vec<(String, TransductionReport)>,
}

/// Policy stores keyed by service name
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    stores: IndexMap<String, PolicyStore>,
}

impl StoreRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty store for `service`
    ///
    /// # Errors
    ///
    /// Returns error if the service is already registered
    pub fn register(&mut self, service: &str) -> Result<&mut PolicyStore, RegistryError> {
        self.insert(service, PolicyStore::new())
    }

    /// Register an existing store for `service`
    ///
    /// # Errors
    ///
    /// Returns error if the service is already registered
    pub fn insert(
        &mut self,
        service: &str,
        store: PolicyStore,
    ) -> Result<&mut PolicyStore, RegistryError> {
        if self.stores.contains_key(service) {
            return Err(RegistryError::AlreadyRegistered(service.to_string()));
        }
        let entry = self.stores.entry(service.to_string()).or_insert(store);
        Ok(entry)
    }

    /// Get a store
    ///
    /// # Errors
    ///
    /// Returns error if the service is unknown
    pub fn get(&self, service: &str) -> Result<&PolicyStore, RegistryError> {
        self.stores
            .get(service)
            .ok_or_else(|| RegistryError::NotFound(service.to_string()))
    }

    /// Get a store mutably
    ///
    /// # Errors
    ///
    /// Returns error if the service is unknown
    pub fn get_mut(&mut self, service: &str) -> Result<&mut PolicyStore, RegistryError> {
        self.stores
            .get_mut(service)
            .ok_or_else(|| RegistryError::NotFound(service.to_string()))
    }

    /// Registered service names, in registration order
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Number of registered stores
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no store is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Suppress `path` on one service
    ///
    /// # Errors
    ///
    /// Returns error if the service is unknown
    pub fn contain(&mut self, service: &str, path: &str) -> Result<(), RegistryError> {
        self.get_mut(service)?.suppress_path(path);
        tracing::info!(service, path, "contained path");
        Ok(())
    }

    /// Transduce `source`'s suppression into every other store
    ///
    /// The source is snapshotted first so the pass sees one stable state.
    ///
    /// # Errors
    ///
    /// Returns error if the source service is unknown
    pub fn propagate_from(
        &mut self,
        source: &str,
    ) -> Result<Vec<(String, TransductionReport)>, RegistryError> {
        let snapshot = self.get(source)?.clone();
        let mut reports = Vec::new();

        for (service, store) in self.stores.iter_mut() {
            if service == source {
                continue;
            }
            let report = store.transduce_immunity(&snapshot);
            reports.push((service.clone(), report));
        }

        tracing::info!(source, targets = reports.len(), "propagated immunity");
        Ok(reports)
    }

    /// Contain and propagate if `model` judges `event` a threat
    ///
    /// # Errors
    ///
    /// Returns error if the event's service is unknown
    pub fn respond(
        &mut self,
        event: &ThreatEvent,
        model: &dyn ThreatModel,
    ) -> Result<ResponseSummary, RegistryError> {
        self.get(&event.service)?;
        let verdict = model.assess(event);

        let propagated = match verdict {
            ThreatVerdict::Suppress => {
                self.contain(&event.service, &event.path)?;
                self.propagate_from(&event.service)?
            }
            ThreatVerdict::Tolerate => {
                tracing::debug!(service = %event.service, path = %event.path, "event tolerated");
                Vec::new()
            }
        };

        Ok(ResponseSummary {
            service: event.service.clone(),
            path: event.path.clone(),
            verdict,
            propagated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AccessDecision;
    use crate::threat::{FixedThreatModel, ThreatFeatures, ThresholdThreatModel};

    fn cluster() -> StoreRegistry {
        let mut registry = StoreRegistry::new();
        registry.register("BillingService").unwrap().allow_path("payload.content");
        registry.register("InventoryService").unwrap().allow_path("item.sku");
        registry.register("LogService").unwrap().allow_path("payload.content");
        registry
    }

    fn attack(anomaly_score: f64) -> ThreatEvent {
        ThreatEvent {
            service: "LogService".to_string(),
            path: "payload.content".to_string(),
            features: ThreatFeatures {
                anomaly_score,
                entropy: 0.9,
                frequency: 0.1,
            },
        }
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = cluster();
        assert_eq!(
            registry.register("LogService").unwrap_err(),
            RegistryError::AlreadyRegistered("LogService".to_string())
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_unknown_service() {
        let mut registry = cluster();
        assert_eq!(
            registry.contain("Nope", "a"),
            Err(RegistryError::NotFound("Nope".to_string()))
        );
        assert!(registry.propagate_from("Nope").is_err());
    }

    #[test]
    fn test_contain_and_propagate() {
        let mut registry = cluster();
        registry.contain("LogService", "payload.content").unwrap();
        let reports = registry.propagate_from("LogService").unwrap();
        assert_eq!(reports.len(), 2);

        for service in ["BillingService", "InventoryService", "LogService"] {
            assert_eq!(
                registry.get(service).unwrap().check_access("payload.content"),
                AccessDecision::BlockedSuppressed,
                "{service}"
            );
        }
        assert_eq!(
            registry.get("InventoryService").unwrap().check_access("item.sku"),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn test_respond_with_threat() {
        let mut registry = cluster();
        let summary = registry
            .respond(&attack(0.95), &ThresholdThreatModel::default())
            .unwrap();
        assert_eq!(summary.verdict, ThreatVerdict::Suppress);
        assert_eq!(summary.propagated.len(), 2);
        assert_eq!(
            registry.get("BillingService").unwrap().check_access("payload.content"),
            AccessDecision::BlockedSuppressed
        );
    }

    #[test]
    fn test_respond_tolerated() {
        let mut registry = cluster();
        let summary = registry
            .respond(&attack(0.9), &FixedThreatModel(ThreatVerdict::Tolerate))
            .unwrap();
        assert_eq!(summary.verdict, ThreatVerdict::Tolerate);
        assert!(summary.propagated.is_empty());
        assert_eq!(
            registry.get("LogService").unwrap().check_access("payload.content"),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn test_services_order() {
        let registry = cluster();
        let names: Vec<&str> = registry.services().collect();
        assert_eq!(names, vec!["BillingService", "InventoryService", "LogService"]);
    }
}
