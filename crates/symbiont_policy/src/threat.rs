//! Threat assessment strategies.
//!
//! The registry asks a [`ThreatModel`] whether an observed event warrants
//! suppression. Models are injected by the caller; there is no hidden
//! state to patch.

use serde::{Deserialize, Serialize};

/// Observed traffic features for one field path
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatFeatures {
    /// Anomaly score in `[0, 1]`
    pub anomaly_score: f64,
    /// Shannon entropy of the field value, in bits per byte
    pub entropy: f64,
    /// Requests per observation window
    pub frequency: f64,
}

/// A suspicious access to a field path on one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatEvent {
    /// Service that observed the event
    pub service: String,
    /// Field path carrying the suspicious value
    pub path: String,
    /// Observed features
    pub features: ThreatFeatures,
}

/// Verdict of a threat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatVerdict {
    /// Leave the path alone
    Tolerate,
    /// Suppress the path
    Suppress,
}

/// Strategy deciding whether an event is a threat
pub trait ThreatModel {
    /// Judge one event
    fn assess(&self, event: &ThreatEvent) -> ThreatVerdict;
}

/// Always returns the same verdict
#[derive(Debug, Clone, Copy)]
pub struct FixedThreatModel(pub ThreatVerdict);

impl ThreatModel for FixedThreatModel {
    fn assess(&self, _event: &ThreatEvent) -> ThreatVerdict {
        self.0
    }
}

/// Feature-threshold model
///
/// Suppresses on a high anomaly score alone, or on a medium anomaly score
/// paired with high-entropy values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdThreatModel {
    /// Anomaly score at or above which the event is a threat on its own
    pub high_anomaly: f64,
    /// Anomaly score at or above which high entropy tips the verdict
    pub medium_anomaly: f64,
    /// Entropy at or above which a value is considered high-entropy
    pub high_entropy: f64,
}

impl Default for ThresholdThreatModel {
    fn default() -> Self {
        Self {
            high_anomaly: 0.7,
            medium_anomaly: 0.3,
            high_entropy: 4.0,
        }
    }
}

impl ThreatModel for ThresholdThreatModel {
    fn assess(&self, event: &ThreatEvent) -> ThreatVerdict {
        let f = &event.features;
        if f.anomaly_score >= self.high_anomaly
            || (f.anomaly_score >= self.medium_anomaly && f.entropy >= self.high_entropy)
        {
            ThreatVerdict::Suppress
        } else {
            ThreatVerdict::Tolerate
        }
    }
}
