//! Latency SLA classification
//!
//! The gateway's architecturally significant requirement is end-to-end
//! latency: queries must answer in under the violation threshold
//! (3000 ms by default). Classification is pure; thresholds come from
//! configuration.

use serde::{Deserialize, Serialize};

/// Compliance band for one observed response time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaStatus {
    Meets,
    Warning,
    Violates,
}

/// Warning and violation thresholds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaThresholds {
    pub warning_ms: u64,
    pub violation_ms: u64,
}

impl Default for SlaThresholds {
    fn default() -> Self {
        Self {
            warning_ms: 2000,
            violation_ms: 3000,
        }
    }
}

impl SlaThresholds {
    /// Classify an elapsed time. Exactly at a threshold, the better band
    /// applies: 2000 ms still meets, 3000 ms is still only a warning.
    pub fn classify(&self, elapsed_ms: u64) -> SlaStatus {
        if elapsed_ms <= self.warning_ms {
            SlaStatus::Meets
        } else if elapsed_ms <= self.violation_ms {
            SlaStatus::Warning
        } else {
            SlaStatus::Violates
        }
    }

    /// Whether the latency objective was honored at all (anything short of
    /// an outright violation).
    pub fn meets_objective(&self, elapsed_ms: u64) -> bool {
        self.classify(elapsed_ms) != SlaStatus::Violates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_bands() {
        let sla = SlaThresholds::default();
        assert_eq!(sla.classify(0), SlaStatus::Meets);
        assert_eq!(sla.classify(1999), SlaStatus::Meets);
        assert_eq!(sla.classify(2001), SlaStatus::Warning);
        assert_eq!(sla.classify(3001), SlaStatus::Violates);
    }

    #[test]
    fn test_threshold_boundaries_use_better_band() {
        let sla = SlaThresholds::default();
        assert_eq!(sla.classify(2000), SlaStatus::Meets);
        assert_eq!(sla.classify(3000), SlaStatus::Warning);
    }

    #[test]
    fn test_meets_objective() {
        let sla = SlaThresholds::default();
        assert!(sla.meets_objective(2500));
        assert!(sla.meets_objective(3000));
        assert!(!sla.meets_objective(3001));
    }

    #[test]
    fn test_custom_thresholds() {
        let sla = SlaThresholds {
            warning_ms: 100,
            violation_ms: 200,
        };
        assert_eq!(sla.classify(100), SlaStatus::Meets);
        assert_eq!(sla.classify(150), SlaStatus::Warning);
        assert_eq!(sla.classify(201), SlaStatus::Violates);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&SlaStatus::Meets).unwrap(), "\"meets\"");
        assert_eq!(
            serde_json::to_string(&SlaStatus::Violates).unwrap(),
            "\"violates\""
        );
    }
}
