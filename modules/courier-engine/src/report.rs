//! Delivery accounting for broadcast jobs.

use serde::{Deserialize, Serialize};

/// Running state of a delivery loop, surfaced at a fixed cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Final accounting for one broadcast job. `succeeded + failed == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DeliveryReport {
    /// Success percentage rounded to one decimal. Defined as 0.0 for an
    /// empty batch, though the engine never produces one.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.succeeded as f64 / self.total as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_rounds_to_one_decimal() {
        let report = DeliveryReport {
            total: 3,
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(report.success_rate(), 66.7);
    }

    #[test]
    fn success_rate_of_empty_batch_is_zero() {
        let report = DeliveryReport {
            total: 0,
            succeeded: 0,
            failed: 0,
        };
        assert_eq!(report.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_full_batch() {
        let report = DeliveryReport {
            total: 8,
            succeeded: 8,
            failed: 0,
        };
        assert_eq!(report.success_rate(), 100.0);
    }
}
