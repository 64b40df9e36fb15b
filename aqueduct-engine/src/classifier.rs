//! Flow classification.
//!
//! Pure functions turning continuous readings into the closed code sets stored
//! on twins. Callers skip classification when an input is missing.

use aqueduct_shared::{ConditionCode, QualityCode};

/// Readings below this are reverse flow.
const REVERSE_FLOW_THRESHOLD: f64 = -0.1;
/// Readings below this count as standing water.
const NO_FLOW_THRESHOLD: f64 = 0.5;
/// Headroom below capacity where a flow is already running at maximum.
const MAX_HEADROOM: f64 = 0.5;
/// Tolerance above capacity still reported as running at maximum.
const MAX_TOLERANCE: f64 = 0.1;

/// Classify a flow against an asset's capacity and margin. First match wins.
pub fn classify_condition(flow: f64, capacity: f64, margin: f64) -> ConditionCode {
    if flow < REVERSE_FLOW_THRESHOLD {
        ConditionCode::Under
    } else if flow < NO_FLOW_THRESHOLD {
        ConditionCode::NoFlow
    } else if flow < margin {
        ConditionCode::Low
    } else if flow < capacity - margin {
        ConditionCode::Normal
    } else if flow < capacity - MAX_HEADROOM {
        ConditionCode::High
    } else if flow <= capacity + MAX_TOLERANCE {
        ConditionCode::Max
    } else {
        ConditionCode::Over
    }
}

/// Whether `actual` stays within `margin` of the asset's `capacity`.
pub fn classify_quality(actual: f64, capacity: f64, margin: f64) -> QualityCode {
    if (capacity - actual).abs() <= margin {
        QualityCode::Ok
    } else {
        QualityCode::NotOk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_boundaries() {
        let cases = [
            (-0.2, ConditionCode::Under),
            (0.4, ConditionCode::NoFlow),
            (1.9, ConditionCode::Low),
            (5.0, ConditionCode::Normal),
            (7.6, ConditionCode::High),
            (9.5, ConditionCode::Max),
            (10.2, ConditionCode::Over),
        ];
        for (flow, expected) in cases {
            assert_eq!(classify_condition(flow, 10.0, 2.0), expected, "flow {}", flow);
        }
    }

    #[test]
    fn test_condition_edges_are_exclusive_until_max() {
        assert_eq!(classify_condition(-0.1, 10.0, 2.0), ConditionCode::NoFlow);
        assert_eq!(classify_condition(0.5, 10.0, 2.0), ConditionCode::Low);
        assert_eq!(classify_condition(2.0, 10.0, 2.0), ConditionCode::Normal);
        assert_eq!(classify_condition(8.0, 10.0, 2.0), ConditionCode::High);
        assert_eq!(classify_condition(10.05, 10.0, 2.0), ConditionCode::Max);
    }

    #[test]
    fn test_quality_inclusive_margin() {
        assert_eq!(classify_quality(5.0, 6.0, 1.0), QualityCode::Ok);
        assert_eq!(classify_quality(5.0, 4.0, 1.0), QualityCode::Ok);
        assert_eq!(classify_quality(5.0, 6.5, 1.0), QualityCode::NotOk);
        assert_eq!(classify_quality(5.0, 5.0, 0.0), QualityCode::Ok);
    }
}
