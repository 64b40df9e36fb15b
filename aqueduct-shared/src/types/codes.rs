//! Closed code enumerations stored on twins.
//!
//! Codes are stored as small positive integers so they survive a round trip
//! through the graph store's JSON property bag.

use serde_json::Value;

/// Discrete classification of an asset's flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionCode {
    Under = 1,
    NoFlow = 2,
    Low = 3,
    Normal = 4,
    High = 5,
    Max = 6,
    Over = 7,
}

impl ConditionCode {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Under),
            2 => Some(Self::NoFlow),
            3 => Some(Self::Low),
            4 => Some(Self::Normal),
            5 => Some(Self::High),
            6 => Some(Self::Max),
            7 => Some(Self::Over),
            _ => None,
        }
    }

    /// Severity tier this condition contributes to an area rollup.
    pub fn severity(self) -> Severity {
        match self {
            Self::Under | Self::Over => Severity::Alarm,
            Self::NoFlow | Self::Low | Self::High | Self::Max => Severity::Warning,
            Self::Normal => Severity::Ok,
        }
    }
}

impl From<ConditionCode> for Value {
    fn from(code: ConditionCode) -> Self {
        Value::from(code.code())
    }
}

/// Conformance of an actual reading to its reference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityCode {
    Ok = 1,
    NotOk = 2,
}

impl QualityCode {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Ok),
            2 => Some(Self::NotOk),
            _ => None,
        }
    }
}

impl From<QualityCode> for Value {
    fn from(code: QualityCode) -> Self {
        Value::from(code.code())
    }
}

/// Aggregation-level health tier. Variant order is the rollup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    None = 0,
    Ok = 1,
    Warning = 2,
    Alarm = 3,
}

impl Severity {
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Decode a stored severity. Anything unrecognised reads as `None`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Ok,
            2 => Self::Warning,
            3 => Self::Alarm,
            _ => Self::None,
        }
    }

    /// Severity for a raw stored condition code; unrecognised codes map to `None`.
    pub fn from_condition_code(code: i64) -> Self {
        ConditionCode::from_code(code)
            .map(ConditionCode::severity)
            .unwrap_or(Self::None)
    }

    /// Read a severity from a JSON property value.
    pub fn from_value(value: &Value) -> Self {
        value.as_i64().map(Self::from_code).unwrap_or(Self::None)
    }
}

impl From<Severity> for Value {
    fn from(severity: Severity) -> Self {
        Value::from(severity.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_severity_table() {
        assert_eq!(ConditionCode::Under.severity(), Severity::Alarm);
        assert_eq!(ConditionCode::Over.severity(), Severity::Alarm);
        assert_eq!(ConditionCode::NoFlow.severity(), Severity::Warning);
        assert_eq!(ConditionCode::Low.severity(), Severity::Warning);
        assert_eq!(ConditionCode::High.severity(), Severity::Warning);
        assert_eq!(ConditionCode::Max.severity(), Severity::Warning);
        assert_eq!(ConditionCode::Normal.severity(), Severity::Ok);
    }

    #[test]
    fn test_unrecognised_condition_is_none() {
        assert_eq!(Severity::from_condition_code(0), Severity::None);
        assert_eq!(Severity::from_condition_code(42), Severity::None);
        assert_eq!(Severity::from_condition_code(-3), Severity::None);
    }

    #[test]
    fn test_codes_round_trip() {
        for code in 1..=7 {
            assert_eq!(ConditionCode::from_code(code).map(|c| c.code()), Some(code));
        }
        assert_eq!(QualityCode::from_code(2), Some(QualityCode::NotOk));
        assert_eq!(Severity::from_code(Severity::Warning.code()), Severity::Warning);
    }

    #[test]
    fn test_severity_total_order() {
        assert!(Severity::None < Severity::Ok);
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Alarm);
    }
}
