use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::types::MetricUnit;

/// How a failure should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    /// Absent or unparseable data. Normal; skip silently.
    Miss,
    /// A value exceeded a sanity ceiling and was excluded.
    Plausibility,
    /// An extraction strategy produced nothing or failed outright.
    StrategyExhaustion,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    #[error("no match")]
    NoMatch,

    #[error("unparseable amount: {0:?}")]
    Unparseable(String),

    #[error("zero denominator")]
    ZeroDenominator,

    #[error("implausible amount {amount} exceeds ceiling {ceiling}")]
    ImplausibleAmount { amount: Decimal, ceiling: Decimal },

    #[error("implausible growth of {percent}% exceeds ceiling {ceiling}%")]
    ImplausibleGrowth { percent: Decimal, ceiling: Decimal },

    #[error("implausible {name} of {value} exceeds ceiling {ceiling}")]
    ImplausibleRatio {
        name: String,
        value: Decimal,
        ceiling: Decimal,
    },

    #[error("ambiguous unit: {0:?}")]
    AmbiguousUnit(Vec<MetricUnit>),

    #[error("{strategy} strategy failed: {reason}")]
    StrategyFailed {
        strategy: &'static str,
        reason: String,
    },

    #[error("document of {size} bytes exceeds limit of {limit} bytes")]
    DocumentTooLarge { size: usize, limit: usize },
}

impl ExtractionError {
    pub fn class(&self) -> FailureClass {
        match self {
            ExtractionError::NoMatch
            | ExtractionError::Unparseable(_)
            | ExtractionError::ZeroDenominator
            | ExtractionError::AmbiguousUnit(_) => FailureClass::Miss,
            ExtractionError::ImplausibleAmount { .. }
            | ExtractionError::ImplausibleGrowth { .. }
            | ExtractionError::ImplausibleRatio { .. }
            | ExtractionError::DocumentTooLarge { .. } => FailureClass::Plausibility,
            ExtractionError::StrategyFailed { .. } => FailureClass::StrategyExhaustion,
        }
    }

    pub fn is_plausibility_violation(&self) -> bool {
        self.class() == FailureClass::Plausibility
    }
}
