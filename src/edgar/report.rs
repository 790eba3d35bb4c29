use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

use crate::metrics::types::PeriodType;

/// SEC form a filing was submitted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String", into = "String")]
pub enum ReportType {
    Form10K,
    Form10KA,
    Form10Q,
    Form10QA,
    Form8K,
    Form6K,
    Form20F,
    Form40F,
    FormS1,
    FormS3,
    FormS4,
    FormF1,
    Form424B,
    FormDEF14A,
    Other(String),
}

impl TryFrom<String> for ReportType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ReportType::from_str(&s)
    }
}

impl From<ReportType> for String {
    fn from(report_type: ReportType) -> String {
        report_type.to_string()
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportType::Form10K => write!(f, "10-K"),
            ReportType::Form10KA => write!(f, "10-K/A"),
            ReportType::Form10Q => write!(f, "10-Q"),
            ReportType::Form10QA => write!(f, "10-Q/A"),
            ReportType::Form8K => write!(f, "8-K"),
            ReportType::Form6K => write!(f, "6-K"),
            ReportType::Form20F => write!(f, "20-F"),
            ReportType::Form40F => write!(f, "40-F"),
            ReportType::FormS1 => write!(f, "S-1"),
            ReportType::FormS3 => write!(f, "S-3"),
            ReportType::FormS4 => write!(f, "S-4"),
            ReportType::FormF1 => write!(f, "F-1"),
            ReportType::Form424B => write!(f, "424B"),
            ReportType::FormDEF14A => write!(f, "DEF 14A"),
            ReportType::Other(s) => write!(f, "{}", s),
        }
    }
}

pub static REPORT_TYPES: Lazy<String> = Lazy::new(|| {
    ReportType::iter()
        .filter(|t| !matches!(t, ReportType::Other(_)))
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl ReportType {
    pub fn list_types() -> &'static str {
        &REPORT_TYPES
    }

    /// Period a form normally covers. Used only when the document itself
    /// does not say.
    pub fn period_type_hint(&self) -> Option<PeriodType> {
        match self {
            ReportType::Form10Q | ReportType::Form10QA => Some(PeriodType::Quarterly),
            ReportType::Form10K
            | ReportType::Form10KA
            | ReportType::Form20F
            | ReportType::Form40F => Some(PeriodType::Annual),
            _ => None,
        }
    }

    /// Periodic reports carry full financial statements.
    pub fn is_periodic(&self) -> bool {
        self.period_type_hint().is_some()
    }
}

impl FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<ReportType, String> {
        let normalized = s.trim().to_uppercase();
        match normalized.as_str() {
            "10-K" | "10K" => Ok(ReportType::Form10K),
            "10-K/A" => Ok(ReportType::Form10KA),
            "10-Q" | "10Q" => Ok(ReportType::Form10Q),
            "10-Q/A" => Ok(ReportType::Form10QA),
            "8-K" | "8K" => Ok(ReportType::Form8K),
            "6-K" => Ok(ReportType::Form6K),
            "20-F" => Ok(ReportType::Form20F),
            "40-F" => Ok(ReportType::Form40F),
            "S-1" => Ok(ReportType::FormS1),
            "S-3" => Ok(ReportType::FormS3),
            "S-4" => Ok(ReportType::FormS4),
            "F-1" => Ok(ReportType::FormF1),
            "DEF 14A" => Ok(ReportType::FormDEF14A),
            "" => Err("empty form type".to_string()),
            other if other.starts_with("424B") => Ok(ReportType::Form424B),
            _ => Ok(ReportType::Other(s.trim().to_string())),
        }
    }
}
