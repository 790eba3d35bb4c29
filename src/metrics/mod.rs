pub mod catalog;
pub mod company_facts;
pub mod error;
pub mod heuristic;
pub mod money;
pub mod ratios;
pub mod reconcile;
pub mod statement;
pub mod table;
pub mod types;

pub use error::{ExtractionError, FailureClass};
pub use money::MonetaryValue;
pub use ratios::{FinancialRatio, HealthStatus, RatioCategory};
pub use reconcile::reconcile;
pub use statement::FinancialStatement;
pub use types::{ExtendedFinancialMetric, MetricCategory, MetricSource, MetricUnit, PeriodType};
