pub mod core;
pub mod edgar;
pub mod metrics;
pub mod pipeline;

// Re-exports
pub use crate::core::config::ExtractionConfig;
pub use metrics::{ExtendedFinancialMetric, FinancialRatio, MetricCategory};
pub use pipeline::{analyze, FilingAnalysis, FilingAnalyzer};
