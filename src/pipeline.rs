//! End-to-end analysis of one filing or a batch of filings.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::core::config::ExtractionConfig;
use crate::edgar::parsing::text::normalize;
use crate::edgar::parsing::units::{self, ReportingPeriod};
use crate::edgar::parsing::xbrl::{self, Strategy, StructuredExtraction};
use crate::edgar::report::ReportType;
use crate::metrics::company_facts::{company_facts_metrics, CompanyFacts};
use crate::metrics::error::ExtractionError;
use crate::metrics::heuristic::{self, HeuristicExtraction};
use crate::metrics::ratios::{analyze_ratios, FinancialRatio};
use crate::metrics::reconcile::{best_confidence, reconcile};
use crate::metrics::statement::{build_statements, FinancialStatement};
use crate::metrics::table;
use crate::metrics::types::{ExtendedFinancialMetric, MetricSource, MetricUnit, PeriodType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingAnalysis {
    pub form: Option<ReportType>,
    /// Scale unscaled amounts in the text were read at.
    pub unit: MetricUnit,
    pub period: Option<ReportingPeriod>,
    pub period_type: Option<PeriodType>,
    pub structured_strategy: Option<Strategy>,
    pub metrics: Vec<ExtendedFinancialMetric>,
    pub ratios: Vec<FinancialRatio>,
    pub statements: Vec<FinancialStatement>,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<ExtractionError>,
}

#[derive(Serialize)]
struct WarningRecord {
    class: crate::metrics::error::FailureClass,
    message: String,
}

fn serialize_warnings<S>(warnings: &[ExtractionError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(warnings.len()))?;
    for warning in warnings {
        seq.serialize_element(&WarningRecord {
            class: warning.class(),
            message: warning.to_string(),
        })?;
    }
    seq.end()
}

/// Normalized text and what was read from it without help from structured facts.
struct TextPass {
    text: String,
    unit: MetricUnit,
    tables: HeuristicExtraction,
}

#[derive(Debug, Clone, Default)]
pub struct FilingAnalyzer {
    config: ExtractionConfig,
    form: Option<ReportType>,
    company_facts: Vec<ExtendedFinancialMetric>,
}

impl FilingAnalyzer {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_form(mut self, form: ReportType) -> Self {
        self.form = Some(form);
        self
    }

    /// Adds the latest company-facts values as candidates for every analysis.
    pub fn with_company_facts(mut self, facts: &CompanyFacts) -> Self {
        self.company_facts = company_facts_metrics(facts);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn check_size(&self, size: usize) -> Result<(), ExtractionError> {
        if size > self.config.max_document_bytes {
            return Err(ExtractionError::DocumentTooLarge {
                size,
                limit: self.config.max_document_bytes,
            });
        }
        Ok(())
    }

    fn structured_pass(&self, document: &str) -> StructuredExtraction {
        xbrl::extract_structured(document, &self.config.currency)
    }

    fn text_pass(&self, document: &str) -> TextPass {
        let text = normalize(document);
        let unit = units::resolve_unit(&text);
        let tables = table::extract_statement_tables(&text, unit, &self.config.currency);
        TextPass { text, unit, tables }
    }

    /// Pattern search over the text, skipping categories already covered by a
    /// more confident structured or company-facts value.
    fn heuristic_pass(&self, text: &TextPass, structured: &StructuredExtraction) -> HeuristicExtraction {
        let known = best_confidence(structured.metrics.iter().chain(&self.company_facts));
        heuristic::extract_metrics_with(&text.text, text.unit, &self.config, &known)
    }

    fn combine(
        &self,
        structured: StructuredExtraction,
        text: TextPass,
        heuristic: HeuristicExtraction,
    ) -> FilingAnalysis {
        let period = units::detect_period(&text.text);
        let period_type = units::detect_period_type(&text.text)
            .or_else(|| self.form.as_ref().and_then(ReportType::period_type_hint));

        let mut warnings = structured.warnings;
        warnings.extend(text.tables.warnings);
        warnings.extend(heuristic.warnings);

        // Structured facts first: ties keep the earliest candidate.
        let candidates = structured
            .metrics
            .into_iter()
            .chain(self.company_facts.iter().cloned())
            .chain(text.tables.metrics)
            .chain(heuristic.metrics)
            .map(|mut metric| {
                if metric.period_type.is_none()
                    && matches!(metric.source, MetricSource::TextPattern | MetricSource::TableRow)
                {
                    metric.period_type = period_type;
                }
                metric
            });
        let metrics = reconcile(candidates);

        let ratios = analyze_ratios(&metrics);
        warnings.extend(ratios.warnings);
        let statements = build_statements(&metrics, &text.text, self.config.excerpt_chars);

        log::info!(
            "extracted {} metrics, {} ratios, {} warnings",
            metrics.len(),
            ratios.ratios.len(),
            warnings.len()
        );

        FilingAnalysis {
            form: self.form.clone(),
            unit: text.unit,
            period,
            period_type,
            structured_strategy: structured.strategy,
            metrics,
            ratios: ratios.ratios,
            statements,
            warnings,
        }
    }

    /// Runs every extraction pass on `document` in sequence.
    pub fn analyze(&self, document: &str) -> Result<FilingAnalysis, ExtractionError> {
        self.check_size(document.len())?;
        let structured = self.structured_pass(document);
        let text = self.text_pass(document);
        let heuristic = self.heuristic_pass(&text, &structured);
        Ok(self.combine(structured, text, heuristic))
    }

    /// Same result as [`analyze`](Self::analyze), with the structured pass and
    /// the text pass running on separate blocking threads.
    pub async fn analyze_concurrent(&self, document: String) -> Result<FilingAnalysis> {
        self.check_size(document.len())?;
        let document = std::sync::Arc::new(document);

        let structured_task = {
            let analyzer = self.clone();
            let document = document.clone();
            tokio::task::spawn_blocking(move || analyzer.structured_pass(&document))
        };
        let text_task = {
            let analyzer = self.clone();
            let document = document.clone();
            tokio::task::spawn_blocking(move || analyzer.text_pass(&document))
        };

        let (structured, text) = tokio::try_join!(structured_task, text_task)
            .map_err(|e| anyhow!("extraction task failed: {}", e))?;

        let analyzer = self.clone();
        let analysis = tokio::task::spawn_blocking(move || {
            let heuristic = analyzer.heuristic_pass(&text, &structured);
            analyzer.combine(structured, text, heuristic)
        })
        .await
        .map_err(|e| anyhow!("extraction task failed: {}", e))?;
        Ok(analysis)
    }

    /// Analyzes independent documents in parallel, one blocking task each.
    /// Results keep the order of `documents`.
    pub async fn analyze_batch(&self, documents: Vec<String>) -> Vec<Result<FilingAnalysis>> {
        let tasks = documents.into_iter().map(|document| {
            let analyzer = self.clone();
            tokio::task::spawn_blocking(move || analyzer.analyze(&document))
        });
        futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result.map_err(anyhow::Error::from),
                Err(e) => Err(anyhow!("extraction task failed: {}", e)),
            })
            .collect()
    }

    /// Reads a filing from disk, refusing oversized files before reading them.
    pub fn analyze_file(&self, path: &Path) -> Result<FilingAnalysis> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?;
        self.check_size(usize::try_from(metadata.len()).unwrap_or(usize::MAX))?;

        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let document = String::from_utf8_lossy(&bytes);
        log::debug!("analyzing {} ({} bytes)", path.display(), bytes.len());
        Ok(self.analyze(&document)?)
    }
}

/// [`FilingAnalyzer::analyze`] with default configuration.
pub fn analyze(document: &str) -> Result<FilingAnalysis, ExtractionError> {
    FilingAnalyzer::default().analyze(document)
}
