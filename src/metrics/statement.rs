use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::table::{locate_sections, StatementKind};
use super::types::ExtendedFinancialMetric;
use crate::core::config::{DEFAULT_EXCERPT_CHARS, MIN_EXCERPT_CHARS};
use crate::edgar::parsing::text::truncate_chars;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub kind: StatementKind,
    pub title: String,
    /// Period of the first metric that carries one.
    pub period: Option<String>,
    pub metrics: Vec<ExtendedFinancialMetric>,
    /// Beginning of the statement as it appears in the filing.
    pub raw_excerpt: Option<String>,
}

impl StatementKind {
    pub fn title(self) -> &'static str {
        match self {
            StatementKind::IncomeStatement => "Income Statement",
            StatementKind::BalanceSheet => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flow Statement",
        }
    }
}

/// Splits reconciled metrics into statements and attaches each statement's
/// raw text, truncated to `excerpt_chars`. Statements with neither metrics
/// nor text are left out.
pub fn build_statements(
    metrics: &[ExtendedFinancialMetric],
    text: &str,
    excerpt_chars: usize,
) -> Vec<FinancialStatement> {
    let excerpt_chars = excerpt_chars.clamp(MIN_EXCERPT_CHARS, DEFAULT_EXCERPT_CHARS);
    let sections = locate_sections(text);

    StatementKind::iter()
        .filter_map(|kind| {
            let members: Vec<ExtendedFinancialMetric> = metrics
                .iter()
                .filter(|m| kind.includes(m.category))
                .cloned()
                .collect();
            let raw_excerpt = sections
                .iter()
                .find(|s| s.kind == kind)
                .map(|s| truncate_chars(&s.text, excerpt_chars));
            if members.is_empty() && raw_excerpt.is_none() {
                return None;
            }
            Some(FinancialStatement {
                kind,
                title: kind.title().to_string(),
                period: members.iter().find_map(|m| m.period.clone()),
                metrics: members,
                raw_excerpt,
            })
        })
        .collect()
}
