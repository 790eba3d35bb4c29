//! Statement sections and column-aligned table rows.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use super::error::ExtractionError;
use super::heuristic::{has_loss_cue, HeuristicExtraction};
use super::money;
use super::types::{
    ExtendedFinancialMetric, MetricCategory, MetricFamily, MetricSource, MetricUnit,
};
use crate::core::config::MAX_CONTEXT_WINDOW_CHARS;
use crate::edgar::parsing::text::truncate_chars;
use crate::edgar::parsing::units;

/// Longest statement section kept, in characters.
pub const MAX_SECTION_CHARS: usize = 30_000;
/// Shorter lines are never data rows.
pub const MIN_ROW_CHARS: usize = 10;
/// Year columns needed before a line counts as the table header.
pub const MIN_HEADER_YEARS: usize = 2;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    /// Metric families reported on this statement.
    pub fn families(self) -> &'static [MetricFamily] {
        match self {
            StatementKind::IncomeStatement => &[
                MetricFamily::IncomeStatement,
                MetricFamily::PerShare,
                MetricFamily::SharesOutstanding,
            ],
            StatementKind::BalanceSheet => &[MetricFamily::BalanceSheet, MetricFamily::Equity],
            StatementKind::CashFlow => &[MetricFamily::CashFlow],
        }
    }

    pub fn includes(self, category: MetricCategory) -> bool {
        self.families().contains(&category.family())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSection {
    pub kind: StatementKind,
    /// Byte offset of the heading in the searched text.
    pub start: usize,
    pub text: String,
}

static SECTION_HEADINGS: Lazy<Vec<(Regex, StatementKind)>> = Lazy::new(|| {
    [
        (
            r"(?im)^[\s|]*(?:condensed\s+)?(?:consolidated\s+)?statements?\s+of\s+(?:consolidated\s+)?(?:operations|income|earnings)\b",
            StatementKind::IncomeStatement,
        ),
        (
            r"(?im)^[\s|]*(?:condensed\s+)?(?:consolidated\s+)?(?:balance\s+sheets?|statements?\s+of\s+financial\s+(?:position|condition))\b",
            StatementKind::BalanceSheet,
        ),
        (
            r"(?im)^[\s|]*(?:condensed\s+)?(?:consolidated\s+)?statements?\s+of\s+(?:consolidated\s+)?cash\s+flows?\b",
            StatementKind::CashFlow,
        ),
    ]
    .into_iter()
    .map(|(p, kind)| (Regex::new(p).expect("section heading pattern"), kind))
    .collect()
});

static YEAR_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year token pattern"));
static BARE_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("bare year pattern"));
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s+\d+|[a-z]-\d+|table\s+of\s+contents|index(?:\s+to\s+financial\s+statements)?)$")
        .expect("page marker pattern")
});
static FOOTNOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:\(\d\)|\*+)\s*$|:\s*$").expect("footnote pattern"));

/// Row label rules, first match wins. Within the rules of one statement the
/// more specific phrasings come first and the bare "revenue" comes last.
static ROW_RULES: Lazy<Vec<(Regex, MetricCategory, f64)>> = Lazy::new(|| {
    use MetricCategory::*;
    [
        // per share and share counts name income, so they go first
        (r"per\s+(?:common\s+)?share.*diluted|diluted.*per\s+(?:common\s+)?share", EpsDiluted, 0.90),
        (r"per\s+(?:common\s+)?share.*basic|basic.*per\s+(?:common\s+)?share", EpsBasic, 0.90),
        (r"dividends?.*per\s+(?:common\s+)?share", DividendsPerShare, 0.85),
        (r"weighted[\s-]+average.*diluted|diluted.*weighted[\s-]+average", WeightedAverageSharesDiluted, 0.85),
        (r"weighted[\s-]+average.*basic|basic.*weighted[\s-]+average", WeightedAverageSharesBasic, 0.85),
        // cash flow
        (r"net\s+cash.*operating\s+activities", OperatingCashFlow, 0.95),
        (r"net\s+cash.*investing\s+activities", InvestingCashFlow, 0.95),
        (r"net\s+cash.*financing\s+activities", FinancingCashFlow, 0.95),
        (r"net\s+(?:increase|decrease|change).*\bcash\b", NetChangeInCash, 0.85),
        (r"purchases?\s+of\s+property|capital\s+expenditures", CapitalExpenditures, 0.85),
        (r"(?:stock|share)-based\s+compensation", StockBasedCompensation, 0.80),
        (r"^depreciation", DepreciationCashFlow, 0.80),
        (r"dividends\s+paid|payments?\s+(?:of|for)\s+dividends", DividendsPaid, 0.85),
        (r"repurchases?\s+of|purchases?\s+of\s+treasury", ShareRepurchases, 0.80),
        (r"acquisitions?,?\s+net\s+of\s+cash", Acquisitions, 0.80),
        (r"proceeds\s+from.*(?:debt|borrowings|notes)", DebtIssuance, 0.75),
        (r"repayments?\s+of.*(?:debt|borrowings|notes)", DebtRepayment, 0.75),
        // balance sheet
        (r"total\s+liabilities\s+and", TotalLiabilitiesAndEquity, 0.95),
        (r"total\s+current\s+assets", TotalCurrentAssets, 0.95),
        (r"total\s+current\s+liabilities", TotalCurrentLiabilities, 0.95),
        (r"total\s+assets", TotalAssets, 0.95),
        (r"total\s+liabilities", TotalLiabilities, 0.95),
        (r"total\s+(?:stockholders|shareholders)['\x{2019}]?\s+equity|total\s+equity", TotalEquity, 0.95),
        (r"cash\s+and\s+cash\s+equivalents", CashAndEquivalents, 0.90),
        (r"short-?\s*term\s+investments|marketable\s+securities", ShortTermInvestments, 0.80),
        (r"accounts\s+receivable", AccountsReceivable, 0.85),
        (r"inventor(?:y|ies)", Inventory, 0.80),
        (r"prepaid", PrepaidExpenses, 0.75),
        (r"property,?\s+(?:plant\s+)?and\s+equipment", PropertyPlantEquipment, 0.85),
        (r"operating\s+lease\s+right", OperatingLeaseAssets, 0.80),
        (r"goodwill", Goodwill, 0.85),
        (r"intangible", IntangibleAssets, 0.80),
        (r"accounts\s+payable", AccountsPayable, 0.85),
        (r"accrued", AccruedLiabilities, 0.75),
        (r"deferred\s+revenue|unearned\s+revenue", DeferredRevenue, 0.80),
        (r"current\s+portion\s+of\s+long-?\s*term\s+debt", CurrentPortionLongTermDebt, 0.85),
        (r"short-?\s*term\s+(?:debt|borrowings)|commercial\s+paper", ShortTermDebt, 0.80),
        (r"long-?\s*term\s+debt", LongTermDebt, 0.85),
        (r"operating\s+lease\s+liabilit", OperatingLeaseLiabilities, 0.75),
        (r"additional\s+paid-in\s+capital", AdditionalPaidInCapital, 0.85),
        (r"accumulated\s+other\s+comprehensive", AccumulatedOtherComprehensiveIncome, 0.80),
        (r"retained\s+earnings|accumulated\s+deficit", RetainedEarnings, 0.85),
        (r"treasury\s+stock", TreasuryStock, 0.75),
        (r"non-?controlling\s+interests?", NoncontrollingInterest, 0.70),
        (r"common\s+stock", CommonStock, 0.60),
        // income statement
        (r"total\s+(?:net\s+)?revenues?|total\s+net\s+sales", Revenue, 0.95),
        (r"cost\s+of\s+(?:revenues?|sales|goods\s+sold)", CostOfRevenue, 0.85),
        (r"products?\s+revenues?", ProductRevenue, 0.80),
        (r"services?\s+revenues?", ServiceRevenue, 0.80),
        (r"gross\s+(?:profit|margin)", GrossProfit, 0.90),
        (r"research\s+and\s+development", ResearchAndDevelopment, 0.85),
        (r"selling,?\s+general", SellingGeneralAdministrative, 0.85),
        (r"restructuring", RestructuringCharges, 0.75),
        (r"total\s+(?:costs\s+and\s+)?(?:operating\s+)?(?:costs\s+and\s+)?expenses", TotalOperatingExpenses, 0.85),
        (r"(?:income|loss)\s+before\s+(?:provision\s+for\s+)?income\s+taxes", IncomeBeforeTax, 0.90),
        (r"(?:provision\s+for|benefit\s+from)\s+income\s+taxes|income\s+tax\s+(?:expense|provision|benefit)", IncomeTaxExpense, 0.85),
        (r"(?:income|loss)\s+from\s+continuing\s+operations", IncomeFromContinuingOperations, 0.80),
        (r"(?:income|loss)\s+from\s+operations|operating\s+(?:income|loss)", OperatingIncome, 0.90),
        (r"interest\s+expense", InterestExpense, 0.85),
        (r"interest\s+(?:and\s+other\s+)?income", InterestIncome, 0.75),
        (r"other\s+(?:income|expense)", OtherIncomeExpense, 0.70),
        (r"net\s+(?:income|loss).*non-?controlling", NetIncomeAttributableToNoncontrolling, 0.85),
        (r"comprehensive\s+(?:income|loss)", ComprehensiveIncome, 0.75),
        (r"net\s+(?:income|loss|earnings)", NetIncome, 0.90),
        (r"depreciation\s+and\s+amortization", DepreciationAmortization, 0.80),
        (r"net\s+(?:revenues?|sales)", Revenue, 0.85),
        (r"\brevenues?\b|\bsales\b", Revenue, 0.60),
    ]
    .into_iter()
    .map(|(p, category, confidence)| {
        let re = Regex::new(&format!("(?i){}", p)).expect("row rule pattern");
        (re, category, confidence)
    })
    .collect()
});

/// Category and confidence for a row label within `kind`.
pub fn classify_row(label: &str, kind: StatementKind) -> Option<(MetricCategory, f64)> {
    ROW_RULES
        .iter()
        .filter(|(_, category, _)| kind.includes(*category))
        .find(|(re, _, _)| re.is_match(label))
        .map(|(_, category, confidence)| (*category, *confidence))
}

fn has_year_header(text: &str) -> bool {
    text.lines().any(|line| header_years(line).len() >= MIN_HEADER_YEARS)
}

fn header_years(line: &str) -> Vec<&str> {
    YEAR_TOKEN_RE
        .find_iter(line)
        .map(|m| m.as_str())
        .unique()
        .collect()
}

/// Finds the income statement, balance sheet and cash-flow statement.
///
/// Headings count only at the start of a line. When a heading occurs more
/// than once (a table of contents, then the statement) the first occurrence
/// followed by a year header wins. Each section runs to the next heading and
/// is capped at [`MAX_SECTION_CHARS`].
pub fn locate_sections(text: &str) -> Vec<StatementSection> {
    let mut headings: Vec<(usize, StatementKind)> = SECTION_HEADINGS
        .iter()
        .flat_map(|(re, kind)| re.find_iter(text).map(move |m| (m.start(), *kind)))
        .collect();
    headings.sort_by_key(|(start, _)| *start);

    let mut sections = Vec::new();
    for kind in StatementKind::iter() {
        let candidates: Vec<StatementSection> = headings
            .iter()
            .enumerate()
            .filter(|(_, (_, k))| *k == kind)
            .map(|(i, (start, _))| {
                let end = headings[i + 1..]
                    .iter()
                    .map(|(s, _)| *s)
                    .find(|s| s > start)
                    .unwrap_or(text.len());
                StatementSection {
                    kind,
                    start: *start,
                    text: truncate_chars(text[*start..end].trim(), MAX_SECTION_CHARS),
                }
            })
            .collect();

        let chosen = candidates
            .iter()
            .position(|s| has_year_header(&s.text))
            .unwrap_or(0);
        if let Some(section) = candidates.into_iter().nth(chosen) {
            sections.push(section);
        }
    }
    sections.sort_by_key(|s| s.start);
    sections
}

fn is_dash(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| matches!(c, '-' | '\u{2013}' | '\u{2014}' | '\u{2212}' | '$' | ' '))
        && token.chars().any(|c| c != '$' && c != ' ')
}

fn is_value_token(token: &str) -> bool {
    let token = token.trim();
    if is_dash(token) {
        return true;
    }
    token.chars().any(|c| c.is_ascii_digit())
        && token.chars().all(|c| {
            c.is_ascii_digit() || matches!(c, ',' | '.' | '$' | '(' | ')' | '-' | '\u{2212}' | ' ')
        })
}

fn is_rejected_label(label: &str) -> bool {
    let letters = label.chars().filter(|c| c.is_alphabetic()).count();
    letters < 2 || MARKER_RE.is_match(label.trim())
}

fn clean_label(label: &str) -> String {
    FOOTNOTE_RE
        .replace(label.trim(), "")
        .split_whitespace()
        .join(" ")
}

/// Splits a line into its label and the value cells that follow it.
fn split_row(line: &str) -> Option<(String, Vec<String>)> {
    if line.contains('|') {
        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let (label, values) = cells.split_first()?;
        if is_value_token(label) {
            return None;
        }
        let values = values
            .iter()
            .filter(|c| is_value_token(c))
            .map(|c| c.to_string())
            .collect();
        Some((clean_label(label), values))
    } else {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let split = tokens
            .iter()
            .position(|t| is_value_token(t) && !BARE_YEAR_RE.is_match(t))?;
        let values = tokens[split..]
            .iter()
            .filter(|t| is_value_token(t))
            .map(|t| t.to_string())
            .collect();
        Some((clean_label(&tokens[..split].join(" ")), values))
    }
}

fn parse_cell(cell: &str, currency: &str) -> Option<Decimal> {
    if is_dash(cell) {
        return None;
    }
    money::parse_amount(cell, MetricUnit::Dollars, currency)
        .ok()
        .map(|v| v.amount)
}

/// Reads the column-aligned rows of one statement section.
///
/// Rows are read only after a header naming at least two years. The first
/// value of a row is the current period and the second, when present, the
/// prior period used for the year-over-year change. There is no minimum
/// amount here: a statement row is unambiguous about what it reports.
pub fn extract_table_metrics(
    section: &StatementSection,
    unit: MetricUnit,
    currency: &str,
) -> HeuristicExtraction {
    let mut extraction = HeuristicExtraction::default();
    let period_type = units::detect_period_type(&section.text);
    let detected_period = units::detect_period(&section.text).map(|p| p.label);
    let mut column_period: Option<String> = None;

    for line in section.text.lines().map(str::trim) {
        let years = header_years(line);
        if years.len() >= MIN_HEADER_YEARS {
            column_period = years.first().map(|y| y.to_string());
            continue;
        }
        if column_period.is_none() || line.chars().count() < MIN_ROW_CHARS {
            continue;
        }

        let Some((label, cells)) = split_row(line) else {
            continue;
        };
        if is_rejected_label(&label) {
            continue;
        }
        let Some((category, confidence)) = classify_row(&label, section.kind) else {
            continue;
        };
        let Some(current) = cells.first().and_then(|c| parse_cell(c, currency)) else {
            continue;
        };
        let prior = cells.get(1).and_then(|c| parse_cell(c, currency));

        match row_metric(&label, category, current, prior, unit) {
            Ok((amount, amount_unit, yoy, warning)) => {
                if let Some(warning) = warning {
                    extraction.warnings.push(warning);
                }
                extraction.metrics.push(ExtendedFinancialMetric {
                    name: label.clone(),
                    display_value: money::display_for(category, amount),
                    raw_value: amount,
                    unit: amount_unit,
                    period: detected_period.clone().or_else(|| column_period.clone()),
                    period_type,
                    category,
                    source: MetricSource::TableRow,
                    confidence,
                    context: truncate_chars(line, MAX_CONTEXT_WINDOW_CHARS * 2),
                    yoy_change: yoy,
                });
            }
            Err(err) => {
                log::warn!("{} row {:?} rejected: {}", section.kind, label, err);
                extraction.warnings.push(err);
            }
        }
    }
    extraction
}

type RowValue = (Decimal, MetricUnit, Option<Decimal>, Option<ExtractionError>);

fn row_metric(
    label: &str,
    category: MetricCategory,
    current: Decimal,
    prior: Option<Decimal>,
    unit: MetricUnit,
) -> Result<RowValue, ExtractionError> {
    let unit = if category.is_per_share() {
        MetricUnit::PerShare
    } else if matches!(unit, MetricUnit::None | MetricUnit::PerShare) {
        MetricUnit::Dollars
    } else {
        unit
    };

    let signed = |value: Decimal| {
        if category.is_signed() && has_loss_cue(label, "") {
            -value.abs()
        } else {
            value
        }
    };
    let current = signed(current);
    let prior = prior.map(signed);

    let amount = current
        .checked_mul(unit.multiplier())
        .ok_or(ExtractionError::ImplausibleAmount {
            amount: current,
            ceiling: money::MAX_PLAUSIBLE_AMOUNT,
        })?;
    money::check_plausible(amount, unit)?;

    let (yoy, warning) = match prior.map(|p| money::percentage_change(current, p)) {
        Some(Ok(change)) => (Some(change), None),
        Some(Err(err)) if err.is_plausibility_violation() => (None, Some(err)),
        _ => (None, None),
    };

    let unit = if category.is_share_count() && !unit.is_scale() {
        MetricUnit::Shares
    } else {
        unit
    };
    Ok((amount, unit, yoy, warning))
}

/// Locates every statement in `text` and reads its rows.
pub fn extract_statement_tables(text: &str, unit: MetricUnit, currency: &str) -> HeuristicExtraction {
    let mut extraction = HeuristicExtraction::default();
    for section in locate_sections(text) {
        let part = extract_table_metrics(&section, unit, currency);
        log::debug!("{} section yielded {} rows", section.kind, part.metrics.len());
        extraction.metrics.extend(part.metrics);
        extraction.warnings.extend(part.warnings);
    }
    extraction
}
