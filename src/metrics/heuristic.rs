//! Pattern based extraction of candidate metrics from normalized text.
//!
//! Every catalog entry is searched with four phrasings: label then amount,
//! label then pipe-delimited amount, label then parenthesized negative, and
//! the rarer amount then label. All candidates are kept; choosing between
//! them is the reconciler's job.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::catalog::{label_fragment, CatalogEntry, CATALOG};
use super::error::ExtractionError;
use super::money;
use super::types::{ExtendedFinancialMetric, MetricCategory, MetricSource, MetricUnit};
use crate::core::config::{ExtractionConfig, MAX_CONTEXT_WINDOW_CHARS};
use crate::edgar::parsing::units;

/// Amounts below this (before the document scale is applied) are most likely
/// percentages, ratios or footnote numbers.
pub const MIN_ABSOLUTE_AMOUNT: Decimal = dec!(1000);
/// Confidence lost per repeated match of the same entry.
pub const CONFIDENCE_DECAY: f64 = 0.08;
/// Extra factor for the amount-then-label phrasing.
pub const AMOUNT_FIRST_PENALTY: f64 = 0.9;
/// Matches kept per catalog entry. Keeps the decayed confidence positive.
pub const MAX_MATCHES_PER_ENTRY: usize = 10;

const AMOUNT: &str =
    r"(?P<amount>\(?\s*[-\x{2212}]?\s*\$?\s*(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?))";
const SCALE_WORD: &str = r"(?:\s*(?P<scale>thousand|million|billion)s?\b)?";
const PERCENT: &str = r"(?P<percent>\s*(?:%|percent\b))?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phrasing {
    LabelAmount,
    LabelPipe,
    LabelNegative,
    AmountLabel,
}

static ENTRY_PATTERNS: Lazy<Vec<Vec<(Phrasing, Regex)>>> =
    Lazy::new(|| CATALOG.iter().map(compile_entry).collect());

static LOSS_CUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:loss(?:es)?|deficit)\b").expect("loss cue pattern"));
static GAIN_CUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:income|earnings|profit)\b").expect("gain cue pattern"));
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("year pattern"));

fn compile_entry(entry: &CatalogEntry) -> Vec<(Phrasing, Regex)> {
    let label = format!("(?P<label>{})", label_fragment(entry));
    [
        (
            Phrasing::LabelAmount,
            format!(r"(?i){label}(?P<filler>[^|\n\d(%]{{0,60}}?){AMOUNT}\)?{PERCENT}{SCALE_WORD}"),
        ),
        (
            Phrasing::LabelPipe,
            format!(r"(?i){label}(?P<filler>[^|\n\d]{{0,40}}?)\|\s*{AMOUNT}\s*\)?{PERCENT}{SCALE_WORD}"),
        ),
        (
            Phrasing::LabelNegative,
            format!(
                r"(?i){label}(?P<filler>[^|\n\d(]{{0,60}}?)\(\s*\$?\s*(?P<amount>\d[\d,]*(?:\.\d+)?)\s*\){SCALE_WORD}"
            ),
        ),
        (
            Phrasing::AmountLabel,
            format!(r"(?i)(?P<amount>\$\s*\d[\d,]*(?:\.\d+)?){SCALE_WORD}\s+(?:in|of)\s+{label}"),
        ),
    ]
    .into_iter()
    .map(|(phrasing, pattern)| {
        let re = Regex::new(&pattern)
            .unwrap_or_else(|e| panic!("catalog entry {} does not compile: {}", entry.name, e));
        (phrasing, re)
    })
    .collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeuristicExtraction {
    pub metrics: Vec<ExtendedFinancialMetric>,
    /// Plausibility violations of otherwise matching amounts.
    pub warnings: Vec<ExtractionError>,
}

#[derive(Debug)]
struct RawMatch {
    phrasing: Phrasing,
    start: usize,
    end: usize,
    label: String,
    filler: String,
    amount: String,
    scale: Option<MetricUnit>,
}

impl RawMatch {
    fn from_captures(phrasing: Phrasing, caps: &Captures<'_>) -> Option<Self> {
        if caps.name("percent").is_some() {
            return None;
        }
        let whole = caps.get(0)?;
        let scale = caps
            .name("scale")
            .and_then(|m| match m.as_str().to_lowercase().as_str() {
                "thousand" => Some(MetricUnit::Thousands),
                "million" => Some(MetricUnit::Millions),
                "billion" => Some(MetricUnit::Billions),
                _ => None,
            });
        Some(Self {
            phrasing,
            start: whole.start(),
            end: whole.end(),
            label: caps.name("label").map(|m| m.as_str().to_string()).unwrap_or_default(),
            filler: caps.name("filler").map(|m| m.as_str().to_string()).unwrap_or_default(),
            amount: caps.name("amount")?.as_str().trim().to_string(),
            scale,
        })
    }

    fn has_loss_cue(&self) -> bool {
        has_loss_cue(&self.label, &self.filler)
    }

    /// A loss cue anywhere in `surrounding`, unless the label names income.
    fn has_nearby_loss_cue(&self, surrounding: &str) -> bool {
        LOSS_CUE_RE.is_match(surrounding) && !GAIN_CUE_RE.is_match(&self.label)
    }
}

/// True when the label (or the words between label and amount) reports a
/// loss or deficit and the label does not also name income.
pub(crate) fn has_loss_cue(label: &str, filler: &str) -> bool {
    (LOSS_CUE_RE.is_match(label) || LOSS_CUE_RE.is_match(filler)) && !GAIN_CUE_RE.is_match(label)
}

/// Extracts candidates from normalized text, reading unscaled amounts in `unit`.
pub fn extract_metrics(text: &str, unit: MetricUnit) -> Vec<ExtendedFinancialMetric> {
    extract_metrics_with(text, unit, &ExtractionConfig::default(), &HashMap::new()).metrics
}

/// Like [`extract_metrics`], skipping every entry whose base confidence cannot
/// beat a confidence already `known` for its category.
pub fn extract_metrics_with(
    text: &str,
    unit: MetricUnit,
    config: &ExtractionConfig,
    known: &HashMap<MetricCategory, f64>,
) -> HeuristicExtraction {
    let period = units::detect_period(text).map(|p| p.label);
    let period_type = units::detect_period_type(text);
    let window = config.context_window_chars.min(MAX_CONTEXT_WINDOW_CHARS);

    let mut extraction = HeuristicExtraction::default();
    for (entry, patterns) in CATALOG.iter().zip(ENTRY_PATTERNS.iter()) {
        if known
            .get(&entry.category)
            .is_some_and(|confidence| *confidence >= entry.base_confidence)
        {
            continue;
        }

        let mut matches: Vec<RawMatch> = patterns
            .iter()
            .flat_map(|(phrasing, re)| {
                re.captures_iter(text)
                    .filter_map(move |caps| RawMatch::from_captures(*phrasing, &caps))
            })
            .collect();
        if matches.is_empty() {
            continue;
        }
        matches.sort_by_key(|m| (m.phrasing == Phrasing::AmountLabel, m.start));

        let mut seen: HashSet<Decimal> = HashSet::new();
        let mut index = 0usize;
        for raw in matches {
            if index >= MAX_MATCHES_PER_ENTRY {
                break;
            }
            let surrounding = line_window(text, raw.start, raw.end, window);
            let (amount, amount_unit) = match resolve_amount(entry, &raw, surrounding, unit, &config.currency) {
                Ok(resolved) => resolved,
                Err(err) if err.is_plausibility_violation() => {
                    log::warn!("{}: rejected {:?}: {}", entry.name, raw.amount, err);
                    extraction.warnings.push(err);
                    continue;
                }
                Err(err) => {
                    log::debug!("{}: skipped {:?}: {}", entry.name, raw.amount, err);
                    continue;
                }
            };
            if !seen.insert(amount) {
                continue;
            }

            let mut confidence = entry.base_confidence * (1.0 - CONFIDENCE_DECAY * index as f64);
            if raw.phrasing == Phrasing::AmountLabel {
                confidence *= AMOUNT_FIRST_PENALTY;
            }
            index += 1;

            extraction.metrics.push(ExtendedFinancialMetric {
                name: entry.name.to_string(),
                display_value: money::display_for(entry.category, amount),
                raw_value: amount,
                unit: amount_unit,
                period: period.clone(),
                period_type,
                category: entry.category,
                source: MetricSource::TextPattern,
                confidence,
                context: context_window(text, raw.start, raw.end, window),
                yoy_change: None,
            });
        }
    }

    log::debug!(
        "Heuristic pass produced {} candidates, {} warnings",
        extraction.metrics.len(),
        extraction.warnings.len()
    );
    extraction
}

fn resolve_amount(
    entry: &CatalogEntry,
    raw: &RawMatch,
    surrounding: &str,
    document_unit: MetricUnit,
    currency: &str,
) -> Result<(Decimal, MetricUnit), ExtractionError> {
    let category = entry.category;

    if raw.scale.is_none() && YEAR_RE.is_match(&raw.amount) {
        return Err(ExtractionError::NoMatch);
    }

    let (amount, unit) = if category.is_per_share() {
        let value = money::parse_amount(&raw.amount, MetricUnit::PerShare, currency)?;
        (value.amount, MetricUnit::PerShare)
    } else {
        let base = money::parse_amount(&raw.amount, MetricUnit::Dollars, currency)?;
        if raw.scale.is_none() && base.amount.abs() < MIN_ABSOLUTE_AMOUNT {
            return Err(ExtractionError::NoMatch);
        }
        let unit = match (raw.scale, document_unit) {
            (Some(inline), _) => inline,
            (None, MetricUnit::None | MetricUnit::PerShare) => MetricUnit::Dollars,
            (None, unit) => unit,
        };
        let scaled = base.amount.checked_mul(unit.multiplier()).ok_or(
            ExtractionError::ImplausibleAmount {
                amount: base.amount,
                ceiling: money::MAX_PLAUSIBLE_AMOUNT,
            },
        )?;
        money::check_plausible(scaled, unit)?;
        if raw.scale.is_some() && scaled.abs() < MIN_ABSOLUTE_AMOUNT {
            return Err(ExtractionError::NoMatch);
        }
        let unit = if category.is_share_count() && !unit.is_scale() {
            MetricUnit::Shares
        } else {
            unit
        };
        (scaled, unit)
    };

    let negative = raw.phrasing == Phrasing::LabelNegative
        || (category.is_signed() && (raw.has_loss_cue() || raw.has_nearby_loss_cue(surrounding)));
    Ok((if negative { -amount.abs() } else { amount }, unit))
}

/// Up to `window` characters on each side of the match without leaving its
/// line, so a neighbouring statement row never lends its sign.
fn line_window(text: &str, start: usize, end: usize, window: usize) -> &str {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[end..].find('\n').map(|i| end + i).unwrap_or(text.len());
    let from = text[line_start..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| line_start + i)
        .unwrap_or(start);
    let to = text[end..line_end]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(line_end);
    &text[from..to]
}

/// Up to `window` characters on each side of the match, whitespace collapsed.
fn context_window(text: &str, start: usize, end: usize, window: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let to = text[end..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].split_whitespace().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn of(metrics: &[ExtendedFinancialMetric], category: MetricCategory) -> Vec<&ExtendedFinancialMetric> {
        metrics.iter().filter(|m| m.category == category).collect()
    }

    #[test]
    fn test_label_amount_with_inline_scale() {
        let metrics = extract_metrics("Total Revenue $ 1,234.5 million", MetricUnit::Millions);
        let revenue = of(&metrics, MetricCategory::Revenue);
        assert!(!revenue.is_empty());
        assert!(revenue.iter().all(|m| m.raw_value == dec!(1234500000)));
        assert_eq!(revenue[0].name, "Total Revenue");
        assert_eq!(revenue[0].confidence, 0.95);
        assert_eq!(revenue[0].display_value, "$1.23B");
    }

    #[test]
    fn test_document_unit_is_applied_once() {
        let metrics = extract_metrics("Total assets 5,000", MetricUnit::Thousands);
        let assets = of(&metrics, MetricCategory::TotalAssets);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].raw_value, dec!(5000000));
        assert_eq!(assets[0].unit, MetricUnit::Thousands);
    }

    #[test]
    fn test_net_loss_is_negative() {
        let metrics = extract_metrics("Net Loss (45,678)", MetricUnit::Dollars);
        let net = of(&metrics, MetricCategory::NetIncome);
        assert_eq!(net.len(), 1);
        assert_eq!(net[0].raw_value, dec!(-45678));
    }

    #[test]
    fn test_loss_cue_without_parentheses() {
        let metrics = extract_metrics("Operating loss of $12,500", MetricUnit::Dollars);
        let operating = of(&metrics, MetricCategory::OperatingIncome);
        assert_eq!(operating[0].raw_value, dec!(-12500));

        // "income" in the label wins over a loss word nearby
        let metrics = extract_metrics("Net income (loss) 7,500", MetricUnit::Dollars);
        let net = of(&metrics, MetricCategory::NetIncome);
        assert_eq!(net[0].raw_value, dec!(7500));
    }

    #[test]
    fn test_loss_cue_in_surrounding_sentence() {
        let metrics = extract_metrics(
            "Net cash provided by operating activities was 8,200 as the quarterly deficit widened",
            MetricUnit::Dollars,
        );
        let ocf = of(&metrics, MetricCategory::OperatingCashFlow);
        assert_eq!(ocf[0].raw_value, dec!(-8200));

        // the cue sits on another line
        let metrics = extract_metrics("Net cash provided by operating activities 8,200\nNet loss (1,500)", MetricUnit::Dollars);
        let ocf = of(&metrics, MetricCategory::OperatingCashFlow);
        assert_eq!(ocf[0].raw_value, dec!(8200));

        // unsigned categories ignore loss words
        let metrics = extract_metrics("Total revenue 5,000 despite a net loss", MetricUnit::Dollars);
        let revenue = of(&metrics, MetricCategory::Revenue);
        assert!(revenue.iter().all(|m| m.raw_value == dec!(5000)));
    }

    #[test]
    fn test_pipe_row() {
        let metrics = extract_metrics("| Total current assets | $300,000 | $280,000 |", MetricUnit::Dollars);
        let current = of(&metrics, MetricCategory::TotalCurrentAssets);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].raw_value, dec!(300000));
    }

    #[test]
    fn test_minimum_threshold_and_percentages() {
        let metrics = extract_metrics(
            "Revenue grew 12% year over year. Net income 250. Total revenue was 45 percent",
            MetricUnit::Millions,
        );
        assert!(of(&metrics, MetricCategory::Revenue).is_empty());
        assert!(of(&metrics, MetricCategory::NetIncome).is_empty());
    }

    #[test]
    fn test_per_share_is_exempt_from_threshold() {
        let metrics = extract_metrics("Diluted earnings per share $2.35", MetricUnit::Millions);
        let eps = of(&metrics, MetricCategory::EpsDiluted);
        assert_eq!(eps[0].raw_value, dec!(2.35));
        assert_eq!(eps[0].unit, MetricUnit::PerShare);
    }

    #[test]
    fn test_confidence_decays_over_repeats() {
        let text = "Total revenue 1,500 in Q1.\nTotal revenue 1,600 in Q2.\nTotal revenue 1,700 in Q3.";
        let metrics = extract_metrics(text, MetricUnit::Millions);
        let revenue: Vec<_> = of(&metrics, MetricCategory::Revenue)
            .into_iter()
            .filter(|m| m.name == "Total Revenue")
            .collect();
        assert_eq!(revenue.len(), 3);
        for pair in revenue.windows(2) {
            assert!(pair[1].confidence < pair[0].confidence);
        }
        assert_eq!(revenue[0].raw_value, dec!(1500000000));
    }

    #[test]
    fn test_repeated_value_is_deduplicated() {
        let text = "Total revenue 1,500. Later, total revenue 1,500 again.";
        let metrics = extract_metrics(text, MetricUnit::Millions);
        let total: Vec<_> = metrics.iter().filter(|m| m.name == "Total Revenue").collect();
        assert_eq!(total.len(), 1);
    }

    #[test]
    fn test_amount_then_label() {
        let metrics = extract_metrics("The company reported $3.2 billion in total revenue.", MetricUnit::Millions);
        let revenue: Vec<_> = metrics.iter().filter(|m| m.name == "Total Revenue").collect();
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].raw_value, dec!(3200000000));
        assert!(revenue[0].confidence < 0.95);
    }

    #[test]
    fn test_years_are_not_amounts() {
        let metrics = extract_metrics("Total revenue 2023", MetricUnit::Millions);
        assert!(of(&metrics, MetricCategory::Revenue).is_empty());
    }

    #[test]
    fn test_implausible_amount_is_a_warning() {
        let extraction = extract_metrics_with(
            "Total assets 50,000,000",
            MetricUnit::Billions,
            &ExtractionConfig::default(),
            &HashMap::new(),
        );
        assert!(of(&extraction.metrics, MetricCategory::TotalAssets).is_empty());
        assert!(extraction.warnings.iter().all(|w| w.is_plausibility_violation()));
        assert!(!extraction.warnings.is_empty());
    }

    #[test]
    fn test_known_categories_are_skipped() {
        let known = HashMap::from([(MetricCategory::NetIncome, 0.97)]);
        let extraction = extract_metrics_with(
            "Net income 5,000",
            MetricUnit::Millions,
            &ExtractionConfig::default(),
            &known,
        );
        assert!(of(&extraction.metrics, MetricCategory::NetIncome).is_empty());
    }

    #[test]
    fn test_context_window_is_bounded() {
        let padding = "x ".repeat(400);
        let text = format!("{}Total assets 5,000 {}", padding, padding);
        let metrics = extract_metrics(&text, MetricUnit::Millions);
        let assets = of(&metrics, MetricCategory::TotalAssets);
        assert!(assets[0].context.contains("Total assets 5,000"));
        assert!(assets[0].context.chars().count() <= "Total assets 5,000".len() + 200);
    }
}
