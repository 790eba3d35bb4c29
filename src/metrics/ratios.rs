//! Financial ratios over a reconciled metric set.
//!
//! Each ratio is computed only when its denominator is present and strictly
//! positive. Margins above their ceiling point at a scaling error upstream
//! and are dropped with a warning instead of being clamped.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::error::ExtractionError;
use super::money;
use super::types::{ExtendedFinancialMetric, MetricCategory};

/// Ceiling for gross, operating and net margins, in percent.
pub const MAX_MARGIN_PERCENT: Decimal = dec!(100);
/// EBITDA adds back non-cash charges and may legitimately exceed revenue a little.
pub const MAX_EBITDA_MARGIN_PERCENT: Decimal = dec!(150);

use HealthStatus::{Caution, Excellent, Good, Neutral};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Excellent,
    Good,
    Neutral,
    Caution,
    Warning,
}

impl HealthStatus {
    fn describe(self) -> &'static str {
        match self {
            HealthStatus::Excellent => "excellent",
            HealthStatus::Good => "healthy",
            HealthStatus::Neutral => "in line with typical companies",
            HealthStatus::Caution => "weak",
            HealthStatus::Warning => "a concern",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RatioCategory {
    Profitability,
    Liquidity,
    Leverage,
    Efficiency,
    Coverage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRatio {
    pub name: String,
    /// Percent for margins and returns, a plain multiple otherwise.
    pub value: Decimal,
    pub formatted_value: String,
    pub description: String,
    pub interpretation: String,
    pub health_status: HealthStatus,
    pub category: RatioCategory,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RatioAnalysis {
    pub ratios: Vec<FinancialRatio>,
    pub warnings: Vec<ExtractionError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Percent,
    Multiple,
}

/// Threshold bands, checked in order. The first satisfied band wins and
/// anything past the last band is a warning.
#[derive(Debug, Clone, Copy)]
enum Bands {
    AtLeast(&'static [(Decimal, HealthStatus)]),
    AtMost(&'static [(Decimal, HealthStatus)]),
}

impl Bands {
    fn classify(self, value: Decimal) -> HealthStatus {
        let found = match self {
            Bands::AtLeast(bands) => bands.iter().find(|(threshold, _)| value >= *threshold),
            Bands::AtMost(bands) => bands.iter().find(|(threshold, _)| value <= *threshold),
        };
        found.map(|(_, status)| *status).unwrap_or(HealthStatus::Warning)
    }
}

const fn at_least(bands: &'static [(Decimal, HealthStatus)]) -> Bands {
    Bands::AtLeast(bands)
}

const fn at_most(bands: &'static [(Decimal, HealthStatus)]) -> Bands {
    Bands::AtMost(bands)
}

struct RatioDefinition {
    name: &'static str,
    description: &'static str,
    category: RatioCategory,
    scale: Scale,
    ceiling: Option<Decimal>,
    bands: Bands,
    operands: fn(&RatioInputs) -> Option<(Decimal, Decimal)>,
}

static RATIOS: &[RatioDefinition] = &[
    RatioDefinition {
        name: "Gross Margin",
        description: "Gross profit as a share of revenue",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: Some(MAX_MARGIN_PERCENT),
        bands: at_least(&[(dec!(40), Excellent), (dec!(25), Good), (dec!(15), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.gross_profit()?, i.revenue()?)),
    },
    RatioDefinition {
        name: "Operating Margin",
        description: "Operating income as a share of revenue",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: Some(MAX_MARGIN_PERCENT),
        bands: at_least(&[(dec!(20), Excellent), (dec!(10), Good), (dec!(5), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.get(MetricCategory::OperatingIncome)?, i.revenue()?)),
    },
    RatioDefinition {
        name: "Net Margin",
        description: "Net income as a share of revenue",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: Some(MAX_MARGIN_PERCENT),
        bands: at_least(&[(dec!(20), Excellent), (dec!(10), Good), (dec!(5), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.get(MetricCategory::NetIncome)?, i.revenue()?)),
    },
    RatioDefinition {
        name: "EBITDA Margin",
        description: "Earnings before interest, taxes, depreciation and amortization as a share of revenue",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: Some(MAX_EBITDA_MARGIN_PERCENT),
        bands: at_least(&[(dec!(30), Excellent), (dec!(20), Good), (dec!(10), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.ebitda()?, i.revenue()?)),
    },
    RatioDefinition {
        name: "Return on Assets",
        description: "Net income relative to total assets",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: None,
        bands: at_least(&[(dec!(10), Excellent), (dec!(5), Good), (dec!(2), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.get(MetricCategory::NetIncome)?, i.positive(MetricCategory::TotalAssets)?)),
    },
    RatioDefinition {
        name: "Return on Equity",
        description: "Net income relative to shareholders' equity",
        category: RatioCategory::Profitability,
        scale: Scale::Percent,
        ceiling: None,
        bands: at_least(&[(dec!(20), Excellent), (dec!(10), Good), (dec!(7), Neutral), (dec!(0), Caution)]),
        operands: |i| Some((i.get(MetricCategory::NetIncome)?, i.positive(MetricCategory::TotalEquity)?)),
    },
    RatioDefinition {
        name: "Current Ratio",
        description: "Current assets per dollar of current liabilities",
        category: RatioCategory::Liquidity,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(2.0), Excellent), (dec!(1.5), Good), (dec!(1.0), Neutral), (dec!(0.8), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::TotalCurrentAssets)?,
                i.positive(MetricCategory::TotalCurrentLiabilities)?,
            ))
        },
    },
    RatioDefinition {
        name: "Quick Ratio",
        description: "Current assets excluding inventory per dollar of current liabilities",
        category: RatioCategory::Liquidity,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(1.5), Excellent), (dec!(1.0), Good), (dec!(0.8), Neutral), (dec!(0.5), Caution)]),
        operands: |i| {
            let inventory = i.get(MetricCategory::Inventory).unwrap_or_default();
            Some((
                i.get(MetricCategory::TotalCurrentAssets)? - inventory,
                i.positive(MetricCategory::TotalCurrentLiabilities)?,
            ))
        },
    },
    RatioDefinition {
        name: "Cash Ratio",
        description: "Cash and short-term investments per dollar of current liabilities",
        category: RatioCategory::Liquidity,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(1.0), Excellent), (dec!(0.5), Good), (dec!(0.2), Neutral), (dec!(0.1), Caution)]),
        operands: |i| {
            let investments = i.get(MetricCategory::ShortTermInvestments).unwrap_or_default();
            Some((
                i.get(MetricCategory::CashAndEquivalents)? + investments,
                i.positive(MetricCategory::TotalCurrentLiabilities)?,
            ))
        },
    },
    RatioDefinition {
        name: "Working Capital Ratio",
        description: "Current assets less current liabilities relative to total assets",
        category: RatioCategory::Liquidity,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(0.2), Excellent), (dec!(0.1), Good), (dec!(0.05), Neutral), (dec!(0), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::TotalCurrentAssets)? - i.get(MetricCategory::TotalCurrentLiabilities)?,
                i.positive(MetricCategory::TotalAssets)?,
            ))
        },
    },
    RatioDefinition {
        name: "Debt to Equity",
        description: "Total debt per dollar of shareholders' equity",
        category: RatioCategory::Leverage,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_most(&[(dec!(0.5), Excellent), (dec!(1.0), Good), (dec!(1.5), Neutral), (dec!(2.0), Caution)]),
        operands: |i| Some((i.total_debt()?, i.positive(MetricCategory::TotalEquity)?)),
    },
    RatioDefinition {
        name: "Debt Ratio",
        description: "Total liabilities relative to total assets",
        category: RatioCategory::Leverage,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_most(&[(dec!(0.4), Excellent), (dec!(0.6), Good), (dec!(0.7), Neutral), (dec!(0.8), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::TotalLiabilities)?,
                i.positive(MetricCategory::TotalAssets)?,
            ))
        },
    },
    RatioDefinition {
        name: "Equity Ratio",
        description: "Shareholders' equity relative to total assets",
        category: RatioCategory::Leverage,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(0.5), Excellent), (dec!(0.35), Good), (dec!(0.2), Neutral), (dec!(0.1), Caution)]),
        operands: |i| Some((i.get(MetricCategory::TotalEquity)?, i.positive(MetricCategory::TotalAssets)?)),
    },
    RatioDefinition {
        name: "Retained Earnings Ratio",
        description: "Accumulated retained earnings relative to total assets",
        category: RatioCategory::Leverage,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(0.5), Excellent), (dec!(0.25), Good), (dec!(0.1), Neutral), (dec!(0), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::RetainedEarnings)?,
                i.positive(MetricCategory::TotalAssets)?,
            ))
        },
    },
    RatioDefinition {
        name: "Asset Turnover",
        description: "Revenue generated per dollar of total assets",
        category: RatioCategory::Efficiency,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(1.5), Excellent), (dec!(1.0), Good), (dec!(0.5), Neutral), (dec!(0.25), Caution)]),
        operands: |i| Some((i.get(MetricCategory::Revenue)?, i.positive(MetricCategory::TotalAssets)?)),
    },
    RatioDefinition {
        name: "Receivables Turnover",
        description: "Revenue per dollar of accounts receivable",
        category: RatioCategory::Efficiency,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(10), Excellent), (dec!(7), Good), (dec!(5), Neutral), (dec!(3), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::Revenue)?,
                i.positive(MetricCategory::AccountsReceivable)?,
            ))
        },
    },
    RatioDefinition {
        name: "Inventory Turnover",
        description: "Cost of revenue per dollar of inventory",
        category: RatioCategory::Efficiency,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(8), Excellent), (dec!(5), Good), (dec!(3), Neutral), (dec!(2), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::CostOfRevenue)?,
                i.positive(MetricCategory::Inventory)?,
            ))
        },
    },
    RatioDefinition {
        name: "Interest Coverage",
        description: "Operating income per dollar of interest expense",
        category: RatioCategory::Coverage,
        scale: Scale::Multiple,
        ceiling: None,
        bands: at_least(&[(dec!(8), Excellent), (dec!(4), Good), (dec!(2), Neutral), (dec!(1), Caution)]),
        operands: |i| {
            Some((
                i.get(MetricCategory::OperatingIncome)?,
                i.positive(MetricCategory::InterestExpense)?,
            ))
        },
    },
];

/// Category values of a reconciled metric set plus the derived fallbacks.
pub struct RatioInputs {
    values: HashMap<MetricCategory, Decimal>,
}

impl RatioInputs {
    pub fn new(metrics: &[ExtendedFinancialMetric]) -> Self {
        let mut values = HashMap::new();
        for metric in metrics {
            values.entry(metric.category).or_insert(metric.raw_value);
        }
        Self { values }
    }

    pub fn get(&self, category: MetricCategory) -> Option<Decimal> {
        self.values.get(&category).copied()
    }

    /// Value usable as a denominator.
    pub fn positive(&self, category: MetricCategory) -> Option<Decimal> {
        self.get(category).filter(|v| *v > Decimal::ZERO)
    }

    fn revenue(&self) -> Option<Decimal> {
        self.positive(MetricCategory::Revenue)
    }

    /// Reported gross profit, else revenue less cost of revenue.
    pub fn gross_profit(&self) -> Option<Decimal> {
        self.get(MetricCategory::GrossProfit).or_else(|| {
            self.get(MetricCategory::Revenue)?
                .checked_sub(self.get(MetricCategory::CostOfRevenue)?)
        })
    }

    /// Reported EBITDA, else operating income plus depreciation and amortization.
    pub fn ebitda(&self) -> Option<Decimal> {
        self.get(MetricCategory::Ebitda).or_else(|| {
            let depreciation = self
                .get(MetricCategory::DepreciationAmortization)
                .or_else(|| self.get(MetricCategory::DepreciationCashFlow))?;
            self.get(MetricCategory::OperatingIncome)?
                .checked_add(depreciation.abs())
        })
    }

    /// Reported total debt, else the sum of whichever debt components exist.
    pub fn total_debt(&self) -> Option<Decimal> {
        self.get(MetricCategory::TotalDebt).or_else(|| {
            [
                MetricCategory::LongTermDebt,
                MetricCategory::ShortTermDebt,
                MetricCategory::CurrentPortionLongTermDebt,
            ]
            .into_iter()
            .filter_map(|c| self.get(c))
            .reduce(|a, b| a + b)
        })
    }
}

fn format_value(value: Decimal, scale: Scale) -> String {
    match scale {
        Scale::Percent => format!("{:.2}%", value),
        Scale::Multiple => format!("{:.2}x", money::round_half_up(value, money::PERCENT_DP)),
    }
}

fn compute(definition: &RatioDefinition, inputs: &RatioInputs) -> Result<FinancialRatio, ExtractionError> {
    let (numerator, denominator) = (definition.operands)(inputs).ok_or(ExtractionError::NoMatch)?;
    if denominator <= Decimal::ZERO {
        return Err(ExtractionError::ZeroDenominator);
    }
    let value = match definition.scale {
        Scale::Percent => money::percentage_of(numerator, denominator),
        Scale::Multiple => money::ratio(numerator, denominator),
    }
    .ok_or(ExtractionError::ZeroDenominator)?;

    if let Some(ceiling) = definition.ceiling {
        if value > ceiling {
            return Err(ExtractionError::ImplausibleRatio {
                name: definition.name.to_string(),
                value,
                ceiling,
            });
        }
    }

    let health_status = definition.bands.classify(value);
    let formatted_value = format_value(value, definition.scale);
    Ok(FinancialRatio {
        name: definition.name.to_string(),
        interpretation: format!(
            "{} of {} is {}",
            definition.name,
            formatted_value,
            health_status.describe()
        ),
        value,
        formatted_value,
        description: definition.description.to_string(),
        health_status,
        category: definition.category,
    })
}

/// Computes every ratio the metric set supports, collecting implausible
/// margins as warnings.
pub fn analyze_ratios(metrics: &[ExtendedFinancialMetric]) -> RatioAnalysis {
    let inputs = RatioInputs::new(metrics);
    let mut analysis = RatioAnalysis::default();
    for definition in RATIOS {
        match compute(definition, &inputs) {
            Ok(ratio) => analysis.ratios.push(ratio),
            Err(err) if err.is_plausibility_violation() => {
                log::warn!("dropped ratio: {}", err);
                analysis.warnings.push(err);
            }
            Err(_) => {}
        }
    }
    analysis
}

pub fn calculate_ratios(metrics: &[ExtendedFinancialMetric]) -> Vec<FinancialRatio> {
    analyze_ratios(metrics).ratios
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::{MetricSource, MetricUnit};

    fn metric(category: MetricCategory, value: Decimal) -> ExtendedFinancialMetric {
        ExtendedFinancialMetric {
            name: category.to_string(),
            display_value: money::display_for(category, value),
            raw_value: value,
            unit: MetricUnit::Dollars,
            period: None,
            period_type: None,
            category,
            source: MetricSource::TableRow,
            confidence: 0.9,
            context: String::new(),
            yoy_change: None,
        }
    }

    fn find<'a>(ratios: &'a [FinancialRatio], name: &str) -> Option<&'a FinancialRatio> {
        ratios.iter().find(|r| r.name == name)
    }

    #[test]
    fn test_current_ratio_excellent() {
        let ratios = calculate_ratios(&[
            metric(MetricCategory::TotalCurrentAssets, dec!(300)),
            metric(MetricCategory::TotalCurrentLiabilities, dec!(150)),
        ]);
        let current = find(&ratios, "Current Ratio").unwrap();
        assert_eq!(current.value, dec!(2));
        assert_eq!(current.formatted_value, "2.00x");
        assert_eq!(current.health_status, HealthStatus::Excellent);
        assert_eq!(current.category, RatioCategory::Liquidity);
    }

    #[test]
    fn test_implausible_gross_margin_is_dropped() {
        let analysis = analyze_ratios(&[
            metric(MetricCategory::Revenue, dec!(1000)),
            metric(MetricCategory::GrossProfit, dec!(1600)),
            metric(MetricCategory::NetIncome, dec!(100)),
        ]);
        assert!(find(&analysis.ratios, "Gross Margin").is_none());
        assert_eq!(find(&analysis.ratios, "Net Margin").unwrap().value, dec!(10));
        assert!(matches!(
            analysis.warnings.as_slice(),
            [ExtractionError::ImplausibleRatio { name, .. }] if name == "Gross Margin"
        ));
    }

    #[test]
    fn test_ebitda_margin_ceiling_is_higher() {
        let ratios = calculate_ratios(&[
            metric(MetricCategory::Revenue, dec!(1000)),
            metric(MetricCategory::OperatingIncome, dec!(900)),
            metric(MetricCategory::DepreciationAmortization, dec!(300)),
        ]);
        assert!(find(&ratios, "Operating Margin").is_some());
        let ebitda = find(&ratios, "EBITDA Margin").unwrap();
        assert_eq!(ebitda.value, dec!(120));
        assert_eq!(ebitda.formatted_value, "120.00%");
    }

    #[test]
    fn test_non_positive_denominators_skip_ratios() {
        let ratios = calculate_ratios(&[
            metric(MetricCategory::NetIncome, dec!(50)),
            metric(MetricCategory::TotalEquity, dec!(-200)),
            metric(MetricCategory::TotalAssets, Decimal::ZERO),
            metric(MetricCategory::Revenue, Decimal::ZERO),
        ]);
        assert!(ratios.is_empty());
    }

    #[test]
    fn test_roe_bands() {
        let roe = |net: Decimal| {
            let ratios = calculate_ratios(&[
                metric(MetricCategory::NetIncome, net),
                metric(MetricCategory::TotalEquity, dec!(100)),
            ]);
            find(&ratios, "Return on Equity").unwrap().health_status
        };
        assert_eq!(roe(dec!(25)), HealthStatus::Excellent);
        assert_eq!(roe(dec!(20)), HealthStatus::Excellent);
        assert_eq!(roe(dec!(12)), HealthStatus::Good);
        assert_eq!(roe(dec!(7)), HealthStatus::Neutral);
        assert_eq!(roe(dec!(3)), HealthStatus::Caution);
        assert_eq!(roe(dec!(-1)), HealthStatus::Warning);
    }

    #[test]
    fn test_lower_is_better_bands() {
        let ratios = calculate_ratios(&[
            metric(MetricCategory::LongTermDebt, dec!(300)),
            metric(MetricCategory::ShortTermDebt, dec!(50)),
            metric(MetricCategory::CurrentPortionLongTermDebt, dec!(50)),
            metric(MetricCategory::TotalEquity, dec!(100)),
        ]);
        let leverage = find(&ratios, "Debt to Equity").unwrap();
        assert_eq!(leverage.value, dec!(4));
        assert_eq!(leverage.health_status, HealthStatus::Warning);
    }

    #[test]
    fn test_derived_gross_profit() {
        let inputs = RatioInputs::new(&[
            metric(MetricCategory::Revenue, dec!(1000)),
            metric(MetricCategory::CostOfRevenue, dec!(600)),
        ]);
        assert_eq!(inputs.gross_profit(), Some(dec!(400)));
        assert_eq!(inputs.total_debt(), None);

        let ratios = calculate_ratios(&[
            metric(MetricCategory::Revenue, dec!(1000)),
            metric(MetricCategory::CostOfRevenue, dec!(600)),
        ]);
        let gross = find(&ratios, "Gross Margin").unwrap();
        assert_eq!(gross.value, dec!(40));
        assert_eq!(gross.health_status, HealthStatus::Excellent);
        assert_eq!(gross.interpretation, "Gross Margin of 40.00% is excellent");
    }

    #[test]
    fn test_negative_margins_are_kept() {
        let ratios = calculate_ratios(&[
            metric(MetricCategory::Revenue, dec!(100)),
            metric(MetricCategory::NetIncome, dec!(-400)),
        ]);
        let net = find(&ratios, "Net Margin").unwrap();
        assert_eq!(net.value, dec!(-400));
        assert_eq!(net.health_status, HealthStatus::Warning);
    }
}
