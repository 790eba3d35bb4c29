//! Latest values from a company-facts time series.
//!
//! The input is the decoded `companyfacts` document: taxonomy, concept, unit,
//! then a list of reported values. For a fixed set of core concepts the most
//! recent value is picked by period end, then fiscal year.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::money;
use super::types::{ExtendedFinancialMetric, MetricCategory, MetricSource, MetricUnit, PeriodType};

pub const COMPANY_FACTS_CONFIDENCE: f64 = 0.95;
const TAXONOMY: &str = "us-gaap";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFacts {
    #[serde(default)]
    pub cik: Option<u64>,
    #[serde(default)]
    pub entity_name: Option<String>,
    /// Taxonomy to concept to facts.
    #[serde(default)]
    pub facts: HashMap<String, HashMap<String, ConceptFacts>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptFacts {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: HashMap<String, Vec<FactEntry>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactEntry {
    #[serde(deserialize_with = "decimal_from_number")]
    pub val: Decimal,
    pub end: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub fy: Option<i32>,
    #[serde(default)]
    pub fp: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub filed: Option<String>,
}

/// JSON numbers go through their text so no binary float is involved.
fn decimal_from_number<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = match &value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        other => return Err(serde::de::Error::custom(format!("expected a number, got {}", other))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", text, e)))
}

struct CoreConcept {
    category: MetricCategory,
    name: &'static str,
    /// Alternative tags, preferred first.
    tags: &'static [&'static str],
    unit: &'static str,
}

static CORE_CONCEPTS: &[CoreConcept] = &[
    CoreConcept {
        category: MetricCategory::Revenue,
        name: "Revenue",
        tags: &[
            "Revenues",
            "RevenueFromContractWithCustomerExcludingAssessedTax",
            "SalesRevenueNet",
        ],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::NetIncome,
        name: "Net Income",
        tags: &["NetIncomeLoss", "ProfitLoss"],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::TotalAssets,
        name: "Total Assets",
        tags: &["Assets"],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::TotalLiabilities,
        name: "Total Liabilities",
        tags: &["Liabilities"],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::TotalEquity,
        name: "Total Stockholders' Equity",
        tags: &[
            "StockholdersEquity",
            "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
        ],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::CashAndEquivalents,
        name: "Cash and Cash Equivalents",
        tags: &["CashAndCashEquivalentsAtCarryingValue"],
        unit: "USD",
    },
    CoreConcept {
        category: MetricCategory::EpsDiluted,
        name: "Diluted EPS",
        tags: &["EarningsPerShareDiluted"],
        unit: "USD/shares",
    },
    CoreConcept {
        category: MetricCategory::EpsBasic,
        name: "Basic EPS",
        tags: &["EarningsPerShareBasic"],
        unit: "USD/shares",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestFact {
    pub concept: String,
    pub category: MetricCategory,
    pub name: String,
    pub unit: String,
    pub value: Decimal,
    pub period_end: String,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<String>,
    pub form: Option<String>,
}

impl LatestFact {
    pub fn period_type(&self) -> Option<PeriodType> {
        match self.fiscal_period.as_deref()?.trim().to_uppercase().as_str() {
            "FY" => Some(PeriodType::Annual),
            "Q1" | "Q2" | "Q3" | "Q4" => Some(PeriodType::Quarterly),
            _ => None,
        }
    }

    pub fn to_metric(&self) -> ExtendedFinancialMetric {
        let unit = if self.category.is_per_share() {
            MetricUnit::PerShare
        } else {
            MetricUnit::Dollars
        };
        ExtendedFinancialMetric {
            name: self.name.clone(),
            display_value: money::display_for(self.category, self.value),
            raw_value: self.value,
            unit,
            period: Some(self.period_end.clone()),
            period_type: self.period_type(),
            category: self.category,
            source: MetricSource::CompanyFacts,
            confidence: COMPANY_FACTS_CONFIDENCE,
            context: match &self.form {
                Some(form) => format!("{}:{} ({})", TAXONOMY, self.concept, form),
                None => format!("{}:{}", TAXONOMY, self.concept),
            },
            yoy_change: None,
        }
    }
}

pub fn parse_company_facts(json: &str) -> Result<CompanyFacts, serde_json::Error> {
    serde_json::from_str(json)
}

/// Latest entry by period end, then fiscal year. Unparseable end dates sort
/// before every real date.
fn latest(entries: &[FactEntry]) -> Option<&FactEntry> {
    entries.iter().max_by(|a, b| {
        let key = |e: &FactEntry| (NaiveDate::parse_from_str(e.end.trim(), "%Y-%m-%d").ok(), e.fy);
        key(a).cmp(&key(b)).then_with(|| a.end.cmp(&b.end))
    })
}

/// Picks the latest fact for each core concept, using the first tag of the
/// concept that has any values in the expected unit.
pub fn latest_facts(facts: &CompanyFacts) -> Vec<LatestFact> {
    let Some(taxonomy) = facts.facts.get(TAXONOMY) else {
        log::debug!("company facts without {} taxonomy", TAXONOMY);
        return Vec::new();
    };

    CORE_CONCEPTS
        .iter()
        .filter_map(|core| {
            core.tags.iter().find_map(|tag| {
                let entries = taxonomy.get(*tag)?.units.get(core.unit)?;
                let entry = latest(entries)?;
                Some(LatestFact {
                    concept: tag.to_string(),
                    category: core.category,
                    name: core.name.to_string(),
                    unit: core.unit.to_string(),
                    value: entry.val,
                    period_end: entry.end.trim().to_string(),
                    fiscal_year: entry.fy,
                    fiscal_period: entry.fp.clone(),
                    form: entry.form.clone(),
                })
            })
        })
        .collect()
}

/// Latest core facts as reconcilable metrics. Values beyond the plausibility
/// ceilings are dropped.
pub fn company_facts_metrics(facts: &CompanyFacts) -> Vec<ExtendedFinancialMetric> {
    latest_facts(facts)
        .iter()
        .map(LatestFact::to_metric)
        .filter(|metric| match money::check_plausible(metric.raw_value, metric.unit) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{}: {}", metric.name, err);
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const FACTS: &str = r#"{
        "cik": 320193,
        "entityName": "Example Corp",
        "facts": {
            "dei": {
                "EntityCommonStockSharesOutstanding": {
                    "units": {"shares": [{"val": 15000000000, "end": "2023-10-20", "fy": 2023, "fp": "FY", "form": "10-K"}]}
                }
            },
            "us-gaap": {
                "Revenues": {
                    "label": "Revenues",
                    "units": {"USD": [
                        {"val": 383285000000, "start": "2022-09-25", "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K"},
                        {"val": 89498000000, "start": "2023-07-02", "end": "2023-09-30", "fy": 2023, "fp": "Q4", "form": "10-K"},
                        {"val": 394328000000, "start": "2021-09-26", "end": "2022-09-24", "fy": 2022, "fp": "FY", "form": "10-K"}
                    ]}
                },
                "NetIncomeLoss": {
                    "units": {"USD": [
                        {"val": 22956000000, "end": "2023-07-01", "fy": 2023, "fp": "Q3", "form": "10-Q"},
                        {"val": 96995000000, "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K"}
                    ]}
                },
                "EarningsPerShareDiluted": {
                    "units": {"USD/shares": [{"val": 6.13, "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K"}]}
                },
                "Assets": {
                    "units": {"USD": [{"val": "352583000000", "end": "2023-09-30", "fy": 2023, "fp": "FY"}]}
                }
            }
        }
    }"#;

    #[test]
    fn test_picks_latest_per_concept() {
        let facts = parse_company_facts(FACTS).unwrap();
        assert_eq!(facts.entity_name.as_deref(), Some("Example Corp"));

        let latest = latest_facts(&facts);
        let categories: Vec<_> = latest.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                MetricCategory::Revenue,
                MetricCategory::NetIncome,
                MetricCategory::TotalAssets,
                MetricCategory::EpsDiluted
            ]
        );

        let net = &latest[1];
        assert_eq!(net.value, dec!(96995000000));
        assert_eq!(net.period_type(), Some(PeriodType::Annual));

        let eps = &latest[3];
        assert_eq!(eps.value, dec!(6.13));
        assert_eq!(eps.unit, "USD/shares");
    }

    #[test]
    fn test_same_end_date_uses_order() {
        let entries = vec![
            FactEntry {
                val: dec!(1),
                end: "2023-09-30".to_string(),
                start: None,
                fy: Some(2023),
                fp: None,
                form: None,
                filed: None,
            },
            FactEntry {
                val: dec!(2),
                end: "2023-09-30".to_string(),
                start: None,
                fy: Some(2024),
                fp: None,
                form: None,
                filed: None,
            },
            FactEntry {
                val: dec!(3),
                end: "not a date".to_string(),
                start: None,
                fy: Some(2030),
                fp: None,
                form: None,
                filed: None,
            },
        ];
        assert_eq!(latest(&entries).map(|e| e.val), Some(dec!(2)));
    }

    #[test]
    fn test_metrics_carry_source_and_confidence() {
        let facts = parse_company_facts(FACTS).unwrap();
        let metrics = company_facts_metrics(&facts);
        assert_eq!(metrics.len(), 4);
        for metric in &metrics {
            assert_eq!(metric.source, MetricSource::CompanyFacts);
            assert_eq!(metric.confidence, COMPANY_FACTS_CONFIDENCE);
        }
        let eps = metrics.iter().find(|m| m.category == MetricCategory::EpsDiluted).unwrap();
        assert_eq!(eps.unit, MetricUnit::PerShare);
        assert_eq!(eps.display_value, "$6.13");
        assert_eq!(metrics[0].context, "us-gaap:Revenues (10-K)");
    }

    #[test]
    fn test_basic_eps_is_not_reported_as_diluted() {
        let json = r#"{"facts": {"us-gaap": {
            "EarningsPerShareBasic": {"units": {"USD/shares": [{"val": 1.5, "end": "2023-12-31", "fy": 2023, "fp": "FY"}]}}
        }}}"#;
        let metrics = company_facts_metrics(&parse_company_facts(json).unwrap());
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].category, MetricCategory::EpsBasic);
        assert_eq!(metrics[0].name, "Basic EPS");
        assert_eq!(metrics[0].raw_value, dec!(1.5));
        assert!(metrics.iter().all(|m| m.category != MetricCategory::EpsDiluted));
    }

    #[test]
    fn test_missing_taxonomy() {
        let facts = parse_company_facts(r#"{"facts": {}}"#).unwrap();
        assert!(latest_facts(&facts).is_empty());
        assert!(parse_company_facts(r#"{"facts": {"us-gaap": {"Assets": {"units": {"USD": [{"val": true, "end": "2023-01-01"}]}}}}}"#).is_err());
    }
}
