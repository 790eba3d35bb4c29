use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use super::types::{ExtendedFinancialMetric, MetricCategory};

/// Keeps one metric per category: the most confident candidate, the earliest
/// one on ties. Output follows the category declaration order.
pub fn reconcile<I>(candidates: I) -> Vec<ExtendedFinancialMetric>
where
    I: IntoIterator<Item = ExtendedFinancialMetric>,
{
    let mut best: BTreeMap<MetricCategory, ExtendedFinancialMetric> = BTreeMap::new();
    for candidate in candidates {
        match best.entry(candidate.category) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if candidate.confidence > slot.get().confidence {
                    log::debug!(
                        "{}: {} ({:.3}) replaces {} ({:.3})",
                        candidate.category,
                        candidate.source,
                        candidate.confidence,
                        slot.get().source,
                        slot.get().confidence
                    );
                    slot.insert(candidate);
                }
            }
        }
    }
    best.into_values().collect()
}

/// Highest confidence among the candidates of each category.
pub fn best_confidence<'a, I>(metrics: I) -> HashMap<MetricCategory, f64>
where
    I: IntoIterator<Item = &'a ExtendedFinancialMetric>,
{
    let mut best = HashMap::new();
    for metric in metrics {
        let confidence = best.entry(metric.category).or_insert(metric.confidence);
        if metric.confidence > *confidence {
            *confidence = metric.confidence;
        }
    }
    best
}

/// Looks up the value of a category in a reconciled metric set.
pub fn value_of(metrics: &[ExtendedFinancialMetric], category: MetricCategory) -> Option<Decimal> {
    metrics
        .iter()
        .find(|m| m.category == category)
        .map(|m| m.raw_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::{MetricSource, MetricUnit};
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn candidate(category: MetricCategory, value: Decimal, confidence: f64, source: MetricSource) -> ExtendedFinancialMetric {
        ExtendedFinancialMetric {
            name: category.to_string(),
            display_value: value.to_string(),
            raw_value: value,
            unit: MetricUnit::Dollars,
            period: None,
            period_type: None,
            category,
            source,
            confidence,
            context: String::new(),
            yoy_change: None,
        }
    }

    #[test]
    fn test_keeps_most_confident_per_category() {
        let candidates = vec![
            candidate(MetricCategory::NetIncome, dec!(100), 0.9, MetricSource::TextPattern),
            candidate(MetricCategory::Revenue, dec!(1000), 0.6, MetricSource::TextPattern),
            candidate(MetricCategory::NetIncome, dec!(120), 0.97, MetricSource::InlineXbrl),
            candidate(MetricCategory::Revenue, dec!(1100), 0.85, MetricSource::TableRow),
            candidate(MetricCategory::TotalAssets, dec!(5000), 0.8, MetricSource::TableRow),
        ];
        let reconciled = reconcile(candidates.clone());

        let categories: Vec<_> = reconciled.iter().map(|m| m.category).collect();
        assert_eq!(
            categories,
            vec![MetricCategory::Revenue, MetricCategory::NetIncome, MetricCategory::TotalAssets]
        );
        assert_eq!(value_of(&reconciled, MetricCategory::NetIncome), Some(dec!(120)));
        assert_eq!(value_of(&reconciled, MetricCategory::Revenue), Some(dec!(1100)));

        let best = best_confidence(&candidates);
        for metric in &reconciled {
            assert_eq!(metric.confidence, best[&metric.category]);
        }
    }

    #[test]
    fn test_ties_keep_first_candidate() {
        let reconciled = reconcile(vec![
            candidate(MetricCategory::Revenue, dec!(1), 0.97, MetricSource::InlineXbrl),
            candidate(MetricCategory::Revenue, dec!(2), 0.97, MetricSource::InlineXbrl),
        ]);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].raw_value, dec!(1));
    }

    #[test]
    fn test_at_most_one_per_category() {
        let candidates: Vec<_> = (0..40)
            .map(|i| {
                let category = if i % 3 == 0 {
                    MetricCategory::Revenue
                } else if i % 3 == 1 {
                    MetricCategory::EpsBasic
                } else {
                    MetricCategory::CashAndEquivalents
                };
                candidate(category, Decimal::from(i), (i % 7) as f64 / 10.0, MetricSource::TextPattern)
            })
            .collect();
        let reconciled = reconcile(candidates);
        let unique: HashSet<_> = reconciled.iter().map(|m| m.category).collect();
        assert_eq!(unique.len(), reconciled.len());
        assert_eq!(reconciled.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(reconcile(Vec::new()).is_empty());
    }
}
