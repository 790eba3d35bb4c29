//! Inline XBRL fact extraction.
//!
//! Facts are located with a namespace-aware tree query first. Markup that is
//! not well-formed XML (undeclared prefixes, HTML-only constructs) falls back
//! to CSS selectors over the HTML tree, where tag and attribute names arrive
//! lowercased with their prefix attached.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::NaiveDate;
use html_escape::decode_html_entities;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node, ParsingOptions};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use unicode_normalization::UnicodeNormalization;

use crate::metrics::error::ExtractionError;
use crate::metrics::money::{self, MonetaryValue, DEFAULT_CURRENCY};
use crate::metrics::types::{
    ExtendedFinancialMetric, MetricCategory, MetricSource, MetricUnit, PeriodType,
};

/// Confidence of every machine-tagged fact.
pub const STRUCTURED_CONFIDENCE: f64 = 0.97;
/// Fractional digits kept after applying the scale attribute.
pub const MAX_FACT_DP: u32 = 6;
const MAX_SCALE_EXPONENT: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    #[strum(serialize = "tree-query")]
    TreeQuery,
    #[strum(serialize = "selector")]
    Selector,
}

struct ConceptMapping {
    category: MetricCategory,
    name: &'static str,
}

/// Well-known taxonomy concepts by lowercased local name.
static CONCEPTS: Lazy<HashMap<&'static str, ConceptMapping>> = Lazy::new(|| {
    use MetricCategory::*;
    [
        ("revenues", Revenue, "Revenue"),
        ("revenuefromcontractwithcustomerexcludingassessedtax", Revenue, "Revenue"),
        ("salesrevenuenet", Revenue, "Revenue"),
        ("netincomeloss", NetIncome, "Net Income"),
        ("profitloss", NetIncome, "Net Income"),
        ("grossprofit", GrossProfit, "Gross Profit"),
        ("operatingincomeloss", OperatingIncome, "Operating Income"),
        ("assets", TotalAssets, "Total Assets"),
        ("assetscurrent", TotalCurrentAssets, "Total Current Assets"),
        ("liabilities", TotalLiabilities, "Total Liabilities"),
        ("liabilitiescurrent", TotalCurrentLiabilities, "Total Current Liabilities"),
        ("stockholdersequity", TotalEquity, "Total Stockholders' Equity"),
        (
            "stockholdersequityincludingportionattributabletononcontrollinginterest",
            TotalEquity,
            "Total Equity",
        ),
        ("cashandcashequivalentsatcarryingvalue", CashAndEquivalents, "Cash and Cash Equivalents"),
        (
            "netcashprovidedbyusedinoperatingactivities",
            OperatingCashFlow,
            "Net Cash from Operating Activities",
        ),
        ("earningspersharebasic", EpsBasic, "Basic EPS"),
        ("earningspersharediluted", EpsDiluted, "Diluted EPS"),
    ]
    .into_iter()
    .map(|(local, category, name)| (local, ConceptMapping { category, name }))
    .collect()
});

static FACT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)contextref").expect("fact marker pattern"));
static NAMED_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&[a-zA-Z][a-zA-Z0-9]*;").expect("named entity pattern"));

static FACT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r"ix\:nonfraction, [contextref]").expect("fact selector"));
static CONTEXT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r"xbrli\:context, context").expect("context selector"));
static UNIT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r"xbrli\:unit, unit").expect("unit selector"));

/// Reporting period a fact's contextRef resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XbrlContext {
    pub id: String,
    pub instant: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Context carries a segment, so its facts describe a slice of the entity.
    pub has_dimensions: bool,
}

impl XbrlContext {
    pub fn has_dates(&self) -> bool {
        self.instant.is_some() || self.start_date.is_some() || self.end_date.is_some()
    }

    pub fn period_end(&self) -> Option<NaiveDate> {
        self.end_date.or(self.instant)
    }

    /// Classifies a duration context by its length in days. Instants have no type.
    pub fn period_type(&self) -> Option<PeriodType> {
        let (start, end) = (self.start_date?, self.end_date?);
        match (end - start).num_days() {
            80..=100 => Some(PeriodType::Quarterly),
            170..=280 => Some(PeriodType::Ytd),
            350..=380 => Some(PeriodType::Annual),
            _ => None,
        }
    }

    fn merge(self, other: XbrlContext) -> XbrlContext {
        let has_dimensions = self.has_dimensions || other.has_dimensions;
        let mut kept = if !self.has_dates() && other.has_dates() {
            other
        } else {
            self
        };
        kept.has_dimensions = has_dimensions;
        kept
    }
}

pub type ContextMap = HashMap<String, XbrlContext>;

/// Context ids are matched trimmed and case-folded.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Merges two context maps by id, keeping for each id the entry that has a
/// populated date field (the `primary` one when both or neither do).
pub fn merge_contexts(primary: ContextMap, secondary: ContextMap) -> ContextMap {
    let mut merged = primary;
    for (id, context) in secondary {
        let combined = match merged.remove(&id) {
            Some(existing) => existing.merge(context),
            None => context,
        };
        merged.insert(id, combined);
    }
    merged
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XbrlFact {
    pub concept: String,
    pub value: MonetaryValue,
    pub unit_ref: Option<String>,
    pub context_ref: Option<String>,
    pub decimals: Option<String>,
    pub scale: Option<i32>,
    pub source: Strategy,
}

impl XbrlFact {
    /// Local part of the concept, `NetIncomeLoss` for `us-gaap:NetIncomeLoss`.
    pub fn local_name(&self) -> &str {
        local_name(&self.concept)
    }

    pub fn category(&self) -> Option<MetricCategory> {
        concept_mapping(&self.concept).map(|m| m.category)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct StructuredExtraction {
    pub metrics: Vec<ExtendedFinancialMetric>,
    /// Strategy that produced the facts, `None` when neither found any.
    pub strategy: Option<Strategy>,
    pub warnings: Vec<ExtractionError>,
}

#[derive(Debug, Default)]
struct RawFact {
    concept: String,
    text: String,
    context_ref: Option<String>,
    unit_ref: Option<String>,
    decimals: Option<String>,
    scale: Option<String>,
    sign: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default)]
struct ParsedDocument {
    facts: Vec<RawFact>,
    contexts: ContextMap,
    /// Unit id to its measures, `iso4217:USD/xbrli:shares` for a ratio unit.
    units: HashMap<String, String>,
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn concept_mapping(concept: &str) -> Option<&'static ConceptMapping> {
    CONCEPTS.get(local_name(concept.trim()).to_lowercase().as_str())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text.get(..10).unwrap_or(text), "%Y-%m-%d").ok()
}

/// XML only knows five named entities; everything else becomes a numeric reference.
fn prepare_xml(document: &str) -> String {
    NAMED_ENTITY_RE
        .replace_all(document, |caps: &regex::Captures<'_>| {
            let entity = &caps[0];
            match entity {
                "&amp;" | "&lt;" | "&gt;" | "&quot;" | "&apos;" => entity.to_string(),
                _ => decode_html_entities(entity)
                    .chars()
                    .map(|c| format!("&#{};", c as u32))
                    .collect(),
            }
        })
        .into_owned()
}

fn tree_context(node: Node<'_, '_>) -> Option<XbrlContext> {
    let mut context = XbrlContext {
        id: node.attribute("id")?.trim().to_string(),
        ..Default::default()
    };
    for child in node.descendants().filter(|n| n.is_element()) {
        let text = child.text().unwrap_or_default();
        match child.tag_name().name() {
            "instant" => context.instant = parse_date(text),
            "startDate" => context.start_date = parse_date(text),
            "endDate" => context.end_date = parse_date(text),
            "segment" | "scenario" | "explicitMember" | "typedMember" => {
                context.has_dimensions = true
            }
            _ => {}
        }
    }
    Some(context)
}

fn tree_fact(node: Node<'_, '_>) -> RawFact {
    let concept = node.attribute("name").map(str::to_string).unwrap_or_else(|| {
        let tag = node.tag_name();
        match tag.namespace().and_then(|ns| node.lookup_prefix(ns)) {
            Some(prefix) => format!("{}:{}", prefix, tag.name()),
            None => tag.name().to_string(),
        }
    });
    RawFact {
        concept,
        text: node
            .descendants()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect(),
        context_ref: node.attribute("contextRef").map(str::to_string),
        unit_ref: node.attribute("unitRef").map(str::to_string),
        decimals: node.attribute("decimals").map(str::to_string),
        scale: node.attribute("scale").map(str::to_string),
        sign: node.attribute("sign").map(str::to_string),
        format: node.attribute("format").map(str::to_string),
    }
}

fn tree_query(document: &str) -> Result<ParsedDocument, ExtractionError> {
    let prepared = prepare_xml(document);
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;
    let tree = Document::parse_with_options(&prepared, options).map_err(|e| {
        ExtractionError::StrategyFailed {
            strategy: Strategy::TreeQuery.into(),
            reason: e.to_string(),
        }
    })?;

    let mut parsed = ParsedDocument::default();
    for node in tree.descendants().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "context" => {
                if let Some(context) = tree_context(node) {
                    parsed.contexts.insert(normalize_id(&context.id), context);
                }
            }
            "unit" => {
                if let Some(id) = node.attribute("id") {
                    let measures = node
                        .descendants()
                        .filter(|n| n.tag_name().name() == "measure")
                        .filter_map(|n| n.text())
                        .map(str::trim)
                        .join("/");
                    parsed.units.insert(normalize_id(id), measures);
                }
            }
            "nonNumeric" | "continuation" | "footnote" => {}
            local => {
                if local == "nonFraction" || node.attribute("contextRef").is_some() {
                    parsed.facts.push(tree_fact(node));
                }
            }
        }
    }
    Ok(parsed)
}

fn selector_context(element: ElementRef<'_>) -> Option<XbrlContext> {
    let mut context = XbrlContext {
        id: element.value().attr("id")?.trim().to_string(),
        ..Default::default()
    };
    for child in element.descendants().filter_map(ElementRef::wrap) {
        let text = child.text().collect::<String>();
        match local_name(child.value().name()) {
            "instant" => context.instant = parse_date(&text),
            "startdate" => context.start_date = parse_date(&text),
            "enddate" => context.end_date = parse_date(&text),
            "segment" | "scenario" | "explicitmember" | "typedmember" => {
                context.has_dimensions = true
            }
            _ => {}
        }
    }
    Some(context)
}

fn selector_query(document: &str) -> ParsedDocument {
    let html = Html::parse_document(document);
    let mut parsed = ParsedDocument::default();

    for element in html.select(&CONTEXT_SELECTOR) {
        if let Some(context) = selector_context(element) {
            parsed.contexts.insert(normalize_id(&context.id), context);
        }
    }

    for element in html.select(&UNIT_SELECTOR) {
        if let Some(id) = element.value().attr("id") {
            let measures = element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| local_name(e.value().name()) == "measure")
                .map(|e| e.text().collect::<String>().trim().to_string())
                .join("/");
            parsed.units.insert(normalize_id(id), measures);
        }
    }

    for element in html.select(&FACT_SELECTOR) {
        let tag = element.value().name();
        if matches!(local_name(tag), "nonnumeric" | "continuation" | "footnote") {
            continue;
        }
        let attr = |name: &str| element.value().attr(name).map(str::to_string);
        parsed.facts.push(RawFact {
            concept: attr("name").unwrap_or_else(|| tag.to_string()),
            text: element.text().collect(),
            context_ref: attr("contextref"),
            unit_ref: attr("unitref"),
            decimals: attr("decimals"),
            scale: attr("scale"),
            sign: attr("sign"),
            format: attr("format"),
        });
    }
    parsed
}

fn is_dash(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| matches!(c, '-' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}'))
}

fn apply_scale(value: Decimal, scale: Option<i32>) -> Result<Decimal, ExtractionError> {
    let Some(exponent) = scale.filter(|e| *e != 0) else {
        return Ok(value);
    };
    if exponent.unsigned_abs() > MAX_SCALE_EXPONENT {
        return Err(ExtractionError::Unparseable(format!("scale {}", exponent)));
    }
    let factor = Decimal::from(10i64.pow(exponent.unsigned_abs()));
    let scaled = if exponent > 0 {
        value.checked_mul(factor)
    } else {
        value.checked_div(factor)
    };
    scaled.ok_or(ExtractionError::ImplausibleAmount {
        amount: value,
        ceiling: money::MAX_PLAUSIBLE_AMOUNT,
    })
}

fn parse_scale(raw: &RawFact) -> Result<Option<i32>, ExtractionError> {
    match raw.scale.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(scale) => i32::from_str(scale)
            .map(Some)
            .map_err(|_| ExtractionError::Unparseable(format!("scale {:?}", scale))),
        None => Ok(None),
    }
}

/// Numeric value of a fact: symbols stripped, sign from parentheses or the
/// `sign` attribute, multiplied by `10^scale`, rounded to [`MAX_FACT_DP`].
fn parse_fact_value(raw: &RawFact, scale: Option<i32>, currency: &str) -> Result<Decimal, ExtractionError> {
    let text: String = raw.text.nfkc().collect();
    let text = text.trim();
    let format = raw.format.as_deref().unwrap_or_default().to_lowercase();

    let dash_is_zero =
        format.contains("zerodash") || format.contains("fixed-zero") || format.contains("numdash");
    let value = if format.contains("fixed-zero") || (dash_is_zero && is_dash(text)) {
        Decimal::ZERO
    } else if format.contains("comma-decimal") || format.contains("numcommadecimal") {
        let swapped = text.replace(['.', ' '], "").replace(',', ".");
        money::parse_amount(&swapped, MetricUnit::Dollars, currency)?.amount
    } else {
        money::parse_amount(text, MetricUnit::Dollars, currency)?.amount
    };

    let value = if raw.sign.as_deref().map(str::trim) == Some("-") {
        -value.abs()
    } else {
        value
    };
    Ok(money::round_half_up(apply_scale(value, scale)?, MAX_FACT_DP))
}

/// EPS concepts are per share; everything else follows the unit's measures.
fn infer_unit(category: MetricCategory, measures: Option<&str>) -> MetricUnit {
    if category.is_per_share() {
        return MetricUnit::PerShare;
    }
    let Some(measures) = measures.map(str::to_lowercase) else {
        return MetricUnit::None;
    };
    let is_money = measures.contains("usd") || measures.contains("iso4217");
    let is_shares = measures.contains("share");
    match (is_money, is_shares) {
        (true, true) => MetricUnit::PerShare,
        (true, false) => MetricUnit::Dollars,
        (false, true) => MetricUnit::Shares,
        (false, false) => MetricUnit::None,
    }
}

fn build_fact(
    raw: &RawFact,
    unit: MetricUnit,
    currency: &str,
    source: Strategy,
) -> Result<XbrlFact, ExtractionError> {
    let scale = parse_scale(raw)?;
    let amount = parse_fact_value(raw, scale, currency)?;
    money::check_plausible(amount, unit)?;
    Ok(XbrlFact {
        concept: raw.concept.trim().to_string(),
        value: MonetaryValue::new(amount, currency),
        unit_ref: raw.unit_ref.clone(),
        context_ref: raw.context_ref.clone(),
        decimals: raw.decimals.clone(),
        scale,
        source,
    })
}

fn run_strategies(document: &str, warnings: &mut Vec<ExtractionError>) -> Option<(ParsedDocument, Strategy)> {
    let tree = match tree_query(document) {
        Ok(parsed) if !parsed.facts.is_empty() => return Some((parsed, Strategy::TreeQuery)),
        Ok(parsed) => {
            warnings.push(ExtractionError::StrategyFailed {
                strategy: Strategy::TreeQuery.into(),
                reason: "no facts found".to_string(),
            });
            parsed
        }
        Err(err) => {
            log::warn!("{}, falling back to selectors", err);
            warnings.push(err);
            ParsedDocument::default()
        }
    };

    let mut selected = selector_query(document);
    if selected.facts.is_empty() {
        warnings.push(ExtractionError::StrategyFailed {
            strategy: Strategy::Selector.into(),
            reason: "no facts found".to_string(),
        });
        return None;
    }
    selected.contexts = merge_contexts(selected.contexts, tree.contexts);
    for (id, measures) in tree.units {
        selected.units.entry(id).or_insert(measures);
    }
    Some((selected, Strategy::Selector))
}

/// Extracts the mapped facts of an inline XBRL document.
///
/// Documents without any `contextRef` are not inspected at all. Facts of
/// dimension-free contexts come first, then by period end, latest first, so
/// the first fact of a category is the consolidated current value.
pub fn extract_structured(document: &str, currency: &str) -> StructuredExtraction {
    let mut extraction = StructuredExtraction::default();
    if !FACT_MARKER_RE.is_match(document) {
        return extraction;
    }

    let Some((parsed, strategy)) = run_strategies(document, &mut extraction.warnings) else {
        return extraction;
    };
    extraction.strategy = Some(strategy);
    log::debug!(
        "{} strategy found {} facts, {} contexts",
        strategy,
        parsed.facts.len(),
        parsed.contexts.len()
    );

    let mut seen = HashSet::new();
    let mut ranked: Vec<((bool, Reverse<Option<NaiveDate>>), ExtendedFinancialMetric)> = Vec::new();
    for raw in &parsed.facts {
        let Some(mapping) = concept_mapping(&raw.concept) else {
            continue;
        };
        let measures = raw.unit_ref.as_deref().map(|unit_ref| {
            parsed
                .units
                .get(&normalize_id(unit_ref))
                .map(String::as_str)
                .unwrap_or(unit_ref)
        });
        let unit = infer_unit(mapping.category, measures);

        let fact = match build_fact(raw, unit, currency, strategy) {
            Ok(fact) => fact,
            Err(err) if err.is_plausibility_violation() => {
                log::warn!("{}: {}", raw.concept, err);
                extraction.warnings.push(err);
                continue;
            }
            Err(err) => {
                log::debug!("{}: skipped: {}", raw.concept, err);
                continue;
            }
        };

        let context_id = fact.context_ref.as_deref().map(normalize_id);
        if !seen.insert((mapping.category, context_id.clone(), fact.value.amount)) {
            continue;
        }
        let context = context_id.as_ref().and_then(|id| parsed.contexts.get(id));
        let period_end = context.and_then(XbrlContext::period_end);
        let dimensional = context.is_some_and(|c| c.has_dimensions);

        ranked.push((
            (dimensional, Reverse(period_end)),
            ExtendedFinancialMetric {
                name: mapping.name.to_string(),
                display_value: money::display_for(mapping.category, fact.value.amount),
                raw_value: fact.value.amount,
                unit,
                period: period_end.map(|d| d.format("%Y-%m-%d").to_string()),
                period_type: context.and_then(XbrlContext::period_type),
                category: mapping.category,
                source: MetricSource::InlineXbrl,
                confidence: STRUCTURED_CONFIDENCE,
                context: match &fact.context_ref {
                    Some(context_ref) => format!("{} [{}]", fact.concept, context_ref),
                    None => fact.concept.clone(),
                },
                yoy_change: None,
            },
        ));
    }

    ranked.sort_by_key(|(rank, _)| *rank);
    extraction.metrics = ranked.into_iter().map(|(_, metric)| metric).collect();
    extraction
}

/// [`extract_structured`] in the default currency, metrics only.
pub fn extract_facts(document: &str) -> Vec<ExtendedFinancialMetric> {
    extract_structured(document, DEFAULT_CURRENCY).metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edgar::parsing::tests::read_test_file;
    use rust_decimal_macros::dec;

    const NAMESPACES: &str = r#"xmlns="http://www.w3.org/1999/xhtml" xmlns:ix="http://www.xbrl.org/2013/inlineXBRL" xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:xbrldi="http://xbrl.org/2006/xbrldi" xmlns:iso4217="http://www.xbrl.org/2003/iso4217" xmlns:us-gaap="http://fasb.org/us-gaap/2023""#;

    fn header() -> &'static str {
        r#"<div style="display:none"><ix:header><ix:resources>
<xbrli:context id="C1"><xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000000001</xbrli:identifier></xbrli:entity>
<xbrli:period><xbrli:startDate>2023-07-01</xbrli:startDate><xbrli:endDate>2023-09-30</xbrli:endDate></xbrli:period></xbrli:context>
<xbrli:context id="C2"><xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000000001</xbrli:identifier>
<xbrli:segment><xbrldi:explicitMember dimension="us-gaap:StatementBusinessSegmentsAxis">us-gaap:CorporateMember</xbrldi:explicitMember></xbrli:segment></xbrli:entity>
<xbrli:period><xbrli:startDate>2023-07-01</xbrli:startDate><xbrli:endDate>2023-09-30</xbrli:endDate></xbrli:period></xbrli:context>
<xbrli:context id="I1"><xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000000001</xbrli:identifier></xbrli:entity>
<xbrli:period><xbrli:instant>2023-09-30</xbrli:instant></xbrli:period></xbrli:context>
<xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
</ix:resources></ix:header></div>"#
    }

    fn document(declare_namespaces: bool, body: &str) -> String {
        let attrs = if declare_namespaces { NAMESPACES } else { "" };
        format!("<html {}><body>{}{}</body></html>", attrs, header(), body)
    }

    const NET_INCOME: &str = r#"<p>Net income&nbsp;<ix:nonFraction name="us-gaap:NetIncomeLoss" contextRef="c1" unitRef="usd" scale="3" decimals="-3">1,200</ix:nonFraction></p>"#;

    #[test]
    fn test_tree_query_scaled_fact() {
        let extraction = extract_structured(&document(true, NET_INCOME), "USD");
        assert_eq!(extraction.strategy, Some(Strategy::TreeQuery));
        assert!(extraction.warnings.is_empty());
        assert_eq!(extraction.metrics.len(), 1);

        let metric = &extraction.metrics[0];
        assert_eq!(metric.category, MetricCategory::NetIncome);
        assert_eq!(metric.raw_value, dec!(1200000));
        assert_eq!(metric.confidence, STRUCTURED_CONFIDENCE);
        assert_eq!(metric.unit, MetricUnit::Dollars);
        assert_eq!(metric.period.as_deref(), Some("2023-09-30"));
        assert_eq!(metric.period_type, Some(PeriodType::Quarterly));
        assert_eq!(metric.source, MetricSource::InlineXbrl);
    }

    #[test]
    fn test_selector_fallback_on_undeclared_prefixes() {
        let extraction = extract_structured(&document(false, NET_INCOME), "USD");
        assert_eq!(extraction.strategy, Some(Strategy::Selector));
        assert_eq!(extraction.metrics.len(), 1);
        assert_eq!(extraction.metrics[0].raw_value, dec!(1200000));
        assert_eq!(extraction.metrics[0].period_type, Some(PeriodType::Quarterly));
        assert!(matches!(
            extraction.warnings.as_slice(),
            [ExtractionError::StrategyFailed { strategy: "tree-query", .. }]
        ));
    }

    #[test]
    fn test_sign_parentheses_and_dash_zero() {
        let body = r#"
<ix:nonFraction name="us-gaap:OperatingIncomeLoss" contextRef="C1" unitRef="usd" scale="6" sign="-">12.5</ix:nonFraction>
<ix:nonFraction name="us-gaap:GrossProfit" contextRef="C1" unitRef="usd">(2,500)</ix:nonFraction>
<ix:nonFraction name="us-gaap:ProfitLoss" contextRef="C1" unitRef="usd" format="ixt:fixed-zero">&#8212;</ix:nonFraction>"#;
        for declare in [true, false] {
            let metrics = extract_structured(&document(declare, body), "USD").metrics;
            let value = |c: MetricCategory| metrics.iter().find(|m| m.category == c).map(|m| m.raw_value);
            assert_eq!(value(MetricCategory::OperatingIncome), Some(dec!(-12500000)));
            assert_eq!(value(MetricCategory::GrossProfit), Some(dec!(-2500)));
            assert_eq!(value(MetricCategory::NetIncome), Some(Decimal::ZERO));
        }
    }

    #[test]
    fn test_unmapped_and_non_numeric_facts_are_dropped() {
        let body = r#"
<ix:nonFraction name="us-gaap:AccretionExpense" contextRef="C1" unitRef="usd">4,000</ix:nonFraction>
<ix:nonNumeric name="us-gaap:Revenues" contextRef="C1">See note 3</ix:nonNumeric>"#;
        let extraction = extract_structured(&document(true, body), "USD");
        assert_eq!(extraction.strategy, Some(Strategy::TreeQuery));
        assert!(extraction.metrics.is_empty());
    }

    #[test]
    fn test_consolidated_facts_rank_before_dimensional() {
        let body = r#"
<ix:nonFraction name="us-gaap:Revenues" contextRef="C2" unitRef="usd">700</ix:nonFraction>
<ix:nonFraction name="us-gaap:Revenues" contextRef="C1" unitRef="usd">9,000</ix:nonFraction>
<ix:nonFraction name="us-gaap:Assets" contextRef="I1" unitRef="usd">50,000</ix:nonFraction>"#;
        let metrics = extract_structured(&document(true, body), "USD").metrics;
        let revenue: Vec<_> = metrics
            .iter()
            .filter(|m| m.category == MetricCategory::Revenue)
            .map(|m| m.raw_value)
            .collect();
        assert_eq!(revenue, vec![dec!(9000), dec!(700)]);

        let assets = metrics.iter().find(|m| m.category == MetricCategory::TotalAssets).unwrap();
        assert_eq!(assets.period_type, None);
        assert_eq!(assets.period.as_deref(), Some("2023-09-30"));
    }

    #[test]
    fn test_eps_is_per_share() {
        let body = r#"<ix:nonFraction name="us-gaap:EarningsPerShareDiluted" contextRef="C1" unitRef="usdPerShare" decimals="2">2.35</ix:nonFraction>"#;
        let metrics = extract_structured(&document(true, body), "USD").metrics;
        assert_eq!(metrics[0].category, MetricCategory::EpsDiluted);
        assert_eq!(metrics[0].unit, MetricUnit::PerShare);
        assert_eq!(metrics[0].raw_value, dec!(2.35));
    }

    #[test]
    fn test_strategy_names() {
        for (strategy, name) in [(Strategy::TreeQuery, "tree-query"), (Strategy::Selector, "selector")] {
            let label: &'static str = strategy.into();
            assert_eq!(label, name);
            assert_eq!(strategy.to_string(), name);
        }
    }

    #[test]
    fn test_infer_unit() {
        let revenue = MetricCategory::Revenue;
        assert_eq!(infer_unit(revenue, Some("iso4217:USD")), MetricUnit::Dollars);
        assert_eq!(infer_unit(revenue, Some("iso4217:USD/xbrli:shares")), MetricUnit::PerShare);
        assert_eq!(infer_unit(MetricCategory::SharesOutstanding, Some("shares")), MetricUnit::Shares);
        assert_eq!(infer_unit(revenue, Some("pure")), MetricUnit::None);
        assert_eq!(infer_unit(revenue, None), MetricUnit::None);
    }

    #[test]
    fn test_plain_text_is_not_inspected() {
        let extraction = extract_structured("Total revenue 1,234", "USD");
        assert_eq!(extraction.strategy, None);
        assert!(extraction.metrics.is_empty());
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn test_merge_contexts_prefers_dated_entries() {
        let dated = XbrlContext {
            id: "C1".to_string(),
            instant: NaiveDate::from_ymd_opt(2023, 9, 30),
            ..Default::default()
        };
        let bare = XbrlContext {
            id: "C1".to_string(),
            has_dimensions: true,
            ..Default::default()
        };
        let merged = merge_contexts(
            HashMap::from([("c1".to_string(), bare)]),
            HashMap::from([("c1".to_string(), dated.clone())]),
        );
        let context = &merged["c1"];
        assert_eq!(context.instant, dated.instant);
        assert!(context.has_dimensions);
    }

    #[test]
    fn test_context_period_types() {
        let context = |start: (i32, u32, u32), end: (i32, u32, u32)| XbrlContext {
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2),
            ..Default::default()
        };
        assert_eq!(context((2023, 1, 1), (2023, 9, 30)).period_type(), Some(PeriodType::Ytd));
        assert_eq!(context((2023, 1, 1), (2023, 12, 31)).period_type(), Some(PeriodType::Annual));
        assert_eq!(context((2023, 1, 1), (2023, 1, 31)).period_type(), None);
    }

    #[test]
    fn test_sample_filing() {
        let content = read_test_file("sample-10q.htm");
        let extraction = extract_structured(&content, "USD");
        assert_eq!(extraction.strategy, Some(Strategy::TreeQuery));
        let net = extraction
            .metrics
            .iter()
            .find(|m| m.category == MetricCategory::NetIncome)
            .unwrap();
        assert_eq!(net.raw_value, dec!(-45678000));
        assert_eq!(net.period.as_deref(), Some("2023-09-30"));
    }
}
