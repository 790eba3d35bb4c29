use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::metrics::error::ExtractionError;
use crate::metrics::types::{MetricUnit, PeriodType};

static UNIT_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bin\s+(thousands|millions|billions)\b|\(\s*(000)['\x{2019}]?s?(?:\s+omitted)?\s*\)|\b(000)['\x{2019}]?s\s+omitted\b",
    )
    .expect("unit phrase pattern")
});
static PER_SHARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bper\s+share\b").expect("per share pattern"));

static PERIOD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(?:three|six|nine|twelve)\s+months\s+ended\s+(?P<date>[A-Za-z]+\.?\s+\d{1,2},?\s+\d{4})",
        r"(?i)\b(?:quarter|quarterly\s+period|fiscal\s+year|year|period)\s+ended\s+(?P<date>[A-Za-z]+\.?\s+\d{1,2},?\s+\d{4})",
        r"\bQ(?P<quarter>[1-4])\s*(?:FY)?\s*'?(?P<year>\d{4}|\d{2})\b",
        r"(?i)\bFY\s*'?(?P<fy>\d{4}|\d{2})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("period pattern"))
    .collect()
});

/// Phrases that classify a period, each with the period type it implies.
static PERIOD_TYPE_RULES: Lazy<Vec<(Regex, PeriodType)>> = Lazy::new(|| {
    [
        (r"(?i)\bthree\s+months\b|\bquarter(?:ly)?\s+(?:period\s+)?ended\b|\b13\s+weeks\b", PeriodType::Quarterly),
        (r"(?i)\b(?:six|nine)\s+months\b|\byear[\s-]+to[\s-]+date\b|\b(?:26|39)\s+weeks\b", PeriodType::Ytd),
        (r"(?i)\btwelve\s+months\b|\bfiscal\s+year\b|\byear\s+ended\b|\bannual\s+report\b|\b52\s+weeks\b", PeriodType::Annual),
    ]
    .into_iter()
    .map(|(p, t)| (Regex::new(p).expect("period type pattern"), t))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub label: String,
    pub end_date: Option<NaiveDate>,
}

fn phrase_unit(caps: &regex::Captures<'_>) -> Option<MetricUnit> {
    if let Some(word) = caps.get(1) {
        return match word.as_str().to_lowercase().as_str() {
            "thousands" => Some(MetricUnit::Thousands),
            "millions" => Some(MetricUnit::Millions),
            "billions" => Some(MetricUnit::Billions),
            _ => None,
        };
    }
    if caps.get(2).is_some() || caps.get(3).is_some() {
        return Some(MetricUnit::Thousands);
    }
    None
}

/// Finds the reporting scale from phrasings like "in millions",
/// "$ in thousands", "(in billions of dollars)" or "(000's omitted)".
///
/// Returns `NoMatch` when no phrase exists. When several scales appear the
/// most frequent one wins; a tie between different scales is `AmbiguousUnit`.
pub fn detect_unit(text: &str) -> Result<MetricUnit, ExtractionError> {
    let mut counts: HashMap<MetricUnit, (usize, usize)> = HashMap::new();
    for (position, caps) in UNIT_PHRASE_RE.captures_iter(text).enumerate() {
        if let Some(unit) = phrase_unit(&caps) {
            let entry = counts.entry(unit).or_insert((0, position));
            entry.0 += 1;
        }
    }

    let best = counts.values().map(|(count, _)| *count).max();
    let Some(best) = best else {
        return Err(ExtractionError::NoMatch);
    };

    let mut leaders: Vec<(MetricUnit, usize)> = counts
        .iter()
        .filter(|(_, (count, _))| *count == best)
        .map(|(unit, (_, first))| (*unit, *first))
        .collect();
    leaders.sort_by_key(|(_, first)| *first);

    match leaders.as_slice() {
        [(unit, _)] => Ok(*unit),
        _ => Err(ExtractionError::AmbiguousUnit(
            leaders.into_iter().map(|(unit, _)| unit).collect(),
        )),
    }
}

/// Unit used for extraction when the document must be read at some scale.
///
/// Falls back to the first phrase on ambiguity, to NONE when the only scale
/// signal is "per share", and otherwise to MILLIONS.
pub fn resolve_unit(text: &str) -> MetricUnit {
    match detect_unit(text) {
        Ok(unit) => unit,
        Err(ExtractionError::AmbiguousUnit(candidates)) => {
            log::debug!("Ambiguous unit phrases {:?}, using first", candidates);
            candidates.first().copied().unwrap_or(MetricUnit::Millions)
        }
        Err(_) if PER_SHARE_RE.is_match(text) && !looks_like_statement(text) => MetricUnit::None,
        Err(_) => MetricUnit::Millions,
    }
}

fn looks_like_statement(text: &str) -> bool {
    static TOTALS_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\btotal\s+(?:revenues?|net\s+sales|assets|liabilities)\b")
            .expect("totals pattern")
    });
    TOTALS_RE.is_match(text)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let cleaned = text.replace('.', "").replace(',', "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    ["%B %d %Y", "%b %d %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

fn expand_year(year: &str) -> String {
    if year.len() == 2 {
        format!("20{}", year)
    } else {
        year.to_string()
    }
}

/// Finds the first reporting-period phrase ("Quarter Ended <date>",
/// "Year Ended <date>", "Q<n> <year>", "FY<year>").
pub fn detect_period(text: &str) -> Option<ReportingPeriod> {
    PERIOD_PATTERNS
        .iter()
        .filter_map(|re| re.captures(text).map(|caps| (re, caps)))
        .min_by_key(|(_, caps)| caps.get(0).map(|m| m.start()).unwrap_or(usize::MAX))
        .map(|(_, caps)| {
            if let Some(date) = caps.name("date") {
                let end_date = parse_date(date.as_str());
                let label = caps
                    .get(0)
                    .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
                    .unwrap_or_default();
                ReportingPeriod { label, end_date }
            } else if let (Some(q), Some(year)) = (caps.name("quarter"), caps.name("year")) {
                ReportingPeriod {
                    label: format!("Q{} {}", q.as_str(), expand_year(year.as_str())),
                    end_date: None,
                }
            } else {
                let fy = caps.name("fy").map(|m| m.as_str()).unwrap_or_default();
                ReportingPeriod {
                    label: format!("FY{}", expand_year(fy)),
                    end_date: None,
                }
            }
        })
}

/// Classifies by the earliest co-occurring period phrase.
pub fn detect_period_type(text: &str) -> Option<PeriodType> {
    PERIOD_TYPE_RULES
        .iter()
        .filter_map(|(re, period_type)| re.find(text).map(|m| (m.start(), *period_type)))
        .min_by_key(|(start, _)| *start)
        .map(|(_, period_type)| period_type)
}
