//! Exact decimal arithmetic for reported amounts.
//!
//! Amounts are built from text only, never from binary floating point. All
//! intermediate division keeps [`DIVISION_SCALE`] fractional digits and values
//! are rounded to display precision as the very last step.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::ExtractionError;
use super::types::{MetricCategory, MetricUnit};

/// Largest absolute amount accepted for any reported money value ($10 trillion).
pub const MAX_PLAUSIBLE_AMOUNT: Decimal = dec!(10000000000000);
/// Largest absolute per-share amount accepted.
pub const MAX_PLAUSIBLE_PER_SHARE: Decimal = dec!(10000);
/// Growth beyond this many percent (10x) is treated as a parsing error.
pub const MAX_PLAUSIBLE_GROWTH_PERCENT: Decimal = dec!(1000);
/// Fractional digits kept for intermediate division.
pub const DIVISION_SCALE: u32 = 10;
pub const CURRENCY_DP: u32 = 2;
pub const PERCENT_DP: u32 = 2;
pub const RATIO_DP: u32 = 4;
pub const DEFAULT_CURRENCY: &str = "USD";

const HUNDRED: Decimal = dec!(100);
const THOUSAND: Decimal = dec!(1000);
const MILLION: Decimal = dec!(1000000);
const BILLION: Decimal = dec!(1000000000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonetaryValue {
    pub amount: Decimal,
    pub currency: String,
}

impl MonetaryValue {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }

    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, DEFAULT_CURRENCY)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.amount, &self.currency)
    }

    /// Amount rounded to display precision.
    pub fn rounded(&self) -> Decimal {
        round_half_up(self.amount, CURRENCY_DP)
    }

    pub fn format_compact(&self) -> String {
        format_compact(self.amount)
    }
}

impl std::fmt::Display for MonetaryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", format_currency(self.amount), self.currency)
    }
}

pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

fn is_not_applicable(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| matches!(c, '-' | '\u{2013}' | '\u{2014}' | '\u{2012}' | '\u{2212}'))
}

/// Parses a reported amount such as `$ 1,234.5`, `(45,678)` or `-12` and
/// applies the unit multiplier.
///
/// A lone dash means "not applicable" and is a miss, as is anything that is
/// not a number once symbols are removed. Amounts above the plausibility
/// ceiling are a distinct failure.
pub fn parse_amount(
    text: &str,
    unit_hint: MetricUnit,
    currency: &str,
) -> Result<MonetaryValue, ExtractionError> {
    let cleaned: String = text
        .chars()
        .filter(|c| {
            !matches!(c, '$' | ',' | '\u{a0}' | '\u{20ac}' | '\u{a3}') && !c.is_whitespace()
        })
        .collect();

    if cleaned.is_empty() || is_not_applicable(&cleaned) {
        return Err(ExtractionError::NoMatch);
    }

    let mut digits = cleaned.as_str();
    let mut negative = false;
    if let Some(rest) = digits.strip_prefix('(') {
        negative = true;
        digits = rest.strip_suffix(')').unwrap_or(rest);
    } else if let Some(rest) = digits.strip_suffix(')') {
        // closing parenthesis of a negative split across table cells
        negative = true;
        digits = rest;
    }
    if let Some(rest) = digits
        .strip_prefix('-')
        .or_else(|| digits.strip_prefix('\u{2212}'))
    {
        negative = true;
        digits = rest;
    }

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(ExtractionError::Unparseable(text.trim().to_string()));
    }

    let value = Decimal::from_str(digits)
        .map_err(|_| ExtractionError::Unparseable(text.trim().to_string()))?;
    let scaled = value
        .checked_mul(unit_hint.multiplier())
        .ok_or(ExtractionError::ImplausibleAmount {
            amount: Decimal::MAX,
            ceiling: ceiling_for(unit_hint),
        })?;

    check_plausible(scaled, unit_hint)?;

    let amount = if negative { -scaled } else { scaled };
    Ok(MonetaryValue::new(amount, currency))
}

fn ceiling_for(unit: MetricUnit) -> Decimal {
    match unit {
        MetricUnit::PerShare => MAX_PLAUSIBLE_PER_SHARE,
        _ => MAX_PLAUSIBLE_AMOUNT,
    }
}

pub fn check_plausible(amount: Decimal, unit: MetricUnit) -> Result<(), ExtractionError> {
    let ceiling = ceiling_for(unit);
    if amount.abs() > ceiling {
        return Err(ExtractionError::ImplausibleAmount { amount, ceiling });
    }
    Ok(())
}

fn divide(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator
        .checked_div(denominator)
        .map(|q| round_half_up(q, DIVISION_SCALE))
}

/// `numerator / denominator * 100`, rounded to two decimals.
pub fn percentage_of(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    let quotient = divide(numerator, denominator)?;
    quotient
        .checked_mul(HUNDRED)
        .map(|p| round_half_up(p, PERCENT_DP))
}

/// `(current - previous) / |previous| * 100`, rounded to two decimals.
pub fn percentage_change(current: Decimal, previous: Decimal) -> Result<Decimal, ExtractionError> {
    if previous.is_zero() {
        return Err(ExtractionError::ZeroDenominator);
    }
    let delta = current
        .checked_sub(previous)
        .ok_or(ExtractionError::Unparseable(format!("{} - {}", current, previous)))?;
    let percent = divide(delta, previous.abs())
        .and_then(|q| q.checked_mul(HUNDRED))
        .map(|p| round_half_up(p, PERCENT_DP))
        .ok_or(ExtractionError::ImplausibleGrowth {
            percent: Decimal::MAX,
            ceiling: MAX_PLAUSIBLE_GROWTH_PERCENT,
        })?;

    if percent.abs() > MAX_PLAUSIBLE_GROWTH_PERCENT {
        return Err(ExtractionError::ImplausibleGrowth {
            percent,
            ceiling: MAX_PLAUSIBLE_GROWTH_PERCENT,
        });
    }
    Ok(percent)
}

/// Plain quotient at four decimals.
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    divide(numerator, denominator).map(|q| round_half_up(q, RATIO_DP))
}

/// `$1.23B`, `$45.60M`, `$7.89K` or `$123.45`, using the largest suffix that applies.
pub fn format_compact(amount: Decimal) -> String {
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    let abs = amount.abs();
    let (value, suffix) = if abs >= BILLION {
        (abs / BILLION, "B")
    } else if abs >= MILLION {
        (abs / MILLION, "M")
    } else if abs >= THOUSAND {
        (abs / THOUSAND, "K")
    } else {
        (abs, "")
    };
    format!("{}${:.2}{}", sign, round_half_up(value, CURRENCY_DP), suffix)
}

fn group_thousands(int_part: &str) -> String {
    let mut result = String::new();
    let chars: Vec<_> = int_part.chars().collect();
    for (i, c) in chars.iter().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, *c);
    }
    result
}

/// `$1,234.56`
pub fn format_currency(amount: Decimal) -> String {
    let formatted = format!("{:.2}", round_half_up(amount.abs(), CURRENCY_DP));
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, group_thousands(int_part), dec_part)
}

/// `1,234,000 shares`
pub fn format_shares(amount: Decimal) -> String {
    let whole = amount.round().abs().to_string();
    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{} shares", sign, group_thousands(&whole))
}

/// Display string appropriate for the category of a metric.
pub fn display_for(category: MetricCategory, amount: Decimal) -> String {
    if category.is_per_share() {
        format_currency(amount)
    } else if category.is_share_count() {
        format_shares(amount)
    } else {
        format_compact(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_applies_unit() {
        let value = parse_amount("1,234.56", MetricUnit::Millions, DEFAULT_CURRENCY).unwrap();
        assert_eq!(value.amount, dec!(1234560000.00));
        assert_eq!(value.currency, "USD");
    }

    #[test]
    fn test_parse_amount_parenthesized_negative() {
        let value = parse_amount("(1,234)", MetricUnit::Dollars, DEFAULT_CURRENCY).unwrap();
        assert_eq!(value.amount, dec!(-1234.00));
        assert!(value.is_negative());

        let split = parse_amount("(45,678", MetricUnit::Dollars, DEFAULT_CURRENCY).unwrap();
        assert_eq!(split.amount, dec!(-45678));
    }

    #[test]
    fn test_parse_amount_symbols_and_spaces() {
        let value = parse_amount("$\u{a0}1,200 ", MetricUnit::Thousands, "USD").unwrap();
        assert_eq!(value.amount, dec!(1200000));
        let minus = parse_amount("-12.5", MetricUnit::Dollars, "USD").unwrap();
        assert_eq!(minus.amount, dec!(-12.5));
    }

    #[test]
    fn test_parse_amount_dash_is_not_applicable() {
        assert_eq!(
            parse_amount("\u{2014}", MetricUnit::Millions, "USD"),
            Err(ExtractionError::NoMatch)
        );
        assert_eq!(parse_amount("  ", MetricUnit::Millions, "USD"), Err(ExtractionError::NoMatch));
        assert!(matches!(
            parse_amount("n/a", MetricUnit::Millions, "USD"),
            Err(ExtractionError::Unparseable(_))
        ));
    }

    #[test]
    fn test_parse_amount_ceiling() {
        let err = parse_amount("20,000", MetricUnit::Billions, "USD").unwrap_err();
        assert!(err.is_plausibility_violation());
        assert!(parse_amount("10,000", MetricUnit::Billions, "USD").is_ok());
        assert!(parse_amount("12,000", MetricUnit::PerShare, "USD").is_err());
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(dec!(1), dec!(3)), Some(dec!(33.33)));
        assert_eq!(percentage_of(dec!(2), dec!(3)), Some(dec!(66.67)));
        assert_eq!(percentage_of(dec!(5), Decimal::ZERO), None);
        assert_eq!(percentage_of(dec!(5), dec!(0.000)), None);
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(dec!(125), dec!(100)), Ok(dec!(25.00)));
        assert_eq!(percentage_change(dec!(-50), dec!(-100)), Ok(dec!(50.00)));
        assert_eq!(
            percentage_change(dec!(10), Decimal::ZERO),
            Err(ExtractionError::ZeroDenominator)
        );
    }

    #[test]
    fn test_percentage_change_rejects_implausible_growth() {
        let err = percentage_change(dec!(1000000), dec!(1)).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::ImplausibleGrowth {
                percent: dec!(99999900),
                ceiling: MAX_PLAUSIBLE_GROWTH_PERCENT
            }
        );
        assert!(percentage_change(dec!(1100), dec!(100)).is_ok());
        assert!(percentage_change(dec!(1101), dec!(100)).is_err());
    }

    #[test]
    fn test_ratio_precision() {
        assert_eq!(ratio(dec!(2), dec!(3)), Some(dec!(0.6667)));
        assert_eq!(ratio(dec!(300), dec!(150)), Some(dec!(2)));
        assert_eq!(ratio(dec!(1), Decimal::ZERO), None);
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(dec!(1234500000)), "$1.23B");
        assert_eq!(format_compact(dec!(45600000)), "$45.60M");
        assert_eq!(format_compact(dec!(7890)), "$7.89K");
        assert_eq!(format_compact(dec!(123.456)), "$123.46");
        assert_eq!(format_compact(dec!(-45678000)), "-$45.68M");
    }

    #[test]
    fn test_format_currency_and_shares() {
        assert_eq!(format_currency(dec!(1234.56)), "$1,234.56");
        assert_eq!(format_currency(dec!(-2.5)), "-$2.50");
        assert_eq!(format_shares(dec!(1000000)), "1,000,000 shares");
        assert_eq!(display_for(MetricCategory::EpsDiluted, dec!(2.35)), "$2.35");
    }
}
