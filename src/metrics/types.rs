use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Closed taxonomy of financial statement line items.
///
/// Declaration order is the canonical output order of the reconciler, so new
/// variants belong next to the rest of their family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricCategory {
    // Income statement
    Revenue,
    ProductRevenue,
    ServiceRevenue,
    CostOfRevenue,
    GrossProfit,
    ResearchAndDevelopment,
    SellingGeneralAdministrative,
    DepreciationAmortization,
    RestructuringCharges,
    TotalOperatingExpenses,
    OperatingIncome,
    InterestExpense,
    InterestIncome,
    OtherIncomeExpense,
    IncomeBeforeTax,
    IncomeTaxExpense,
    IncomeFromContinuingOperations,
    NetIncome,
    NetIncomeAttributableToNoncontrolling,
    Ebitda,
    ComprehensiveIncome,

    // Balance sheet: assets
    CashAndEquivalents,
    ShortTermInvestments,
    AccountsReceivable,
    Inventory,
    PrepaidExpenses,
    TotalCurrentAssets,
    PropertyPlantEquipment,
    OperatingLeaseAssets,
    Goodwill,
    IntangibleAssets,
    LongTermInvestments,
    DeferredTaxAssets,
    OtherAssets,
    TotalAssets,

    // Balance sheet: liabilities
    AccountsPayable,
    AccruedLiabilities,
    DeferredRevenue,
    ShortTermDebt,
    CurrentPortionLongTermDebt,
    TotalCurrentLiabilities,
    LongTermDebt,
    OperatingLeaseLiabilities,
    TotalDebt,
    DeferredTaxLiabilities,
    OtherLiabilities,
    TotalLiabilities,

    // Equity
    CommonStock,
    AdditionalPaidInCapital,
    RetainedEarnings,
    AccumulatedOtherComprehensiveIncome,
    TreasuryStock,
    NoncontrollingInterest,
    TotalEquity,
    TotalLiabilitiesAndEquity,

    // Cash flow
    OperatingCashFlow,
    InvestingCashFlow,
    FinancingCashFlow,
    CapitalExpenditures,
    FreeCashFlow,
    StockBasedCompensation,
    DepreciationCashFlow,
    Acquisitions,
    DividendsPaid,
    ShareRepurchases,
    DebtIssuance,
    DebtRepayment,
    NetChangeInCash,

    // Per share
    EpsBasic,
    EpsDiluted,
    DividendsPerShare,
    BookValuePerShare,

    // Shares outstanding
    SharesOutstanding,
    WeightedAverageSharesBasic,
    WeightedAverageSharesDiluted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricFamily {
    IncomeStatement,
    BalanceSheet,
    Equity,
    CashFlow,
    PerShare,
    SharesOutstanding,
}

impl MetricCategory {
    pub fn family(self) -> MetricFamily {
        use MetricCategory::*;
        match self {
            Revenue
            | ProductRevenue
            | ServiceRevenue
            | CostOfRevenue
            | GrossProfit
            | ResearchAndDevelopment
            | SellingGeneralAdministrative
            | DepreciationAmortization
            | RestructuringCharges
            | TotalOperatingExpenses
            | OperatingIncome
            | InterestExpense
            | InterestIncome
            | OtherIncomeExpense
            | IncomeBeforeTax
            | IncomeTaxExpense
            | IncomeFromContinuingOperations
            | NetIncome
            | NetIncomeAttributableToNoncontrolling
            | Ebitda
            | ComprehensiveIncome => MetricFamily::IncomeStatement,

            CashAndEquivalents
            | ShortTermInvestments
            | AccountsReceivable
            | Inventory
            | PrepaidExpenses
            | TotalCurrentAssets
            | PropertyPlantEquipment
            | OperatingLeaseAssets
            | Goodwill
            | IntangibleAssets
            | LongTermInvestments
            | DeferredTaxAssets
            | OtherAssets
            | TotalAssets
            | AccountsPayable
            | AccruedLiabilities
            | DeferredRevenue
            | ShortTermDebt
            | CurrentPortionLongTermDebt
            | TotalCurrentLiabilities
            | LongTermDebt
            | OperatingLeaseLiabilities
            | TotalDebt
            | DeferredTaxLiabilities
            | OtherLiabilities
            | TotalLiabilities => MetricFamily::BalanceSheet,

            CommonStock
            | AdditionalPaidInCapital
            | RetainedEarnings
            | AccumulatedOtherComprehensiveIncome
            | TreasuryStock
            | NoncontrollingInterest
            | TotalEquity
            | TotalLiabilitiesAndEquity => MetricFamily::Equity,

            OperatingCashFlow
            | InvestingCashFlow
            | FinancingCashFlow
            | CapitalExpenditures
            | FreeCashFlow
            | StockBasedCompensation
            | DepreciationCashFlow
            | Acquisitions
            | DividendsPaid
            | ShareRepurchases
            | DebtIssuance
            | DebtRepayment
            | NetChangeInCash => MetricFamily::CashFlow,

            EpsBasic | EpsDiluted | DividendsPerShare | BookValuePerShare => MetricFamily::PerShare,

            SharesOutstanding | WeightedAverageSharesBasic | WeightedAverageSharesDiluted => {
                MetricFamily::SharesOutstanding
            }
        }
    }

    pub fn is_per_share(self) -> bool {
        self.family() == MetricFamily::PerShare
    }

    pub fn is_share_count(self) -> bool {
        self.family() == MetricFamily::SharesOutstanding
    }

    /// Categories whose sign carries meaning, so a loss/deficit cue turns them negative.
    pub fn is_signed(self) -> bool {
        use MetricCategory::*;
        matches!(
            self,
            GrossProfit
                | OperatingIncome
                | OtherIncomeExpense
                | IncomeBeforeTax
                | IncomeFromContinuingOperations
                | NetIncome
                | ComprehensiveIncome
                | RetainedEarnings
                | OperatingCashFlow
                | InvestingCashFlow
                | FinancingCashFlow
                | FreeCashFlow
                | NetChangeInCash
                | EpsBasic
                | EpsDiluted
        )
    }
}

/// Magnitude unit of a reported amount. The scale is applied once, when the
/// amount is parsed, and the stored `raw_value` is always in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricUnit {
    Dollars,
    Thousands,
    Millions,
    Billions,
    Shares,
    PerShare,
    None,
}

impl MetricUnit {
    pub fn multiplier(self) -> Decimal {
        match self {
            MetricUnit::Thousands => Decimal::from(1_000u32),
            MetricUnit::Millions => Decimal::from(1_000_000u32),
            MetricUnit::Billions => Decimal::from(1_000_000_000u32),
            MetricUnit::Dollars | MetricUnit::Shares | MetricUnit::PerShare | MetricUnit::None => {
                Decimal::ONE
            }
        }
    }

    pub fn is_scale(self) -> bool {
        matches!(
            self,
            MetricUnit::Thousands | MetricUnit::Millions | MetricUnit::Billions
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodType {
    Quarterly,
    Annual,
    Ytd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricSource {
    TextPattern,
    TableRow,
    InlineXbrl,
    CompanyFacts,
}

/// A single candidate (or, after reconciliation, the retained) value for one
/// category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFinancialMetric {
    pub name: String,
    pub display_value: String,
    pub raw_value: Decimal,
    /// Unit the amount was reported in. `raw_value` is already scaled.
    pub unit: MetricUnit,
    pub period: Option<String>,
    pub period_type: Option<PeriodType>,
    pub category: MetricCategory,
    pub source: MetricSource,
    pub confidence: f64,
    pub context: String,
    pub yoy_change: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    #[test]
    fn test_category_order_follows_declaration() {
        let categories: Vec<_> = MetricCategory::iter().collect();
        assert_eq!(categories.first(), Some(&MetricCategory::Revenue));
        assert!(MetricCategory::Revenue < MetricCategory::NetIncome);
        assert!(MetricCategory::TotalAssets < MetricCategory::OperatingCashFlow);
        assert!(categories.len() > 70);
    }

    #[test]
    fn test_families() {
        assert_eq!(MetricCategory::Revenue.family(), MetricFamily::IncomeStatement);
        assert_eq!(MetricCategory::TotalAssets.family(), MetricFamily::BalanceSheet);
        assert_eq!(MetricCategory::RetainedEarnings.family(), MetricFamily::Equity);
        assert_eq!(MetricCategory::CapitalExpenditures.family(), MetricFamily::CashFlow);
        assert!(MetricCategory::EpsDiluted.is_per_share());
        assert!(MetricCategory::SharesOutstanding.is_share_count());
    }

    #[test]
    fn test_unit_multiplier() {
        assert_eq!(MetricUnit::Millions.multiplier(), dec!(1000000));
        assert_eq!(MetricUnit::PerShare.multiplier(), Decimal::ONE);
        assert!(MetricUnit::Billions.is_scale());
        assert!(!MetricUnit::Shares.is_scale());
    }

    #[test]
    fn test_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&MetricCategory::NetIncome).unwrap();
        assert_eq!(json, "\"NET_INCOME\"");
        assert_eq!(MetricCategory::EpsDiluted.to_string(), "EPS_DILUTED");
    }
}
