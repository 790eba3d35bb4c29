//! Static label catalog used by the text extractor.
//!
//! Each entry pairs a label phrasing (a regex fragment, matched
//! case-insensitively on word boundaries) with the category it reports and a
//! base confidence. More specific phrasings of a category come first and carry
//! a higher base confidence than their generic fallbacks.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::MetricCategory::{self, *};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub label: &'static str,
    pub category: MetricCategory,
    pub base_confidence: f64,
}

const fn entry(
    name: &'static str,
    label: &'static str,
    category: MetricCategory,
    base_confidence: f64,
) -> CatalogEntry {
    CatalogEntry {
        name,
        label,
        category,
        base_confidence,
    }
}

/// Highest base confidence any text pattern may carry. Machine-tagged facts
/// always outrank it.
pub const MAX_PATTERN_CONFIDENCE: f64 = 0.95;

pub static CATALOG: &[CatalogEntry] = &[
    // Income statement
    entry("Total Revenue", r"total\s+(?:net\s+)?revenues?", Revenue, 0.95),
    entry("Total Net Sales", r"total\s+net\s+sales", Revenue, 0.95),
    entry("Net Revenue", r"net\s+revenues?", Revenue, 0.85),
    entry("Net Sales", r"net\s+sales", Revenue, 0.85),
    entry("Revenue", r"revenues?", Revenue, 0.60),
    entry("Product Revenue", r"(?:products?\s+revenues?|revenues?\s+from\s+products)", ProductRevenue, 0.80),
    entry("Service Revenue", r"(?:services?\s+revenues?|revenues?\s+from\s+services)", ServiceRevenue, 0.80),
    entry("Total Cost of Revenue", r"total\s+cost\s+of\s+(?:revenues?|sales)", CostOfRevenue, 0.90),
    entry("Cost of Revenue", r"cost\s+of\s+(?:revenues?|goods\s+sold|sales)", CostOfRevenue, 0.80),
    entry("Gross Profit", r"gross\s+(?:profit|margin)", GrossProfit, 0.90),
    entry("Research and Development", r"research\s+and\s+development(?:\s+expenses?)?", ResearchAndDevelopment, 0.85),
    entry(
        "Selling, General and Administrative",
        r"selling,?\s+general\s+and\s+administrative(?:\s+expenses?)?",
        SellingGeneralAdministrative,
        0.85,
    ),
    entry("Depreciation and Amortization", r"depreciation\s+and\s+amortization", DepreciationAmortization, 0.80),
    entry("Restructuring Charges", r"restructuring(?:\s+and\s+other)?\s+(?:charges|costs)", RestructuringCharges, 0.75),
    entry("Total Operating Expenses", r"total\s+(?:costs\s+and\s+)?operating\s+expenses", TotalOperatingExpenses, 0.90),
    entry("Operating Income (Loss)", r"(?:income|loss)\s+from\s+operations|operating\s+income(?:\s+\(loss\))?", OperatingIncome, 0.90),
    entry("Operating Loss", r"operating\s+loss", OperatingIncome, 0.85),
    entry("Interest Expense", r"interest\s+expense(?:,\s+net)?", InterestExpense, 0.85),
    entry("Interest Income", r"interest\s+(?:and\s+other\s+)?income(?:,\s+net)?", InterestIncome, 0.75),
    entry("Other Income (Expense)", r"other\s+income\s+\(expense\)(?:,\s+net)?|other\s+(?:income|expense),\s+net", OtherIncomeExpense, 0.75),
    entry(
        "Income Before Income Taxes",
        r"(?:income|loss)\s+before\s+(?:provision\s+for\s+)?income\s+taxes",
        IncomeBeforeTax,
        0.90,
    ),
    entry(
        "Income Tax Expense",
        r"(?:provision\s+for|benefit\s+from)\s+income\s+taxes|income\s+tax\s+(?:expense|provision)",
        IncomeTaxExpense,
        0.85,
    ),
    entry(
        "Income from Continuing Operations",
        r"(?:income|loss)\s+from\s+continuing\s+operations",
        IncomeFromContinuingOperations,
        0.80,
    ),
    entry(
        "Net Income Attributable to Noncontrolling Interests",
        r"net\s+(?:income|loss)\s+attributable\s+to\s+non-?controlling\s+interests?",
        NetIncomeAttributableToNoncontrolling,
        0.85,
    ),
    entry("Net Income (Loss)", r"net\s+income\s+\(loss\)", NetIncome, 0.93),
    entry("Net Income", r"net\s+(?:income|earnings)", NetIncome, 0.90),
    entry("Net Loss", r"net\s+loss", NetIncome, 0.90),
    entry("EBITDA", r"(?:adjusted\s+)?ebitda", Ebitda, 0.70),
    entry("Comprehensive Income", r"(?:total\s+)?comprehensive\s+income(?:\s+\(loss\))?", ComprehensiveIncome, 0.75),
    // Balance sheet: assets
    entry(
        "Cash and Cash Equivalents",
        r"cash\s+and\s+cash\s+equivalents",
        CashAndEquivalents,
        0.90,
    ),
    entry("Short-term Investments", r"short-?\s*term\s+investments|marketable\s+securities", ShortTermInvestments, 0.80),
    entry("Accounts Receivable", r"accounts\s+receivable(?:,\s+net)?", AccountsReceivable, 0.85),
    entry("Inventories", r"inventor(?:y|ies)", Inventory, 0.80),
    entry("Prepaid Expenses", r"prepaid\s+expenses(?:\s+and\s+other\s+current\s+assets)?", PrepaidExpenses, 0.75),
    entry("Total Current Assets", r"total\s+current\s+assets", TotalCurrentAssets, 0.95),
    entry(
        "Property, Plant and Equipment",
        r"property,?\s+(?:plant\s+)?and\s+equipment(?:,\s+net)?",
        PropertyPlantEquipment,
        0.85,
    ),
    entry("Operating Lease Right-of-use Assets", r"operating\s+lease\s+right-of-use\s+assets", OperatingLeaseAssets, 0.80),
    entry("Goodwill", r"goodwill", Goodwill, 0.85),
    entry("Intangible Assets", r"(?:other\s+)?intangible\s+assets(?:,\s+net)?", IntangibleAssets, 0.80),
    entry("Long-term Investments", r"long-?\s*term\s+investments", LongTermInvestments, 0.80),
    entry("Deferred Tax Assets", r"deferred\s+(?:income\s+)?tax\s+assets", DeferredTaxAssets, 0.75),
    entry("Other Assets", r"other\s+(?:non-?current\s+)?assets", OtherAssets, 0.60),
    entry("Total Assets", r"total\s+assets", TotalAssets, 0.95),
    // Balance sheet: liabilities
    entry("Accounts Payable", r"accounts\s+payable", AccountsPayable, 0.85),
    entry("Accrued Liabilities", r"accrued\s+(?:expenses\s+and\s+other\s+)?(?:liabilities|expenses)", AccruedLiabilities, 0.75),
    entry("Deferred Revenue", r"deferred\s+revenues?|unearned\s+revenues?", DeferredRevenue, 0.80),
    entry("Short-term Debt", r"short-?\s*term\s+(?:debt|borrowings)|commercial\s+paper", ShortTermDebt, 0.80),
    entry(
        "Current Portion of Long-term Debt",
        r"current\s+portion\s+of\s+long-?\s*term\s+debt",
        CurrentPortionLongTermDebt,
        0.85,
    ),
    entry("Total Current Liabilities", r"total\s+current\s+liabilities", TotalCurrentLiabilities, 0.95),
    entry("Long-term Debt", r"long-?\s*term\s+debt(?:,\s+net)?(?:,\s+(?:less|excluding)\s+current\s+portion)?", LongTermDebt, 0.85),
    entry("Operating Lease Liabilities", r"operating\s+lease\s+liabilities", OperatingLeaseLiabilities, 0.75),
    entry("Total Debt", r"total\s+(?:debt|borrowings)", TotalDebt, 0.85),
    entry("Deferred Tax Liabilities", r"deferred\s+(?:income\s+)?tax\s+liabilities", DeferredTaxLiabilities, 0.75),
    entry("Other Liabilities", r"other\s+(?:non-?current\s+|long-?\s*term\s+)?liabilities", OtherLiabilities, 0.60),
    entry("Total Liabilities", r"total\s+liabilities", TotalLiabilities, 0.95),
    // Equity
    entry("Common Stock", r"common\s+stock(?:\s+and\s+additional\s+paid-in\s+capital)?", CommonStock, 0.60),
    entry("Additional Paid-in Capital", r"additional\s+paid-in\s+capital", AdditionalPaidInCapital, 0.85),
    entry("Retained Earnings", r"retained\s+earnings(?:\s+\(accumulated\s+deficit\))?", RetainedEarnings, 0.85),
    entry("Accumulated Deficit", r"accumulated\s+deficit", RetainedEarnings, 0.85),
    entry(
        "Accumulated Other Comprehensive Income (Loss)",
        r"accumulated\s+other\s+comprehensive\s+(?:income|loss)(?:\s+\(loss\))?",
        AccumulatedOtherComprehensiveIncome,
        0.80,
    ),
    entry("Treasury Stock", r"treasury\s+stock", TreasuryStock, 0.75),
    entry("Noncontrolling Interests", r"non-?controlling\s+interests?", NoncontrollingInterest, 0.70),
    entry(
        "Total Stockholders' Equity",
        r"total\s+(?:stockholders|shareholders)['\x{2019}]?\s+equity(?:\s+\(deficit\))?",
        TotalEquity,
        0.95,
    ),
    entry("Total Equity", r"total\s+equity", TotalEquity, 0.90),
    entry(
        "Total Liabilities and Equity",
        r"total\s+liabilities\s+and\s+(?:stockholders['\x{2019}]?\s+|shareholders['\x{2019}]?\s+)?equity",
        TotalLiabilitiesAndEquity,
        0.95,
    ),
    // Cash flow
    entry(
        "Net Cash from Operating Activities",
        r"net\s+cash\s+(?:provided\s+by|used\s+in|from|\(used\s+in\)|provided\s+by\s+\(used\s+in\))\s+operating\s+activities",
        OperatingCashFlow,
        0.95,
    ),
    entry("Operating Cash Flow", r"(?:cash\s+flows?\s+from|cash\s+generated\s+by)\s+operati(?:ons|ng\s+activities)", OperatingCashFlow, 0.80),
    entry(
        "Net Cash from Investing Activities",
        r"net\s+cash\s+(?:provided\s+by|used\s+in|from|\(used\s+in\)|provided\s+by\s+\(used\s+in\))\s+investing\s+activities",
        InvestingCashFlow,
        0.95,
    ),
    entry(
        "Net Cash from Financing Activities",
        r"net\s+cash\s+(?:provided\s+by|used\s+in|from|\(used\s+in\)|provided\s+by\s+\(used\s+in\))\s+financing\s+activities",
        FinancingCashFlow,
        0.95,
    ),
    entry(
        "Capital Expenditures",
        r"capital\s+expenditures|purchases\s+of\s+property(?:,\s+plant)?\s+and\s+equipment|payments\s+for\s+acquisition\s+of\s+property",
        CapitalExpenditures,
        0.85,
    ),
    entry("Free Cash Flow", r"free\s+cash\s+flows?", FreeCashFlow, 0.80),
    entry("Stock-based Compensation", r"(?:stock|share)-based\s+compensation(?:\s+expense)?", StockBasedCompensation, 0.80),
    entry("Acquisitions", r"acquisitions?,?\s+net\s+of\s+cash\s+acquired", Acquisitions, 0.80),
    entry("Dividends Paid", r"(?:cash\s+)?dividends\s+paid|payments\s+(?:of|for)\s+dividends", DividendsPaid, 0.85),
    entry(
        "Share Repurchases",
        r"repurchases?\s+of\s+(?:common\s+)?stock|purchases\s+of\s+treasury\s+stock|share\s+repurchases",
        ShareRepurchases,
        0.80,
    ),
    entry("Debt Issuance", r"proceeds\s+from\s+(?:issuance\s+of\s+)?(?:long-?\s*term\s+)?(?:debt|borrowings)", DebtIssuance, 0.75),
    entry("Debt Repayment", r"repayments?\s+of\s+(?:long-?\s*term\s+)?(?:debt|borrowings)", DebtRepayment, 0.75),
    entry(
        "Net Change in Cash",
        r"net\s+(?:increase|decrease|increase\s+\(decrease\)|change)\s+in\s+cash(?:\s+and\s+cash\s+equivalents)?",
        NetChangeInCash,
        0.85,
    ),
    // Per share
    entry("Diluted EPS", r"diluted\s+(?:net\s+)?(?:earnings|income|loss)\s+per\s+(?:common\s+)?share|(?:earnings|income|loss)\s+per\s+share\s*[-\x{2013}\x{2014}:]?\s*diluted", EpsDiluted, 0.90),
    entry("Basic EPS", r"basic\s+(?:net\s+)?(?:earnings|income|loss)\s+per\s+(?:common\s+)?share|(?:earnings|income|loss)\s+per\s+share\s*[-\x{2013}\x{2014}:]?\s*basic", EpsBasic, 0.90),
    entry("Dividends Per Share", r"(?:cash\s+)?dividends\s+(?:declared\s+)?per\s+(?:common\s+)?share", DividendsPerShare, 0.85),
    entry("Book Value Per Share", r"book\s+value\s+per\s+share", BookValuePerShare, 0.80),
    // Shares outstanding
    entry(
        "Weighted Average Diluted Shares",
        r"weighted[\s-]+average\s+(?:number\s+of\s+)?(?:common\s+)?shares(?:\s+outstanding)?\s*[-\x{2013}\x{2014}:,]?\s*diluted|diluted\s+weighted[\s-]+average\s+shares",
        WeightedAverageSharesDiluted,
        0.85,
    ),
    entry(
        "Weighted Average Basic Shares",
        r"weighted[\s-]+average\s+(?:number\s+of\s+)?(?:common\s+)?shares(?:\s+outstanding)?\s*[-\x{2013}\x{2014}:,]?\s*basic|basic\s+weighted[\s-]+average\s+shares",
        WeightedAverageSharesBasic,
        0.85,
    ),
    entry("Shares Outstanding", r"(?:common\s+)?shares\s+(?:of\s+common\s+stock\s+)?outstanding", SharesOutstanding, 0.75),
];

/// The label of `entry` wrapped in word boundaries. A trailing `\b` cannot
/// follow a closing parenthesis, so labels ending in a group go without it.
pub fn label_fragment(entry: &CatalogEntry) -> String {
    let boundary = if entry.label.ends_with(')') || entry.label.ends_with('?') {
        ""
    } else {
        r"\b"
    };
    format!(r"\b(?:{}){}", entry.label, boundary)
}

/// The label of `entry` as a standalone, case-insensitive pattern.
pub fn label_pattern(entry: &CatalogEntry) -> String {
    format!("(?i){}", label_fragment(entry))
}

/// Every catalog label compiled once, in catalog order.
pub static LABEL_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    CATALOG
        .iter()
        .map(|e| Regex::new(&label_pattern(e)).expect("catalog label pattern"))
        .collect()
});

pub fn entries_for(category: MetricCategory) -> impl Iterator<Item = &'static CatalogEntry> {
    CATALOG.iter().filter(move |e| e.category == category)
}
