//! Field-name driven value normalization.
//!
//! The field name decides the strategy:
//! - names containing `date`: ISO 8601 calendar date (`YYYY-MM-DD`)
//! - names containing an amount word (`amount`, `total`, `tax`, ...): two decimals
//! - names containing `weight`: units stripped, then two decimals
//!
//! A value no strategy can parse is returned trimmed.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

const AMOUNT_WORDS: &[&str] = &[
    "amount", "charge", "fee", "cost", "total", "price", "duty", "tax",
];

/// Recognized date layouts, tried in order. The first capture-group layout
/// wins even if a later one would also match.
static DATE_LAYOUTS: LazyLock<Vec<(Regex, DateOrder)>> = LazyLock::new(|| {
    [
        (r"(\d{4})-(\d{2})-(\d{2})", DateOrder::YearMonthDay),
        (r"(\d{2})/(\d{2})/(\d{4})", DateOrder::MonthDayYear),
        (r"(\d{2})-(\d{2})-(\d{4})", DateOrder::MonthDayYear),
        (r"(\d{2})\.(\d{2})\.(\d{4})", DateOrder::DayMonthYear),
        (
            r"(?i)(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\s+(\d{4})",
            DateOrder::DayMonthNameYear,
        ),
    ]
    .into_iter()
    .map(|(pattern, order)| (Regex::new(pattern).expect("Invalid date layout regex"), order))
    .collect()
});

static NON_AMOUNT_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.,\-]").expect("Invalid amount regex"));

static WEIGHT_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(grams|gram|kgs|kg|lbs|lb|g)\.?").expect("Invalid weight unit regex")
});

static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d.,]+").expect("Invalid number regex"));

#[derive(Debug, Clone, Copy)]
enum DateOrder {
    YearMonthDay,
    MonthDayYear,
    DayMonthYear,
    DayMonthNameYear,
}

/// Normalizes extracted values according to the target field's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueNormalizer;

impl ValueNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, field_name: &str, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            return String::new();
        }
        let name = field_name.to_lowercase();

        if name.contains("date")
            && let Some(date) = normalize_date(value)
        {
            return date;
        }
        if AMOUNT_WORDS.iter().any(|word| name.contains(word))
            && let Some(amount) = normalize_amount(value)
        {
            return amount;
        }
        if name.contains("weight")
            && let Some(weight) = normalize_weight(value)
        {
            return weight;
        }
        value.to_string()
    }
}

/// First recognizable calendar date in `value`, as `YYYY-MM-DD`.
pub fn normalize_date(value: &str) -> Option<String> {
    DATE_LAYOUTS.iter().find_map(|(regex, order)| {
        let caps = regex.captures(value)?;
        let (a, b, c) = (caps.get(1)?.as_str(), caps.get(2)?.as_str(), caps.get(3)?.as_str());
        let (year, month, day) = match order {
            DateOrder::YearMonthDay => (a.parse().ok()?, b.parse().ok()?, c.parse().ok()?),
            DateOrder::MonthDayYear => (c.parse().ok()?, a.parse().ok()?, b.parse().ok()?),
            DateOrder::DayMonthYear => (c.parse().ok()?, b.parse().ok()?, a.parse().ok()?),
            DateOrder::DayMonthNameYear => (c.parse().ok()?, month_number(b)?, a.parse().ok()?),
        };
        NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
    })
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

/// Monetary amount with exactly two decimals.
///
/// When both `,` and `.` appear the comma is a thousands separator. A lone
/// comma followed by at most two digits is a decimal separator.
pub fn normalize_amount(value: &str) -> Option<String> {
    let cleaned = NON_AMOUNT_CHARS.replace_all(value, "");
    if cleaned.is_empty() {
        return None;
    }

    let numeric = match (cleaned.contains(','), cleaned.contains('.')) {
        (true, true) => cleaned.replace(',', ""),
        (true, false) => {
            let parts: Vec<&str> = cleaned.split(',').collect();
            if parts.len() == 2 && parts[1].len() <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned.into_owned(),
    };

    let amount: f64 = numeric.parse().ok()?;
    amount.is_finite().then(|| format!("{amount:.2}"))
}

/// Weight with units removed, formatted like an amount.
pub fn normalize_weight(value: &str) -> Option<String> {
    let stripped = WEIGHT_UNITS.replace_all(value, "");
    let number = NUMBER_RUN.find(stripped.trim())?;
    normalize_amount(number.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_layouts() {
        assert_eq!(normalize_date("2024-12-18").as_deref(), Some("2024-12-18"));
        assert_eq!(normalize_date("12/18/2024").as_deref(), Some("2024-12-18"));
        assert_eq!(normalize_date("12-18-2024").as_deref(), Some("2024-12-18"));
        assert_eq!(normalize_date("18.12.2024").as_deref(), Some("2024-12-18"));
        assert_eq!(normalize_date("Date: 8 Dec 2024").as_deref(), Some("2024-12-08"));
        assert_eq!(normalize_date("8 DEC 2024").as_deref(), Some("2024-12-08"));
    }

    #[test]
    fn impossible_date_is_rejected() {
        assert_eq!(normalize_date("13/45/2024"), None);
        assert_eq!(normalize_date("tomorrow"), None);
    }

    #[test]
    fn amount_heuristics() {
        assert_eq!(normalize_amount("USD 1,234.5").as_deref(), Some("1234.50"));
        assert_eq!(normalize_amount("12,5").as_deref(), Some("12.50"));
        assert_eq!(normalize_amount("1,234").as_deref(), Some("1234.00"));
        assert_eq!(normalize_amount("-40").as_deref(), Some("-40.00"));
        assert_eq!(normalize_amount("n/a"), None);
    }

    #[test]
    fn weight_strips_units() {
        assert_eq!(normalize_weight("1,250 KGS").as_deref(), Some("1250.00"));
        assert_eq!(normalize_weight("12.5 lb.").as_deref(), Some("12.50"));
    }

    #[test]
    fn field_name_selects_strategy() {
        let normalizer = ValueNormalizer::new();
        assert_eq!(normalizer.normalize("invoice_date", " 18.12.2024 "), "2024-12-18");
        assert_eq!(normalizer.normalize("total_amount", "$ 99"), "99.00");
        assert_eq!(normalizer.normalize("gross_weight", "3 kg"), "3.00");
        assert_eq!(normalizer.normalize("invoice_number", "  INV-1 "), "INV-1");
        assert_eq!(normalizer.normalize("invoice_date", "pending"), "pending");
    }
}
