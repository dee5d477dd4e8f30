use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Category {
    Risk,   // The Shield
    Crypto, // The Coin
    Macro,  // The Map
}

/// How a value should be displayed in dashboards
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum UnitType {
    /// Index level, 2 decimals
    Index,
    /// FX rate where the 4th decimal matters (USD/CNH)
    FxPrecise,
    /// Yield in percent
    Percent,
    UsdPrice,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerMetadata {
    pub key: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub unit: UnitType,
}

macro_rules! ticker {
    ($key:expr, $symbol:expr, $name:expr, $cat:expr, $unit:expr) => {
        TickerMetadata {
            key: $key,
            symbol: $symbol,
            name: $name,
            category: $cat,
            unit: $unit,
        }
    };
}

// Order matters: it is the order prices are requested in.
static TICKERS: Lazy<Vec<TickerMetadata>> = Lazy::new(|| {
    vec![
        ticker!("JPY", "JPY=X", "USD/JPY", Category::Risk, UnitType::Index),
        ticker!("CNH", "CNH=X", "USD/CNH", Category::Risk, UnitType::FxPrecise),
        ticker!("TNX", "^TNX", "10Y Treasury Yield", Category::Risk, UnitType::Percent),
        ticker!("MOVE", "^MOVE", "MOVE Index", Category::Risk, UnitType::Index),
        ticker!("VIX", "^VIX", "VIX", Category::Risk, UnitType::Index),
        ticker!("CBON", "CBON", "China Bond ETF", Category::Risk, UnitType::UsdPrice),
        ticker!("BTC", "BTC-USD", "Bitcoin", Category::Crypto, UnitType::UsdPrice),
        ticker!("ETH", "ETH-USD", "Ethereum", Category::Crypto, UnitType::UsdPrice),
        ticker!("DXY", "DX-Y.NYB", "US Dollar Index", Category::Macro, UnitType::Index),
        ticker!("GOLD", "GC=F", "Gold Futures", Category::Macro, UnitType::UsdPrice),
        ticker!("OIL", "CL=F", "WTI Crude", Category::Macro, UnitType::UsdPrice),
        ticker!("SP500", "^GSPC", "S&P 500", Category::Macro, UnitType::Index),
        ticker!("TASI", "^TASI.SR", "Tadawul All Share", Category::Macro, UnitType::Index),
    ]
});

static TICKER_MAP: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    TICKERS
        .iter()
        .enumerate()
        .map(|(idx, t)| (t.key, idx))
        .collect()
});

/// Coins that get full weekly indicator treatment.
pub const INDICATOR_COINS: [&str; 2] = ["BTC-USD", "ETH-USD"];

pub struct Registry;

impl Registry {
    pub fn all() -> &'static [TickerMetadata] {
        &TICKERS
    }

    pub fn get(key: &str) -> Option<&'static TickerMetadata> {
        TICKER_MAP.get(key).map(|&idx| &TICKERS[idx])
    }

    pub fn by_category(category: Category) -> Vec<&'static TickerMetadata> {
        TICKERS.iter().filter(|t| t.category == category).collect()
    }

    /// `(key, symbol)` pairs for the price fan-out.
    pub fn symbols() -> Vec<(&'static str, &'static str)> {
        TICKERS.iter().map(|t| (t.key, t.symbol)).collect()
    }
}

/// Render a value according to its unit.
pub fn format_value(unit: UnitType, value: f64) -> String {
    match unit {
        UnitType::Index => format!("{:.2}", value),
        UnitType::FxPrecise => format!("{:.4}", value),
        UnitType::Percent => format!("{:.2}%", value),
        UnitType::UsdPrice => format!("${}", format_thousands(value, 2)),
    }
}

/// `1234567.891` -> `1,234,567.89`
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (raw.clone(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && raw.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_market_tickers() {
        assert_eq!(Registry::all().len(), 13);
        assert_eq!(Registry::get("DXY").unwrap().symbol, "DX-Y.NYB");
        assert_eq!(Registry::get("TASI").unwrap().symbol, "^TASI.SR");
        assert!(Registry::get("DOGE").is_none());
    }

    #[test]
    fn test_by_category() {
        let risk: Vec<_> = Registry::by_category(Category::Risk).iter().map(|t| t.key).collect();
        assert_eq!(risk, vec!["JPY", "CNH", "TNX", "MOVE", "VIX", "CBON"]);
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(97123.4, 0), "97,123");
        assert_eq!(format_thousands(999.0, 0), "999");
        assert_eq!(format_thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_thousands(-1500.0, 0), "-1,500");
    }

    #[test]
    fn test_format_value_units() {
        assert_eq!(format_value(UnitType::FxPrecise, 7.12345), "7.1235");
        assert_eq!(format_value(UnitType::Percent, 4.256), "4.26%");
        assert_eq!(format_value(UnitType::UsdPrice, 2650.5), "$2,650.50");
    }
}
