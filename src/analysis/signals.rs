use serde::{Serialize, Deserialize};

// =============================================================================
// STRESS SIGNAL ENGINE
// Maps raw risk readings onto a four-step stress ladder and blends them
// into a composite risk level
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    #[serde(rename = "CRITICAL SHOCK")]
    CriticalShock,
    #[serde(rename = "HIGH STRESS")]
    HighStress,
    #[serde(rename = "RISING STRESS")]
    RisingStress,
    #[serde(rename = "NORMAL")]
    Normal,
}

impl Signal {
    pub fn weight(&self) -> f64 {
        match self {
            Signal::CriticalShock => 100.0,
            Signal::HighStress => 75.0,
            Signal::RisingStress => 40.0,
            Signal::Normal => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressMetric {
    BidToCover,
    UsdJpy,
    UsdCnh,
    TenYearYield,
    Move,
    Vix,
}

impl StressMetric {
    pub fn label(&self) -> &'static str {
        match self {
            StressMetric::BidToCover => "10Y Treasury Bid-to-Cover",
            StressMetric::UsdJpy => "USD/JPY",
            StressMetric::UsdCnh => "USD/CNH",
            StressMetric::TenYearYield => "10Y Treasury Yield",
            StressMetric::Move => "MOVE Index",
            StressMetric::Vix => "VIX",
        }
    }

    pub fn format(&self, value: f64) -> String {
        match self {
            StressMetric::BidToCover => format!("{:.2}x", value),
            StressMetric::UsdCnh => format!("{:.4}", value),
            StressMetric::TenYearYield => format!("{:.2}%", value),
            _ => format!("{:.2}", value),
        }
    }
}

/// Rising-stress boundaries are strict for FX and vol, inclusive for the 10Y yield.
pub fn determine_signal(metric: StressMetric, value: f64) -> Signal {
    match metric {
        // Weak auction demand is the stress direction
        StressMetric::BidToCover => {
            if value < 2.0 {
                Signal::CriticalShock
            } else if value < 2.3 {
                Signal::HighStress
            } else {
                Signal::Normal
            }
        }
        StressMetric::UsdJpy => ladder(value, 155.0, 150.0, |v| v > 145.0),
        StressMetric::UsdCnh => ladder(value, 7.4, 7.25, |v| v > 7.15),
        StressMetric::TenYearYield => ladder(value, 5.0, 4.5, |v| v >= 4.2),
        StressMetric::Move => ladder(value, 120.0, 90.0, |v| v > 80.0),
        StressMetric::Vix => ladder(value, 40.0, 30.0, |v| v > 20.0),
    }
}

fn ladder(value: f64, critical: f64, high: f64, rising: impl Fn(f64) -> bool) -> Signal {
    if value >= critical {
        Signal::CriticalShock
    } else if value >= high {
        Signal::HighStress
    } else if rising(value) {
        Signal::RisingStress
    } else {
        Signal::Normal
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    Elevated,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::Elevated => "ELEVATED",
            RiskLevel::Low => "LOW",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "#dc3545",
            RiskLevel::Elevated => "#ffc107",
            RiskLevel::Low => "#28a745",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    /// Free-form so an AI override can replace it verbatim
    pub level: String,
    pub color: String,
}

/// Unrounded mean signal weight, 0 when nothing was measured.
pub fn composite_score(signals: &[Signal]) -> f64 {
    if signals.is_empty() {
        0.0
    } else {
        signals.iter().map(Signal::weight).sum::<f64>() / signals.len() as f64
    }
}

pub fn composite_risk(signals: &[Signal]) -> RiskAssessment {
    let score = composite_score(signals);

    let level = if score >= 60.0 {
        RiskLevel::Critical
    } else if score >= 35.0 {
        RiskLevel::Elevated
    } else {
        RiskLevel::Low
    };

    RiskAssessment {
        score: (score * 10.0).round() / 10.0,
        level: level.as_str().to_string(),
        color: level.color().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpy_ladder_boundaries() {
        assert_eq!(determine_signal(StressMetric::UsdJpy, 155.0), Signal::CriticalShock);
        assert_eq!(determine_signal(StressMetric::UsdJpy, 150.0), Signal::HighStress);
        assert_eq!(determine_signal(StressMetric::UsdJpy, 145.0), Signal::Normal);
        assert_eq!(determine_signal(StressMetric::UsdJpy, 145.01), Signal::RisingStress);
    }

    #[test]
    fn test_yield_rising_is_inclusive() {
        assert_eq!(determine_signal(StressMetric::TenYearYield, 4.2), Signal::RisingStress);
        assert_eq!(determine_signal(StressMetric::TenYearYield, 4.19), Signal::Normal);
        assert_eq!(determine_signal(StressMetric::TenYearYield, 5.0), Signal::CriticalShock);
    }

    #[test]
    fn test_bid_to_cover_is_inverted() {
        assert_eq!(determine_signal(StressMetric::BidToCover, 1.9), Signal::CriticalShock);
        assert_eq!(determine_signal(StressMetric::BidToCover, 2.0), Signal::HighStress);
        assert_eq!(determine_signal(StressMetric::BidToCover, 2.3), Signal::Normal);
    }

    #[test]
    fn test_vol_and_cnh() {
        assert_eq!(determine_signal(StressMetric::Vix, 20.0), Signal::Normal);
        assert_eq!(determine_signal(StressMetric::Vix, 31.0), Signal::HighStress);
        assert_eq!(determine_signal(StressMetric::Move, 85.0), Signal::RisingStress);
        assert_eq!(determine_signal(StressMetric::UsdCnh, 7.2), Signal::RisingStress);
        assert_eq!(determine_signal(StressMetric::UsdCnh, 7.4), Signal::CriticalShock);
    }

    #[test]
    fn test_composite_levels() {
        let low = composite_risk(&[Signal::Normal, Signal::RisingStress]);
        assert_eq!(low.score, 20.0);
        assert_eq!(low.level, "LOW");
        assert_eq!(low.color, "#28a745");

        let elevated = composite_risk(&[Signal::HighStress, Signal::Normal, Signal::RisingStress]);
        assert_eq!(elevated.score, 38.3);
        assert_eq!(elevated.level, "ELEVATED");

        let critical = composite_risk(&[Signal::CriticalShock, Signal::HighStress]);
        assert_eq!(critical.score, 87.5);
        assert_eq!(critical.level, "CRITICAL");
    }

    #[test]
    fn test_composite_score_is_unrounded() {
        let signals = [Signal::HighStress, Signal::CriticalShock, Signal::CriticalShock, Signal::Normal];
        assert_eq!(composite_score(&signals), 68.75);
        assert_eq!(composite_risk(&signals).score, 68.8);
        assert_eq!(composite_score(&[]), 0.0);
    }

    #[test]
    fn test_composite_empty_is_low() {
        let risk = composite_risk(&[]);
        assert_eq!(risk.score, 0.0);
        assert_eq!(risk.level, "LOW");
    }

    #[test]
    fn test_signal_serializes_with_spaces() {
        let json = serde_json::to_string(&Signal::HighStress).unwrap();
        assert_eq!(json, "\"HIGH STRESS\"");
    }

    #[test]
    fn test_metric_formatting() {
        assert_eq!(StressMetric::BidToCover.format(2.456), "2.46x");
        assert_eq!(StressMetric::UsdCnh.format(7.12345), "7.1235");
        assert_eq!(StressMetric::TenYearYield.format(4.3), "4.30%");
    }
}
