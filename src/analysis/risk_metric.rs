//! Logarithmic regression risk metric.
//!
//! Fits `ln(price) = a + b * ln(t)` over the whole history, measures each
//! close's deviation from that fair value, and normalises the deviation to
//! 0..1 against a rolling window (~4 years of weekly candles).

use serde::{Serialize, Deserialize};

const ROLLING_WINDOW: usize = 200;
const MIN_PERIODS: usize = 50;
const HISTORY_LEN: usize = 52;
const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskMetric {
    pub current: f64,
    pub previous: f64,
    pub history: Vec<f64>,
    pub fair_value: Option<f64>,
}

impl RiskMetric {
    pub fn fallback() -> Self {
        RiskMetric {
            current: NEUTRAL,
            previous: NEUTRAL,
            history: vec![NEUTRAL; HISTORY_LEN],
            fair_value: None,
        }
    }

    pub fn is_rising(&self) -> bool {
        self.current > self.previous
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskZone {
    Accumulation,
    Neutral,
    Distribution,
}

impl RiskZone {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskZone::Accumulation => "accumulation",
            RiskZone::Neutral => "neutral",
            RiskZone::Distribution => "distribution",
        }
    }
}

pub fn zone(risk: f64) -> RiskZone {
    if risk < 0.4 {
        RiskZone::Accumulation
    } else if risk > 0.7 {
        RiskZone::Distribution
    } else {
        RiskZone::Neutral
    }
}

/// Least-squares line through `(x, y)`. Returns `(slope, intercept)`.
fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x).powi(2);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

fn rolling_normalize(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(ROLLING_WINDOW);
            let window = &values[start..=i];
            if window.len() < MIN_PERIODS {
                return None;
            }
            let lo = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let range = hi - lo;
            if range == 0.0 {
                return None;
            }
            Some(((values[i] - lo) / range).clamp(0.0, 1.0))
        })
        .collect()
}

pub fn calculate(closes: &[f64]) -> RiskMetric {
    let prices: Vec<f64> = closes
        .iter()
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect();

    let log_time: Vec<f64> = (1..=prices.len()).map(|t| (t as f64).ln()).collect();
    let log_price: Vec<f64> = prices.iter().map(|p| p.ln()).collect();

    let Some((slope, intercept)) = linear_fit(&log_time, &log_price) else {
        tracing::warn!("Risk metric fit failed on {} points, using neutral fallback", prices.len());
        return RiskMetric::fallback();
    };

    let fair: Vec<f64> = log_time.iter().map(|lt| (intercept + slope * lt).exp()).collect();
    let deviation: Vec<f64> = prices
        .iter()
        .zip(&fair)
        .map(|(p, f)| (p - f) / f)
        .collect();

    let risk = rolling_normalize(&deviation);
    let tail_start = risk.len().saturating_sub(HISTORY_LEN);
    let history = risk[tail_start..].iter().map(|r| r.unwrap_or(NEUTRAL)).collect();

    let current = risk.last().copied().flatten().unwrap_or(NEUTRAL);
    let previous = risk.len().checked_sub(2).and_then(|i| risk[i]).unwrap_or(NEUTRAL);

    RiskMetric {
        current,
        previous,
        history,
        fair_value: fair.last().copied(),
    }
}
