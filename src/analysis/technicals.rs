use serde::{Serialize, Deserialize};
use std::fmt;

use crate::models::Candle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Trend {
    Bullish,
    Bearish,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "Bullish"),
            Trend::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Position of price relative to the Bull Market Support Band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BandStatus {
    Above,
    Below,
    Inside,
}

impl BandStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            BandStatus::Above => "Above (bullish structure)",
            BandStatus::Below => "Below (bearish structure)",
            BandStatus::Inside => "Inside (choppy/neutral)",
        }
    }
}

/// Indicators computed over the latest row of a weekly close series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoIndicators {
    pub price: f64,
    pub prev_close: Option<f64>,
    pub sma_20: Option<f64>,
    pub ema_21: Option<f64>,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub rsi: Option<f64>,
    /// Price vs SMA20
    pub trend: Trend,
}

impl CryptoIndicators {
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        let price = *closes.last()?;
        let sma_20 = calculate_sma(closes, 20);

        Some(CryptoIndicators {
            price,
            prev_close: closes.len().checked_sub(2).map(|i| closes[i]),
            sma_20,
            ema_21: calculate_ema(closes, 21),
            ma50: calculate_sma(closes, 50),
            ma200: calculate_sma(closes, 200),
            rsi: calculate_rsi(closes, 14),
            trend: trend_vs(price, sma_20),
        })
    }

    /// Slower weekly trend: price vs the 50-week average.
    pub fn weekly_trend(&self) -> Trend {
        trend_vs(self.price, self.ma50)
    }
}

fn trend_vs(price: f64, reference: Option<f64>) -> Trend {
    match reference {
        Some(r) if price > r => Trend::Bullish,
        _ => Trend::Bearish,
    }
}

/// Rolling mean. `None` until `period` values are available.
pub fn sma_series(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return out;
    }

    let mut window_sum: f64 = data[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);
    for i in period..data.len() {
        window_sum += data[i] - data[i - period];
        out[i] = Some(window_sum / period as f64);
    }
    out
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the first value.
pub fn ema_series(data: &[f64], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    let mut prev: Option<f64> = None;

    for &x in data {
        let next = match prev {
            None => x,
            Some(p) => alpha * x + (1.0 - alpha) * p,
        };
        prev = Some(next);
        out.push(Some(next));
    }
    out
}

/// RSI from simple rolling means of gains and losses over `period` diffs.
pub fn rsi_series(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return out;
    }

    let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = diffs.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = diffs.iter().map(|d| (-d).max(0.0)).collect();

    let avg_gains = sma_series(&gains, period);
    let avg_losses = sma_series(&losses, period);

    // diff i corresponds to price index i + 1
    for i in 0..diffs.len() {
        if let (Some(g), Some(l)) = (avg_gains[i], avg_losses[i]) {
            out[i + 1] = rsi_from_averages(g, l);
        }
    }
    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

pub fn calculate_sma(data: &[f64], period: usize) -> Option<f64> {
    sma_series(data, period).last().copied().flatten()
}

pub fn calculate_ema(data: &[f64], span: usize) -> Option<f64> {
    ema_series(data, span).last().copied().flatten()
}

pub fn calculate_rsi(data: &[f64], period: usize) -> Option<f64> {
    rsi_series(data, period).last().copied().flatten()
}

/// Heikin-Ashi trend of the latest candle.
pub fn heikin_ashi_trend(candles: &[Candle]) -> Option<Trend> {
    let [.., prev, last] = candles else {
        return None;
    };
    let ha_close = (last.open + last.high + last.low + last.close) / 4.0;
    let ha_open = (prev.open + prev.close) / 2.0;
    Some(if ha_close > ha_open { Trend::Bullish } else { Trend::Bearish })
}

pub fn bmsb_status(price: f64, sma_20: f64, ema_21: f64) -> BandStatus {
    if price > sma_20.max(ema_21) {
        BandStatus::Above
    } else if price < sma_20.min(ema_21) {
        BandStatus::Below
    } else {
        BandStatus::Inside
    }
}

/// Percent change of the last value against the value `lookback` positions from the end
/// (or the first value for short series). Zero base yields 0.
pub fn change_pct(series: &[f64], lookback: usize) -> Option<f64> {
    let latest = *series.last()?;
    let base = if lookback > 0 && series.len() >= lookback {
        series[series.len() - lookback]
    } else {
        series[0]
    };

    if base == 0.0 {
        return Some(0.0);
    }
    Some((latest - base) / base * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;

    #[test]
    fn test_sma_warmup_and_values() {
        let s = sma_series(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(s, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(calculate_sma(&[1.0, 2.0], 3), None);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        // span 3 -> alpha 0.5
        let e = ema_series(&[10.0, 20.0, 20.0], 3);
        assert_eq!(e[0], Some(10.0));
        assert_eq!(e[1], Some(15.0));
        assert_eq!(e[2], Some(17.5));
    }

    #[test]
    fn test_rsi_monotonic_rise_is_100() {
        let data: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        assert_eq!(calculate_rsi(&data, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_flat_series_is_undefined() {
        let data = vec![5.0; 20];
        assert_eq!(calculate_rsi(&data, 14), None);
    }

    #[test]
    fn test_rsi_balanced_moves_near_50() {
        // alternating +1 / -1
        let data: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let rsi = calculate_rsi(&data, 14).unwrap();
        assert_relative_eq!(rsi, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_warmup_length() {
        let data: Vec<f64> = (0..16).map(|i| (i as f64).sin() + 10.0).collect();
        let series = rsi_series(&data, 14);
        assert!(series[..14].iter().all(|v| v.is_none()));
        assert!(series[14].is_some());
    }

    #[test]
    fn test_crypto_indicators_trend() {
        let mut closes: Vec<f64> = vec![100.0; 25];
        closes.push(150.0);
        let ind = CryptoIndicators::from_closes(&closes).unwrap();
        assert_eq!(ind.trend, Trend::Bullish);
        assert_eq!(ind.prev_close, Some(100.0));
        assert!(ind.ma50.is_none());
        assert_eq!(ind.weekly_trend(), Trend::Bearish);
    }

    #[test]
    fn test_crypto_indicators_short_history_is_bearish() {
        let ind = CryptoIndicators::from_closes(&[10.0, 12.0]).unwrap();
        assert!(ind.sma_20.is_none());
        assert_eq!(ind.trend, Trend::Bearish);
        assert!(CryptoIndicators::from_closes(&[]).is_none());
    }

    #[test]
    fn test_heikin_ashi() {
        let c = |o: f64, h: f64, l: f64, cl: f64| Candle { timestamp: Utc::now(), open: o, high: h, low: l, close: cl };
        let candles = vec![c(100.0, 105.0, 95.0, 100.0), c(101.0, 110.0, 100.0, 109.0)];
        assert_eq!(heikin_ashi_trend(&candles), Some(Trend::Bullish));
        assert_eq!(heikin_ashi_trend(&candles[..1]), None);
    }

    #[test]
    fn test_bmsb_status() {
        assert_eq!(bmsb_status(110.0, 100.0, 105.0), BandStatus::Above);
        assert_eq!(bmsb_status(90.0, 100.0, 105.0), BandStatus::Below);
        assert_eq!(bmsb_status(102.0, 100.0, 105.0), BandStatus::Inside);
    }

    #[test]
    fn test_change_pct() {
        let series = [100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 110.0];
        // 6th from last is 101
        assert_relative_eq!(change_pct(&series, 6).unwrap(), (110.0 - 101.0) / 101.0 * 100.0);
        assert_relative_eq!(change_pct(&[50.0, 55.0], 6).unwrap(), 10.0);
        assert_eq!(change_pct(&[0.0, 5.0], 6), Some(0.0));
        assert_eq!(change_pct(&[], 6), None);
    }
}
