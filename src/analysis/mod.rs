pub mod technicals;
pub mod risk_metric;
pub mod signals;

pub use signals::{composite_risk, determine_signal, RiskAssessment, Signal, StressMetric};
pub use technicals::{CryptoIndicators, Trend};
