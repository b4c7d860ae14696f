//! Composite wallet scoring.
//!
//! Six sub-scores, each bounded to [0, 100], are combined with a weight
//! vector that sums to 1. Breakpoints and weights are tunable; the defaults
//! below are the production configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Address, Decimal};

use super::performance::PerformanceMetrics;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("scoring weights must sum to 1.0, got {0}")]
    WeightsDoNotSumToOne(f64),
    #[error("scoring weight {name} must be a finite non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
}

/// Relative importance of each sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub roi: f64,
    pub volume: f64,
    pub consistency: f64,
    pub risk: f64,
    pub activity: f64,
    pub efficiency: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            roi: 0.30,
            volume: 0.20,
            consistency: 0.20,
            risk: 0.15,
            activity: 0.10,
            efficiency: 0.05,
        }
    }
}

impl ScoringWeights {
    /// # Errors
    /// Rejects negative or non-finite weights and vectors not summing to 1.
    pub fn validate(&self) -> Result<(), ScoringError> {
        let named = [
            ("roi", self.roi),
            ("volume", self.volume),
            ("consistency", self.consistency),
            ("risk", self.risk),
            ("activity", self.activity),
            ("efficiency", self.efficiency),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidWeight { name, value });
            }
        }
        let sum: f64 = named.iter().map(|(_, v)| v).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringError::WeightsDoNotSumToOne(sum));
        }
        Ok(())
    }
}

/// Coarse bucket for a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreCategory {
    Excellent,
    Good,
    Average,
    Poor,
}

impl ScoreCategory {
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 80.0 {
            ScoreCategory::Excellent
        } else if composite >= 60.0 {
            ScoreCategory::Good
        } else if composite >= 40.0 {
            ScoreCategory::Average
        } else {
            ScoreCategory::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::Excellent => "excellent",
            ScoreCategory::Good => "good",
            ScoreCategory::Average => "average",
            ScoreCategory::Poor => "poor",
        }
    }
}

impl std::fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScoreCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(ScoreCategory::Excellent),
            "good" => Ok(ScoreCategory::Good),
            "average" => Ok(ScoreCategory::Average),
            "poor" => Ok(ScoreCategory::Poor),
            other => Err(format!("unknown score category: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub wallet: Address,
    pub window_days: u32,
    pub roi_score: f64,
    pub volume_score: f64,
    pub consistency_score: f64,
    pub risk_score: f64,
    pub activity_score: f64,
    pub efficiency_score: f64,
    /// Weighted sum of the sub-scores, rounded to two decimals.
    pub composite: f64,
    pub category: ScoreCategory,
}

impl CompositeScore {
    fn zero(wallet: Address, window_days: u32) -> Self {
        Self {
            wallet,
            window_days,
            roi_score: 0.0,
            volume_score: 0.0,
            consistency_score: 0.0,
            risk_score: 0.0,
            activity_score: 0.0,
            efficiency_score: 0.0,
            composite: 0.0,
            category: ScoreCategory::Poor,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    weights: ScoringWeights,
}

impl CompositeScorer {
    /// # Errors
    /// Returns [`ScoringError`] when the weights fail validation.
    pub fn new(weights: ScoringWeights) -> Result<Self, ScoringError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Score a metrics record. A wallet without closed trades scores zero
    /// across the board.
    pub fn score(&self, metrics: &PerformanceMetrics) -> CompositeScore {
        if metrics.is_empty() {
            return CompositeScore::zero(metrics.wallet.clone(), metrics.window_days);
        }

        let roi_score = roi_score(metrics.avg_roi_pct);
        let volume_score = volume_score(metrics.total_volume_usd);
        let consistency_score = consistency_score(metrics.win_rate_pct);
        let risk_score = risk_score(metrics.sharpe_ratio, metrics.max_drawdown_pct);
        let activity_score = activity_score(metrics.trade_count, metrics.window_days);
        let efficiency_score = efficiency_score(metrics.gas_cost_pct);

        let w = &self.weights;
        let weighted = roi_score * w.roi
            + volume_score * w.volume
            + consistency_score * w.consistency
            + risk_score * w.risk
            + activity_score * w.activity
            + efficiency_score * w.efficiency;
        let composite = round2(clamp_score(weighted));

        CompositeScore {
            wallet: metrics.wallet.clone(),
            window_days: metrics.window_days,
            roi_score,
            volume_score,
            consistency_score,
            risk_score,
            activity_score,
            efficiency_score,
            composite,
            category: ScoreCategory::from_composite(composite),
        }
    }
}

/// Clamp into [0, 100]; NaN maps to 0.
fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn roi_score(avg_roi_pct: Decimal) -> f64 {
    clamp_score(avg_roi_pct.to_f64())
}

fn volume_score(total_volume_usd: Decimal) -> f64 {
    let volume = total_volume_usd.to_f64();
    if volume >= 1_000_000.0 {
        100.0
    } else if volume >= 100_000.0 {
        80.0
    } else if volume >= 10_000.0 {
        60.0
    } else if volume >= 1_000.0 {
        40.0
    } else {
        20.0
    }
}

fn consistency_score(win_rate_pct: Decimal) -> f64 {
    clamp_score(win_rate_pct.to_f64() * 1.25)
}

fn risk_score(sharpe: f64, max_drawdown_pct: Decimal) -> f64 {
    let sharpe_part = if sharpe.is_finite() {
        clamp_score(sharpe * 20.0)
    } else {
        0.0
    };
    let drawdown_part = clamp_score(100.0 - max_drawdown_pct.to_f64() * 2.0);
    (sharpe_part + drawdown_part) / 2.0
}

fn activity_score(trade_count: u32, window_days: u32) -> f64 {
    let trades_per_day = f64::from(trade_count) / f64::from(window_days.max(1));
    if trades_per_day >= 1.0 {
        100.0
    } else if trades_per_day >= 0.5 {
        80.0
    } else if trades_per_day >= 0.1 {
        60.0
    } else {
        40.0
    }
}

fn efficiency_score(gas_cost_pct: Decimal) -> f64 {
    let gas_pct = gas_cost_pct.to_f64();
    if gas_pct <= 1.0 {
        100.0
    } else if gas_pct <= 2.0 {
        80.0
    } else if gas_pct <= 5.0 {
        60.0
    } else {
        40.0
    }
}
