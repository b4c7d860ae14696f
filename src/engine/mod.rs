//! Pure computation engine(s) for trade accounting and scoring.
//!
//! Every stage is synchronous and performs no I/O; prices come in through
//! the [`PriceLookup`] trait and persistence happens in the caller.

use crate::domain::{Address, Decimal, FillKey, TimeMs};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod equity;
pub mod lot_tracker;
pub mod performance;
pub mod prices;
pub mod scorer;

pub use equity::{EquityCurveBuilder, EquityPoint};
pub use lot_tracker::{process_fills, LotBook, LotTracker, Oversell, ProcessOutcome};
pub use performance::{
    max_drawdown_pct, sharpe_ratio, PerformanceCalculator, PerformanceMetrics, RiskParams,
};
pub use prices::{PriceLookup, PriceTable};
pub use scorer::{CompositeScore, CompositeScorer, ScoreCategory, ScoringError, ScoringWeights};

/// An un-fully-sold BUY, owned by the tracker for one (wallet, token) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLot {
    pub wallet: Address,
    pub token: Address,
    pub token_symbol: String,
    pub entry_amount: Decimal,
    /// Only ever decreases; the lot leaves the active set at zero.
    pub remaining_amount: Decimal,
    pub entry_price_usd: Decimal,
    pub entry_value_usd: Decimal,
    pub entry_gas_cost_usd: Decimal,
    pub entry_timestamp: TimeMs,
    pub entry_fill: FillKey,
}

impl OpenLot {
    pub fn is_exhausted(&self) -> bool {
        !self.remaining_amount.is_positive()
    }
}

/// One matched (entry lot fraction, exit fill fraction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTradeLot {
    pub id: Uuid,
    pub wallet: Address,
    pub token: Address,
    pub token_symbol: String,
    pub trade_amount: Decimal,
    pub entry_price_usd: Decimal,
    pub exit_price_usd: Decimal,
    pub entry_timestamp: TimeMs,
    pub exit_timestamp: TimeMs,
    pub hold_duration_days: i64,
    pub entry_value_usd: Decimal,
    pub exit_value_usd: Decimal,
    pub entry_gas_cost_usd: Decimal,
    pub exit_gas_cost_usd: Decimal,
    pub gross_pnl_usd: Decimal,
    pub net_pnl_usd: Decimal,
    pub roi_percent: Decimal,
    pub entry_fill: FillKey,
    pub exit_fill: FillKey,
}

impl ClosedTradeLot {
    pub fn is_win(&self) -> bool {
        self.net_pnl_usd.is_positive()
    }

    pub fn total_gas_usd(&self) -> Decimal {
        self.entry_gas_cost_usd + self.exit_gas_cost_usd
    }
}

/// Caller contract violations detected by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("fill {fill_key} at {got}ms is earlier than previously applied fill at {previous}ms for wallet {wallet}")]
    OutOfOrder {
        wallet: Address,
        fill_key: FillKey,
        previous: i64,
        got: i64,
    },
    #[error("fill {fill_key} belongs to wallet {got}, tracker owns {expected}")]
    WalletMismatch {
        expected: Address,
        got: Address,
        fill_key: FillKey,
    },
    #[error("fill {fill_key} has non-positive amount {amount}")]
    NonPositiveAmount { fill_key: FillKey, amount: Decimal },
}
