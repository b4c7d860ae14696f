use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Address, Decimal, Fill};

use super::lot_tracker::{LotTracker, ProcessOutcome};
use super::prices::PriceLookup;
use super::EngineError;

/// Portfolio state of one wallet at the end of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub wallet: Address,
    pub date: NaiveDate,
    pub portfolio_value_usd: Decimal,
    pub realized_pnl_usd: Decimal,
    /// Portfolio value minus capital invested to date.
    pub unrealized_pnl_usd: Decimal,
    pub total_invested_usd: Decimal,
    /// Set when at least one held token had no price for this date; its
    /// contribution to `portfolio_value_usd` is then zero.
    pub partial: bool,
    pub missing_prices: u32,
}

/// Builds daily equity curves by replaying a wallet's fill history.
pub struct EquityCurveBuilder<'a> {
    prices: &'a dyn PriceLookup,
}

impl<'a> EquityCurveBuilder<'a> {
    pub fn new(prices: &'a dyn PriceLookup) -> Self {
        Self { prices }
    }

    /// One point per calendar day in `[start, end]`.
    ///
    /// `fills` must be the wallet's full ordered history (not only the
    /// window), since holdings at `start` depend on everything before it.
    ///
    /// # Errors
    /// Propagates lot tracker contract violations (ordering, wallet mismatch).
    pub fn build(
        &self,
        wallet: &Address,
        fills: &[Fill],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EquityPoint>, EngineError> {
        let mut points = Vec::new();
        if start > end {
            return Ok(points);
        }

        let mut tracker = LotTracker::new(wallet.clone());
        let mut cursor = 0usize;
        let mut invested = Decimal::zero();
        let mut realized = Decimal::zero();
        let mut realized_upto = 0usize;

        let mut date = start;
        loop {
            while let Some(fill) = fills.get(cursor) {
                if fill.timestamp.date() > date {
                    break;
                }
                if tracker.process(fill)? == ProcessOutcome::Opened {
                    invested += fill.value_or_zero();
                }
                cursor += 1;
            }

            let closed = tracker.closed_lots();
            realized += closed[realized_upto..]
                .iter()
                .map(|lot| lot.net_pnl_usd)
                .sum::<Decimal>();
            realized_upto = closed.len();

            let (portfolio_value, missing_prices) = self.value_holdings(&tracker, date);

            points.push(EquityPoint {
                wallet: wallet.clone(),
                date,
                portfolio_value_usd: portfolio_value,
                realized_pnl_usd: realized,
                unrealized_pnl_usd: portfolio_value - invested,
                total_invested_usd: invested,
                partial: missing_prices > 0,
                missing_prices,
            });

            match date.succ_opt() {
                Some(next) if next <= end => date = next,
                _ => break,
            }
        }

        Ok(points)
    }

    fn value_holdings(&self, tracker: &LotTracker, date: NaiveDate) -> (Decimal, u32) {
        let mut value = Decimal::zero();
        let mut missing = 0u32;

        for (token, amount) in tracker.open_positions() {
            if !amount.is_positive() {
                continue;
            }
            match self.prices.price_on(token, date) {
                Some(price) => value += amount * price,
                None => {
                    debug!(wallet = %tracker.wallet(), token = %token, %date, "Missing price, valuing at zero");
                    missing += 1;
                }
            }
        }

        (value, missing)
    }
}

/// Number of partial points in a curve.
pub fn count_partial(points: &[EquityPoint]) -> usize {
    points.iter().filter(|p| p.partial).count()
}
