use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Address, Decimal, Direction, Fill, FillKey, TimeMs};

use super::{ClosedTradeLot, EngineError, OpenLot};

/// Unmatched inventory from a SELL that exhausted every known open lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oversell {
    pub fill_key: FillKey,
    pub token: Address,
    pub token_symbol: String,
    pub unmatched_amount: Decimal,
    pub timestamp: TimeMs,
}

/// What a single `process` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A BUY opened a new lot.
    Opened,
    /// A SELL was matched against `closed` lots; `oversold` is the unmatched remainder.
    Matched { closed: usize, oversold: Decimal },
    /// The fill key was already applied; nothing changed.
    Duplicate,
}

/// Resulting lot state for one wallet after a batch of fills.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LotBook {
    pub wallet: Option<Address>,
    pub open_lots: Vec<OpenLot>,
    pub closed_lots: Vec<ClosedTradeLot>,
    pub oversells: Vec<Oversell>,
    pub duplicates: usize,
}

impl LotBook {
    /// Total unmatched SELL amount reported for `token`.
    pub fn oversold_amount(&self, token: &Address) -> Decimal {
        self.oversells
            .iter()
            .filter(|o| &o.token == token)
            .map(|o| o.unmatched_amount)
            .sum()
    }

    /// Remaining (unsold) amount of `token` across open lots.
    pub fn open_amount(&self, token: &Address) -> Decimal {
        self.open_lots
            .iter()
            .filter(|l| &l.token == token)
            .map(|l| l.remaining_amount)
            .sum()
    }
}

/// FIFO lot tracker for a single wallet.
///
/// Sequential state machine: fills must arrive in non-decreasing timestamp
/// order and the tracker must not be shared across threads while in use.
pub struct LotTracker {
    wallet: Address,
    // Per token, oldest lot at the front.
    open_lots: BTreeMap<Address, VecDeque<OpenLot>>,
    seen: HashSet<FillKey>,
    last_timestamp: Option<TimeMs>,

    // Outputs accumulated during processing.
    closed_lots: Vec<ClosedTradeLot>,
    oversells: Vec<Oversell>,
    duplicates: usize,
}

impl LotTracker {
    pub fn new(wallet: Address) -> Self {
        Self {
            wallet,
            open_lots: BTreeMap::new(),
            seen: HashSet::new(),
            last_timestamp: None,
            closed_lots: Vec::new(),
            oversells: Vec::new(),
            duplicates: 0,
        }
    }

    pub fn wallet(&self) -> &Address {
        &self.wallet
    }

    /// Apply a single fill, updating open lots and emitting closed lots.
    ///
    /// # Errors
    /// Rejects fills for another wallet, non-positive amounts, and fills
    /// older than the last applied one. A rejected fill leaves state untouched.
    pub fn process(&mut self, fill: &Fill) -> Result<ProcessOutcome, EngineError> {
        if fill.wallet != self.wallet {
            return Err(EngineError::WalletMismatch {
                expected: self.wallet.clone(),
                got: fill.wallet.clone(),
                fill_key: fill.key.clone(),
            });
        }

        if self.seen.contains(&fill.key) {
            debug!(wallet = %self.wallet, fill_key = %fill.key, "Skipping already processed fill");
            self.duplicates += 1;
            return Ok(ProcessOutcome::Duplicate);
        }

        if !fill.amount.is_positive() {
            return Err(EngineError::NonPositiveAmount {
                fill_key: fill.key.clone(),
                amount: fill.amount,
            });
        }

        if let Some(previous) = self.last_timestamp {
            if fill.timestamp < previous {
                return Err(EngineError::OutOfOrder {
                    wallet: self.wallet.clone(),
                    fill_key: fill.key.clone(),
                    previous: previous.as_ms(),
                    got: fill.timestamp.as_ms(),
                });
            }
        }

        self.seen.insert(fill.key.clone());
        self.last_timestamp = Some(fill.timestamp);

        let outcome = match fill.direction {
            Direction::Buy => self.handle_buy(fill),
            Direction::Sell => self.handle_sell(fill),
        };
        Ok(outcome)
    }

    fn handle_buy(&mut self, fill: &Fill) -> ProcessOutcome {
        let lot = OpenLot {
            wallet: fill.wallet.clone(),
            token: fill.token.address.clone(),
            token_symbol: fill.token.symbol.clone(),
            entry_amount: fill.amount,
            remaining_amount: fill.amount,
            entry_price_usd: fill.price_usd.unwrap_or_default(),
            entry_value_usd: fill.value_or_zero(),
            entry_gas_cost_usd: fill.gas_cost_usd,
            entry_timestamp: fill.timestamp,
            entry_fill: fill.key.clone(),
        };

        self.open_lots
            .entry(fill.token.address.clone())
            .or_default()
            .push_back(lot);

        ProcessOutcome::Opened
    }

    /// Match a SELL against the token's open lots, oldest first.
    fn handle_sell(&mut self, fill: &Fill) -> ProcessOutcome {
        let token = &fill.token.address;
        let exit_price = fill.price_usd.unwrap_or_default();
        let exit_value_total = fill.value_or_zero();
        let mut remaining_to_sell = fill.amount;
        let mut closed = 0usize;

        if let Some(lots) = self.open_lots.get_mut(token) {
            while remaining_to_sell.is_positive() {
                let Some(lot) = lots.front_mut() else {
                    break;
                };

                let consumed = remaining_to_sell.min(lot.remaining_amount);
                let entry_ratio = consumed / lot.entry_amount;
                let exit_ratio = consumed / fill.amount;

                let entry_value = lot.entry_value_usd * entry_ratio;
                let entry_gas = lot.entry_gas_cost_usd * entry_ratio;
                let exit_value = exit_value_total * exit_ratio;
                let exit_gas = fill.gas_cost_usd * exit_ratio;

                let gross_pnl = exit_value - entry_value;
                let net_pnl = gross_pnl - entry_gas - exit_gas;
                let cost_basis = entry_value + entry_gas;
                let roi_percent = if cost_basis.is_positive() {
                    net_pnl / cost_basis * Decimal::hundred()
                } else {
                    Decimal::zero()
                };

                self.closed_lots.push(ClosedTradeLot {
                    id: closed_lot_id(&lot.entry_fill, &fill.key),
                    wallet: fill.wallet.clone(),
                    token: token.clone(),
                    token_symbol: fill.token.symbol.clone(),
                    trade_amount: consumed,
                    entry_price_usd: lot.entry_price_usd,
                    exit_price_usd: exit_price,
                    entry_timestamp: lot.entry_timestamp,
                    exit_timestamp: fill.timestamp,
                    hold_duration_days: fill.timestamp.whole_days_since(lot.entry_timestamp),
                    entry_value_usd: entry_value,
                    exit_value_usd: exit_value,
                    entry_gas_cost_usd: entry_gas,
                    exit_gas_cost_usd: exit_gas,
                    gross_pnl_usd: gross_pnl,
                    net_pnl_usd: net_pnl,
                    roi_percent,
                    entry_fill: lot.entry_fill.clone(),
                    exit_fill: fill.key.clone(),
                });
                closed += 1;

                lot.remaining_amount -= consumed;
                remaining_to_sell -= consumed;

                if lot.is_exhausted() {
                    lots.pop_front();
                }
            }

            if lots.is_empty() {
                self.open_lots.remove(token);
            }
        }

        let oversold = if remaining_to_sell.is_positive() {
            warn!(
                wallet = %self.wallet,
                token = %fill.token.symbol,
                fill_key = %fill.key,
                unmatched = %remaining_to_sell,
                "Oversell detected: sell exceeds known open lots"
            );
            self.oversells.push(Oversell {
                fill_key: fill.key.clone(),
                token: token.clone(),
                token_symbol: fill.token.symbol.clone(),
                unmatched_amount: remaining_to_sell,
                timestamp: fill.timestamp,
            });
            remaining_to_sell
        } else {
            Decimal::zero()
        };

        ProcessOutcome::Matched { closed, oversold }
    }

    /// Open lots across all tokens, grouped by token, oldest first within a token.
    pub fn open_lots(&self) -> impl Iterator<Item = &OpenLot> {
        self.open_lots.values().flat_map(|lots| lots.iter())
    }

    /// Remaining amount per token across open lots.
    pub fn open_positions(&self) -> impl Iterator<Item = (&Address, Decimal)> {
        self.open_lots
            .iter()
            .map(|(token, lots)| (token, lots.iter().map(|l| l.remaining_amount).sum::<Decimal>()))
    }

    pub fn closed_lots(&self) -> &[ClosedTradeLot] {
        &self.closed_lots
    }

    pub fn oversells(&self) -> &[Oversell] {
        &self.oversells
    }

    /// Consume the tracker and return the accumulated state.
    pub fn into_book(self) -> LotBook {
        let open_lots = self.open_lots.into_values().flatten().collect();
        LotBook {
            wallet: Some(self.wallet),
            open_lots,
            closed_lots: self.closed_lots,
            oversells: self.oversells,
            duplicates: self.duplicates,
        }
    }
}

/// Deterministic id for the (entry fill, exit fill) pair, so recomputation
/// yields the same ids and persistence stays an upsert.
fn closed_lot_id(entry: &FillKey, exit: &FillKey) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}|{}", entry, exit).as_bytes())
}

/// Batch-apply ordered fills for one wallet.
///
/// # Errors
/// Propagates the first contract violation reported by [`LotTracker::process`].
pub fn process_fills(wallet: &Address, fills: &[Fill]) -> Result<LotBook, EngineError> {
    let mut tracker = LotTracker::new(wallet.clone());
    for fill in fills {
        tracker.process(fill)?;
    }
    Ok(tracker.into_book())
}
