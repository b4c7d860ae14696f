//! Fill type: one directional token movement for one wallet.

use crate::domain::{Address, Decimal, Direction, FillKey, TimeMs};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Token metadata carried on every fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        TokenInfo {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A single token fill extracted from an on-chain event.
///
/// Immutable once constructed; identity is `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub key: FillKey,
    pub wallet: Address,
    pub token: TokenInfo,
    pub direction: Direction,
    /// Token amount in whole units (already scaled by `token.decimals`).
    pub amount: Decimal,
    /// USD price per unit at fill time, if the price source had one.
    pub price_usd: Option<Decimal>,
    /// `amount * price_usd`, or None when unpriced.
    pub value_usd: Option<Decimal>,
    pub block_number: i64,
    pub timestamp: TimeMs,
    pub gas_cost_usd: Decimal,
    pub counterparty: Option<Address>,
}

impl Fill {
    /// Create a new Fill; `value_usd` is derived from amount and price.
    ///
    /// A price whose product with `amount` overflows is dropped and the
    /// fill is treated as unpriced. Importers reject such rows up front.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: FillKey,
        wallet: Address,
        token: TokenInfo,
        direction: Direction,
        amount: Decimal,
        price_usd: Option<Decimal>,
        block_number: i64,
        timestamp: TimeMs,
        gas_cost_usd: Decimal,
        counterparty: Option<Address>,
    ) -> Self {
        let (price_usd, value_usd) = match price_usd.map(|px| (px, px.checked_mul(amount))) {
            Some((px, Some(value))) => (Some(px), Some(value)),
            Some((px, None)) => {
                warn!(
                    fill = %key,
                    price = %px,
                    amount = %amount,
                    "Fill value overflows, dropping price"
                );
                (None, None)
            }
            None => (None, None),
        };
        Fill {
            key,
            wallet,
            token,
            direction,
            amount,
            price_usd,
            value_usd,
            block_number,
            timestamp,
            gas_cost_usd,
            counterparty,
        }
    }

    /// USD value, treating an unpriced fill as worth zero.
    pub fn value_or_zero(&self) -> Decimal {
        self.value_usd.unwrap_or_default()
    }

    pub fn is_priced(&self) -> bool {
        self.price_usd.is_some()
    }

    pub fn is_buy(&self) -> bool {
        self.direction == Direction::Buy
    }
}
