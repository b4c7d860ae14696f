//! Point-in-time price lookups consumed by the equity curve builder.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::{Address, Decimal};

/// Synchronous price lookup: USD price of `token` on `date`, if known.
pub trait PriceLookup {
    fn price_on(&self, token: &Address, date: NaiveDate) -> Option<Decimal>;
}

/// In-memory price table, typically prefetched from an async price source.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<(Address, NaiveDate), Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: Address, date: NaiveDate, price: Decimal) {
        self.prices.insert((token, date), price);
    }

    pub fn with_price(mut self, token: Address, date: NaiveDate, price: Decimal) -> Self {
        self.insert(token, date, price);
        self
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl PriceLookup for PriceTable {
    fn price_on(&self, token: &Address, date: NaiveDate) -> Option<Decimal> {
        self.prices.get(&(token.clone(), date)).copied()
    }
}

impl<F> PriceLookup for F
where
    F: Fn(&Address, NaiveDate) -> Option<Decimal>,
{
    fn price_on(&self, token: &Address, date: NaiveDate) -> Option<Decimal> {
        self(token, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_table_lookup() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let token = Address::new("0xToken");
        let table = PriceTable::new().with_price(token.clone(), date, Decimal::hundred());

        assert_eq!(table.price_on(&token, date), Some(Decimal::hundred()));
        assert_eq!(table.price_on(&token, date.succ_opt().unwrap()), None);
        assert_eq!(table.price_on(&Address::new("0xother"), date), None);
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |_: &Address, _: NaiveDate| Some(Decimal::one());
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(lookup.price_on(&Address::new("0x1"), date), Some(Decimal::one()));
    }
}
