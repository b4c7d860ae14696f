//! Mock data source for testing without a backing store.

use super::{DataSourceError, FillSource, PriceSource};
use crate::domain::{Address, Decimal, Fill, TimeMs};
use crate::engine::{PriceLookup, PriceTable};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock data source that returns predefined test data.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    fills: Vec<Fill>,
    prices: PriceTable,
    failing_wallets: HashSet<Address>,
    delay: Option<Duration>,
    price_calls: Arc<AtomicUsize>,
}

impl MockDataSource {
    /// Create a new mock data source with empty data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fill to the mock data source.
    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fills.push(fill);
        self
    }

    /// Add multiple fills to the mock data source.
    pub fn with_fills(mut self, fills: Vec<Fill>) -> Self {
        self.fills.extend(fills);
        self
    }

    pub fn with_price(mut self, token: Address, date: NaiveDate, price: Decimal) -> Self {
        self.prices.insert(token, date, price);
        self
    }

    /// Same price for every day in `[start, end]`.
    pub fn with_flat_price(
        mut self,
        token: Address,
        start: NaiveDate,
        end: NaiveDate,
        price: Decimal,
    ) -> Self {
        let mut date = start;
        while date <= end {
            self.prices.insert(token.clone(), date, price);
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        self
    }

    /// Make `fetch_fills` fail for this wallet.
    pub fn with_failing_wallet(mut self, wallet: Address) -> Self {
        self.failing_wallets.insert(wallet);
        self
    }

    /// Sleep before answering `fetch_fills`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `get_price` calls answered so far.
    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FillSource for MockDataSource {
    async fn fetch_fills(
        &self,
        wallet: &Address,
        from: TimeMs,
        to: TimeMs,
    ) -> Result<Vec<Fill>, DataSourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_wallets.contains(wallet) {
            return Err(DataSourceError::Unavailable(format!(
                "fills for {} unavailable",
                wallet
            )));
        }

        Ok(self
            .fills
            .iter()
            .filter(|f| &f.wallet == wallet && f.timestamp >= from && f.timestamp <= to)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PriceSource for MockDataSource {
    async fn get_price(
        &self,
        token: &Address,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DataSourceError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.prices.price_on(token, date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, FillKey, TokenInfo};

    fn make_test_fill(wallet: &str, t: i64) -> Fill {
        Fill::new(
            FillKey::new("0xabc", t),
            Address::new(wallet),
            TokenInfo::new(Address::new("0xtoken"), "TKN", 18),
            Direction::Buy,
            Decimal::from_str_canonical("1").unwrap(),
            Some(Decimal::from_str_canonical("10").unwrap()),
            1,
            TimeMs::new(t),
            Decimal::zero(),
            None,
        )
    }

    #[tokio::test]
    async fn test_mock_fetch_fills_filters_wallet_and_range() {
        let mock = MockDataSource::new().with_fills(vec![
            make_test_fill("0x1", 1000),
            make_test_fill("0x1", 5000),
            make_test_fill("0x2", 1000),
        ]);
        let fills = mock
            .fetch_fills(&Address::new("0x1"), TimeMs::new(0), TimeMs::new(2000))
            .await
            .unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].timestamp, TimeMs::new(1000));
    }

    #[tokio::test]
    async fn test_mock_failing_wallet() {
        let mock = MockDataSource::new().with_failing_wallet(Address::new("0xbad"));
        let err = mock
            .fetch_fills(&Address::new("0xbad"), TimeMs::new(0), TimeMs::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DataSourceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_mock_prices_count_calls() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let token = Address::new("0xtoken");
        let mock = MockDataSource::new().with_price(token.clone(), date, Decimal::one());
        assert_eq!(mock.get_price(&token, date).await.unwrap(), Some(Decimal::one()));
        assert_eq!(mock.get_price(&token, date.succ_opt().unwrap()).await.unwrap(), None);
        assert_eq!(mock.price_calls(), 2);
    }
}
