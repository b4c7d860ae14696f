use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::{DataSourceError, PriceSource};
use crate::cache::TtlCache;
use crate::domain::{Address, Decimal};

/// Price source that remembers known prices for a fixed TTL.
///
/// Misses are not cached, so a price that appears later is picked up on the
/// next lookup.
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    cache: TtlCache<(Address, NaiveDate), Decimal>,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }
}

impl fmt::Debug for CachedPriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedPriceSource")
            .field("inner", &self.inner)
            .field("ttl", &self.cache.ttl())
            .finish()
    }
}

#[async_trait]
impl PriceSource for CachedPriceSource {
    async fn get_price(
        &self,
        token: &Address,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, DataSourceError> {
        let key = (token.clone(), date);
        if let Some(price) = self.cache.get(&key).await {
            return Ok(Some(price));
        }

        let price = self.inner.get_price(token, date).await?;
        match price {
            Some(price) => self.cache.insert(key, price).await,
            None => debug!(token = %token, %date, "Price not found"),
        }
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockDataSource;

    #[tokio::test]
    async fn test_hits_are_served_from_cache() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let token = Address::new("0xtoken");
        let mock = MockDataSource::new().with_price(token.clone(), date, Decimal::hundred());
        let cached = CachedPriceSource::new(Arc::new(mock.clone()), Duration::from_secs(60));

        for _ in 0..3 {
            assert_eq!(
                cached.get_price(&token, date).await.unwrap(),
                Some(Decimal::hundred())
            );
        }
        assert_eq!(mock.price_calls(), 1);
    }

    #[tokio::test]
    async fn test_misses_are_retried() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mock = MockDataSource::new();
        let cached = CachedPriceSource::new(Arc::new(mock.clone()), Duration::from_secs(60));

        let token = Address::new("0xtoken");
        assert_eq!(cached.get_price(&token, date).await.unwrap(), None);
        assert_eq!(cached.get_price(&token, date).await.unwrap(), None);
        assert_eq!(mock.price_calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let token = Address::new("0xtoken");
        let mock = MockDataSource::new().with_price(token.clone(), date, Decimal::one());
        let cached = CachedPriceSource::new(Arc::new(mock.clone()), Duration::ZERO);

        cached.get_price(&token, date).await.unwrap();
        cached.get_price(&token, date).await.unwrap();
        assert_eq!(mock.price_calls(), 2);
    }
}
