//! Daily token price operations for the repository.

use crate::domain::{Address, Decimal};
use chrono::NaiveDate;
use sqlx::Row;

use super::{decimal_column, format_date, parse_date, Repository};

impl Repository {
    /// Upsert daily prices for one token keyed by `(token, date)`.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_token_prices(
        &self,
        token: &Address,
        prices: &[(NaiveDate, Decimal)],
    ) -> Result<(), sqlx::Error> {
        if prices.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for (date, price) in prices {
            sqlx::query(
                r#"
                INSERT INTO token_prices (token_address, date, price_usd)
                VALUES (?, ?, ?)
                ON CONFLICT(token_address, date) DO UPDATE SET price_usd = excluded.price_usd
                "#,
            )
            .bind(token.as_str())
            .bind(format_date(*date))
            .bind(price.to_canonical_string())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_token_price(
        &self,
        token: &Address,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT price_usd FROM token_prices WHERE token_address = ? AND date = ?",
        )
        .bind(token.as_str())
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| decimal_column(&r, "price_usd")))
    }

    /// Known prices for `token` within `[start, end]`, ascending by date.
    ///
    /// # Errors
    /// Returns an error if the query fails or a date cannot be decoded.
    pub async fn query_token_prices(
        &self,
        token: &Address,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT date, price_usd
            FROM token_prices
            WHERE token_address = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(token.as_str())
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date: String = row.get("date");
                Ok((parse_date(&date)?, decimal_column(row, "price_usd")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::datasource::PriceSource;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    #[tokio::test]
    async fn test_prices_upsert_and_range() {
        let (repo, _temp) = setup_test_db().await;
        let token = Address::new("0xToken");

        repo.upsert_token_prices(
            &token,
            &[(day(1), Decimal::one()), (day(3), Decimal::hundred())],
        )
        .await
        .unwrap();
        repo.upsert_token_prices(&token, &[(day(1), Decimal::from_i64(2))])
            .await
            .unwrap();

        assert_eq!(
            repo.get_token_price(&token, day(1)).await.unwrap(),
            Some(Decimal::from_i64(2))
        );
        assert_eq!(repo.get_token_price(&token, day(2)).await.unwrap(), None);

        let range = repo.get_prices(&token, day(2), day(5)).await.unwrap();
        assert_eq!(range, vec![(day(3), Decimal::hundred())]);
    }
}
