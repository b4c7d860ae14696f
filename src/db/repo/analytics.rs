//! Equity curve, performance metrics, and composite score operations.

use crate::domain::Address;
use crate::engine::{CompositeScore, EquityPoint, PerformanceMetrics, ScoreCategory};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use super::{decimal_column, format_date, parse_date, Repository};

impl Repository {
    /// Upsert equity points keyed by `(wallet, date)` in a single transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_equity_points(&self, points: &[EquityPoint]) -> Result<(), sqlx::Error> {
        if points.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for point in points {
            sqlx::query(
                r#"
                INSERT INTO daily_equity (
                    wallet, date, portfolio_value_usd, realized_pnl_usd,
                    unrealized_pnl_usd, total_invested_usd, partial, missing_prices
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(wallet, date) DO UPDATE SET
                    portfolio_value_usd = excluded.portfolio_value_usd,
                    realized_pnl_usd = excluded.realized_pnl_usd,
                    unrealized_pnl_usd = excluded.unrealized_pnl_usd,
                    total_invested_usd = excluded.total_invested_usd,
                    partial = excluded.partial,
                    missing_prices = excluded.missing_prices
                "#,
            )
            .bind(point.wallet.as_str())
            .bind(format_date(point.date))
            .bind(point.portfolio_value_usd.to_canonical_string())
            .bind(point.realized_pnl_usd.to_canonical_string())
            .bind(point.unrealized_pnl_usd.to_canonical_string())
            .bind(point.total_invested_usd.to_canonical_string())
            .bind(point.partial)
            .bind(i64::from(point.missing_prices))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Equity points for a wallet within `[start, end]`, ascending by date.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_equity_curve(
        &self,
        wallet: &Address,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EquityPoint>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT wallet, date, portfolio_value_usd, realized_pnl_usd,
                   unrealized_pnl_usd, total_invested_usd, partial, missing_prices
            FROM daily_equity
            WHERE wallet = ? AND date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(wallet.as_str())
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date: String = row.get("date");
                let missing: i64 = row.get("missing_prices");
                Ok(EquityPoint {
                    wallet: Address::new(row.get::<String, _>("wallet")),
                    date: parse_date(&date)?,
                    portfolio_value_usd: decimal_column(row, "portfolio_value_usd"),
                    realized_pnl_usd: decimal_column(row, "realized_pnl_usd"),
                    unrealized_pnl_usd: decimal_column(row, "unrealized_pnl_usd"),
                    total_invested_usd: decimal_column(row, "total_invested_usd"),
                    partial: row.get("partial"),
                    missing_prices: u32::try_from(missing).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Upsert a metrics record keyed by `(wallet, window_days)`.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_performance_metrics(
        &self,
        metrics: &PerformanceMetrics,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO performance_metrics (
                wallet, window_days, as_of, trade_count, winning_trades, losing_trades,
                total_net_pnl_usd, avg_roi_pct, median_roi_pct, best_trade_roi_pct,
                worst_trade_roi_pct, win_rate_pct, sharpe_ratio, max_drawdown_pct,
                avg_hold_days, total_volume_usd, avg_position_size_usd,
                total_gas_cost_usd, gas_cost_pct, partial_points, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(wallet, window_days) DO UPDATE SET
                as_of = excluded.as_of,
                trade_count = excluded.trade_count,
                winning_trades = excluded.winning_trades,
                losing_trades = excluded.losing_trades,
                total_net_pnl_usd = excluded.total_net_pnl_usd,
                avg_roi_pct = excluded.avg_roi_pct,
                median_roi_pct = excluded.median_roi_pct,
                best_trade_roi_pct = excluded.best_trade_roi_pct,
                worst_trade_roi_pct = excluded.worst_trade_roi_pct,
                win_rate_pct = excluded.win_rate_pct,
                sharpe_ratio = excluded.sharpe_ratio,
                max_drawdown_pct = excluded.max_drawdown_pct,
                avg_hold_days = excluded.avg_hold_days,
                total_volume_usd = excluded.total_volume_usd,
                avg_position_size_usd = excluded.avg_position_size_usd,
                total_gas_cost_usd = excluded.total_gas_cost_usd,
                gas_cost_pct = excluded.gas_cost_pct,
                partial_points = excluded.partial_points,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(metrics.wallet.as_str())
        .bind(i64::from(metrics.window_days))
        .bind(format_date(metrics.as_of))
        .bind(i64::from(metrics.trade_count))
        .bind(i64::from(metrics.winning_trades))
        .bind(i64::from(metrics.losing_trades))
        .bind(metrics.total_net_pnl_usd.to_canonical_string())
        .bind(metrics.avg_roi_pct.to_canonical_string())
        .bind(metrics.median_roi_pct.to_canonical_string())
        .bind(metrics.best_trade_roi_pct.to_canonical_string())
        .bind(metrics.worst_trade_roi_pct.to_canonical_string())
        .bind(metrics.win_rate_pct.to_canonical_string())
        .bind(metrics.sharpe_ratio)
        .bind(metrics.max_drawdown_pct.to_canonical_string())
        .bind(metrics.avg_hold_days.to_canonical_string())
        .bind(metrics.total_volume_usd.to_canonical_string())
        .bind(metrics.avg_position_size_usd.to_canonical_string())
        .bind(metrics.total_gas_cost_usd.to_canonical_string())
        .bind(metrics.gas_cost_pct.to_canonical_string())
        .bind(i64::from(metrics.partial_points))
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_performance_metrics(
        &self,
        wallet: &Address,
        window_days: u32,
    ) -> Result<Option<PerformanceMetrics>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT wallet, window_days, as_of, trade_count, winning_trades, losing_trades,
                   total_net_pnl_usd, avg_roi_pct, median_roi_pct, best_trade_roi_pct,
                   worst_trade_roi_pct, win_rate_pct, sharpe_ratio, max_drawdown_pct,
                   avg_hold_days, total_volume_usd, avg_position_size_usd,
                   total_gas_cost_usd, gas_cost_pct, partial_points
            FROM performance_metrics
            WHERE wallet = ? AND window_days = ?
            "#,
        )
        .bind(wallet.as_str())
        .bind(i64::from(window_days))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(metrics_from_row).transpose()
    }

    /// Upsert a composite score keyed by wallet.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_composite_score(&self, score: &CompositeScore) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO composite_scores (
                wallet, window_days, roi_score, volume_score, consistency_score,
                risk_score, activity_score, efficiency_score, composite, category, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(wallet) DO UPDATE SET
                window_days = excluded.window_days,
                roi_score = excluded.roi_score,
                volume_score = excluded.volume_score,
                consistency_score = excluded.consistency_score,
                risk_score = excluded.risk_score,
                activity_score = excluded.activity_score,
                efficiency_score = excluded.efficiency_score,
                composite = excluded.composite,
                category = excluded.category,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(score.wallet.as_str())
        .bind(i64::from(score.window_days))
        .bind(score.roi_score)
        .bind(score.volume_score)
        .bind(score.consistency_score)
        .bind(score.risk_score)
        .bind(score.activity_score)
        .bind(score.efficiency_score)
        .bind(score.composite)
        .bind(score.category.as_str())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_composite_score(
        &self,
        wallet: &Address,
    ) -> Result<Option<CompositeScore>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE wallet = ?", SELECT_SCORES_SQL))
            .bind(wallet.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(score_from_row).transpose()
    }

    /// All composite scores, best first (wallet ascending on ties).
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn list_composite_scores(&self) -> Result<Vec<CompositeScore>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY composite DESC, wallet ASC",
            SELECT_SCORES_SQL
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(score_from_row).collect()
    }
}

const SELECT_SCORES_SQL: &str = r#"
    SELECT wallet, window_days, roi_score, volume_score, consistency_score,
           risk_score, activity_score, efficiency_score, composite, category
    FROM composite_scores
"#;

fn u32_column(row: &SqliteRow, column: &str) -> Result<u32, sqlx::Error> {
    let value: i64 = row.get(column);
    u32::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn metrics_from_row(row: &SqliteRow) -> Result<PerformanceMetrics, sqlx::Error> {
    let as_of: String = row.get("as_of");
    Ok(PerformanceMetrics {
        wallet: Address::new(row.get::<String, _>("wallet")),
        window_days: u32_column(row, "window_days")?,
        as_of: parse_date(&as_of)?,
        trade_count: u32_column(row, "trade_count")?,
        winning_trades: u32_column(row, "winning_trades")?,
        losing_trades: u32_column(row, "losing_trades")?,
        total_net_pnl_usd: decimal_column(row, "total_net_pnl_usd"),
        avg_roi_pct: decimal_column(row, "avg_roi_pct"),
        median_roi_pct: decimal_column(row, "median_roi_pct"),
        best_trade_roi_pct: decimal_column(row, "best_trade_roi_pct"),
        worst_trade_roi_pct: decimal_column(row, "worst_trade_roi_pct"),
        win_rate_pct: decimal_column(row, "win_rate_pct"),
        sharpe_ratio: row.get("sharpe_ratio"),
        max_drawdown_pct: decimal_column(row, "max_drawdown_pct"),
        avg_hold_days: decimal_column(row, "avg_hold_days"),
        total_volume_usd: decimal_column(row, "total_volume_usd"),
        avg_position_size_usd: decimal_column(row, "avg_position_size_usd"),
        total_gas_cost_usd: decimal_column(row, "total_gas_cost_usd"),
        gas_cost_pct: decimal_column(row, "gas_cost_pct"),
        partial_points: u32_column(row, "partial_points")?,
    })
}

fn score_from_row(row: &SqliteRow) -> Result<CompositeScore, sqlx::Error> {
    let category: String = row.get("category");
    Ok(CompositeScore {
        wallet: Address::new(row.get::<String, _>("wallet")),
        window_days: u32_column(row, "window_days")?,
        roi_score: row.get("roi_score"),
        volume_score: row.get("volume_score"),
        consistency_score: row.get("consistency_score"),
        risk_score: row.get("risk_score"),
        activity_score: row.get("activity_score"),
        efficiency_score: row.get("efficiency_score"),
        composite: row.get("composite"),
        category: ScoreCategory::from_str(&category).map_err(|e| sqlx::Error::Decode(e.into()))?,
    })
}
