use crate::datasource::{DataSourceError, FillSource, PriceSource};
use crate::db::Repository;
use crate::domain::{sort_fills_deterministic, Address, Decimal, Fill, TimeMs};
use crate::engine::performance::window_start;
use crate::engine::{
    self, CompositeScore, CompositeScorer, EngineError, EquityCurveBuilder, EquityPoint, LotBook,
    PerformanceCalculator, PerformanceMetrics, PriceTable, RiskParams, ScoringError,
    ScoringWeights,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameters shared by every wallet analysis in a run.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub window_days: u32,
    /// Last day of the analysis window; today (UTC) when unset.
    pub as_of: Option<NaiveDate>,
    pub risk: RiskParams,
    pub weights: ScoringWeights,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            window_days: 90,
            as_of: None,
            risk: RiskParams::default(),
            weights: ScoringWeights::default(),
        }
    }
}

/// Data-quality counters reported next to every score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Distinct fills processed; repeats are counted in `duplicate_fills`.
    pub fills: usize,
    pub unpriced_fills: usize,
    pub duplicate_fills: usize,
    pub oversells: usize,
    /// Unmatched SELL amount summed across tokens.
    pub oversold_amount: Decimal,
    pub open_lots: usize,
    pub partial_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletReport {
    pub wallet: Address,
    pub metrics: PerformanceMetrics,
    pub score: CompositeScore,
    pub diagnostics: Diagnostics,
}

/// Runs the full pipeline for one wallet against the store.
///
/// Fills are pulled from the [`FillSource`], ingested idempotently, and every
/// derived table is recomputed from scratch on each call.
pub struct WalletAnalyzer {
    fills: Arc<dyn FillSource>,
    prices: Arc<dyn PriceSource>,
    repo: Arc<Repository>,
    settings: AnalysisSettings,
    calculator: PerformanceCalculator,
    scorer: CompositeScorer,
}

struct LoadedFills {
    fills: Vec<Fill>,
    unpriced: usize,
}

impl WalletAnalyzer {
    /// # Errors
    /// Returns [`AnalysisError::Scoring`] when the configured weights are invalid.
    pub fn new(
        fills: Arc<dyn FillSource>,
        prices: Arc<dyn PriceSource>,
        repo: Arc<Repository>,
        settings: AnalysisSettings,
    ) -> Result<Self, AnalysisError> {
        let scorer = CompositeScorer::new(settings.weights)?;
        let calculator = PerformanceCalculator::new(settings.risk);
        Ok(Self {
            fills,
            prices,
            repo,
            settings,
            calculator,
            scorer,
        })
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn as_of(&self) -> NaiveDate {
        self.settings
            .as_of
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Rebuild and persist the wallet's open and closed lots from its full fill history.
    pub async fn process_fills(&self, wallet: &Address) -> Result<LotBook, AnalysisError> {
        let loaded = self.load_fills(wallet, self.as_of()).await?;
        self.rebuild_lots(wallet, &loaded.fills).await
    }

    /// Build and persist one equity point per day in `[start, end]`.
    pub async fn build_equity_curve(
        &self,
        wallet: &Address,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EquityPoint>, AnalysisError> {
        let loaded = self.load_fills(wallet, end).await?;
        self.rebuild_equity_curve(wallet, &loaded.fills, start, end)
            .await
    }

    /// Recompute and persist metrics for the window ending at the configured as-of date.
    pub async fn compute_metrics(
        &self,
        wallet: &Address,
        window_days: u32,
    ) -> Result<PerformanceMetrics, AnalysisError> {
        let (metrics, _) = self.compute_window(wallet, window_days).await?;
        Ok(metrics)
    }

    /// Full pipeline: lots, equity curve, metrics and composite score.
    pub async fn analyze(&self, wallet: &Address) -> Result<WalletReport, AnalysisError> {
        let (metrics, diagnostics) = self
            .compute_window(wallet, self.settings.window_days)
            .await?;

        let score = self.scorer.score(&metrics);
        self.repo.upsert_composite_score(&score).await?;

        info!(
            wallet = %wallet,
            composite = score.composite,
            category = %score.category,
            trades = metrics.trade_count,
            oversells = diagnostics.oversells,
            partial_points = diagnostics.partial_points,
            "Wallet scored"
        );

        Ok(WalletReport {
            wallet: wallet.clone(),
            metrics,
            score,
            diagnostics,
        })
    }

    async fn compute_window(
        &self,
        wallet: &Address,
        window_days: u32,
    ) -> Result<(PerformanceMetrics, Diagnostics), AnalysisError> {
        let as_of = self.as_of();
        let start = window_start(as_of, window_days);

        let loaded = self.load_fills(wallet, as_of).await?;
        let book = self.rebuild_lots(wallet, &loaded.fills).await?;
        let curve = self
            .rebuild_equity_curve(wallet, &loaded.fills, start, as_of)
            .await?;

        let metrics =
            self.calculator
                .compute(wallet, window_days, as_of, &book.closed_lots, &curve);
        self.repo.upsert_performance_metrics(&metrics).await?;

        let diagnostics = Diagnostics {
            fills: loaded.fills.len().saturating_sub(book.duplicates),
            unpriced_fills: loaded.unpriced,
            duplicate_fills: book.duplicates,
            oversells: book.oversells.len(),
            oversold_amount: book.oversells.iter().map(|o| o.unmatched_amount).sum(),
            open_lots: book.open_lots.len(),
            partial_points: engine::equity::count_partial(&curve),
        };

        Ok((metrics, diagnostics))
    }

    /// Fetch all fills up to the end of `through`, store them, and return them
    /// in processing order.
    async fn load_fills(
        &self,
        wallet: &Address,
        through: NaiveDate,
    ) -> Result<LoadedFills, AnalysisError> {
        let mut fills = self
            .fills
            .fetch_fills(wallet, TimeMs::new(0), TimeMs::end_of_day(through))
            .await?;

        let fills_new = self.repo.insert_fills_batch(&fills).await?;
        sort_fills_deterministic(&mut fills);

        let unpriced = fills.iter().filter(|f| !f.is_priced()).count();
        if unpriced > 0 {
            warn!(wallet = %wallet, unpriced, "Fills without a USD price are valued at zero");
        }
        debug!(wallet = %wallet, fetched = fills.len(), fills_new, "Fills loaded");

        Ok(LoadedFills { fills, unpriced })
    }

    async fn rebuild_lots(
        &self,
        wallet: &Address,
        fills: &[Fill],
    ) -> Result<LotBook, AnalysisError> {
        let book = engine::process_fills(wallet, fills)?;
        self.repo
            .replace_wallet_lots(wallet, &book.open_lots, &book.closed_lots)
            .await?;

        if !book.oversells.is_empty() {
            warn!(
                wallet = %wallet,
                oversells = book.oversells.len(),
                "Wallet sold more than its known open lots"
            );
        }

        Ok(book)
    }

    async fn rebuild_equity_curve(
        &self,
        wallet: &Address,
        fills: &[Fill],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<EquityPoint>, AnalysisError> {
        let table = self.prefetch_prices(fills, start, end).await?;
        let curve = EquityCurveBuilder::new(&table).build(wallet, fills, start, end)?;
        self.repo.upsert_equity_points(&curve).await?;

        let partial = engine::equity::count_partial(&curve);
        if partial > 0 {
            warn!(wallet = %wallet, partial, days = curve.len(), "Equity curve has days with missing prices");
        }

        Ok(curve)
    }

    async fn prefetch_prices(
        &self,
        fills: &[Fill],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, AnalysisError> {
        let mut table = PriceTable::new();
        if start > end {
            return Ok(table);
        }

        let tokens: BTreeSet<&Address> = fills.iter().map(|f| &f.token.address).collect();
        for token in tokens {
            for (date, price) in self.prices.get_prices(token, start, end).await? {
                table.insert(token.clone(), date, price);
            }
        }
        Ok(table)
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockDataSource;
    use crate::db::migrations::init_db;
    use crate::domain::{Direction, FillKey, TokenInfo};
    use std::str::FromStr;
    use tempfile::TempDir;

    async fn setup_repo() -> (Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Arc::new(Repository::new(pool)), temp_dir)
    }

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, n).unwrap()
    }

    fn make_fill(direction: Direction, amount: &str, price: &str, on: NaiveDate, idx: i64) -> Fill {
        Fill::new(
            FillKey::new(format!("0xtx{}", idx), 0),
            Address::new("0xwallet"),
            TokenInfo::new(Address::new("0xtoken"), "TKN", 18),
            direction,
            Decimal::from_str(amount).unwrap(),
            Some(Decimal::from_str(price).unwrap()),
            idx,
            TimeMs::new(TimeMs::from_date(on).as_ms() + 60_000),
            Decimal::zero(),
            None,
        )
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            window_days: 10,
            as_of: Some(day(10)),
            ..AnalysisSettings::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_weights() {
        let (repo, _temp) = setup_repo().await;
        let mock = Arc::new(MockDataSource::new());
        let mut bad = settings();
        bad.weights.roi = 0.9;
        let result = WalletAnalyzer::new(mock.clone(), mock, repo, bad);
        assert!(matches!(result, Err(AnalysisError::Scoring(_))));
    }

    #[tokio::test]
    async fn test_process_fills_persists_lots_and_fills() {
        let (repo, _temp) = setup_repo().await;
        let mock = Arc::new(MockDataSource::new().with_fills(vec![
            make_fill(Direction::Sell, "5", "3", day(3), 2),
            make_fill(Direction::Buy, "10", "2", day(1), 1),
        ]));
        let analyzer = WalletAnalyzer::new(mock.clone(), mock, repo.clone(), settings()).unwrap();
        let wallet = Address::new("0xwallet");

        let book = analyzer.process_fills(&wallet).await.unwrap();
        assert_eq!(book.closed_lots.len(), 1);
        assert_eq!(book.open_amount(&Address::new("0xtoken")), Decimal::from_i64(5));

        assert_eq!(repo.count_fills(&wallet).await.unwrap(), 2);
        assert_eq!(repo.query_closed_lots(&wallet).await.unwrap(), book.closed_lots);
    }

    #[tokio::test]
    async fn test_build_equity_curve_uses_price_source() {
        let (repo, _temp) = setup_repo().await;
        let token = Address::new("0xtoken");
        let mock = Arc::new(
            MockDataSource::new()
                .with_fill(make_fill(Direction::Buy, "10", "2", day(1), 1))
                .with_flat_price(token, day(1), day(2), Decimal::from_i64(3)),
        );
        let analyzer = WalletAnalyzer::new(mock.clone(), mock, repo.clone(), settings()).unwrap();
        let wallet = Address::new("0xwallet");

        let curve = analyzer
            .build_equity_curve(&wallet, day(1), day(3))
            .await
            .unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve[0].portfolio_value_usd, Decimal::from_i64(30));
        assert!(curve[2].partial);

        let stored = repo.query_equity_curve(&wallet, day(1), day(3)).await.unwrap();
        assert_eq!(stored, curve);
    }

    #[tokio::test]
    async fn test_repeated_fill_is_counted_once() {
        let (repo, _temp) = setup_repo().await;
        let buy = make_fill(Direction::Buy, "10", "2", day(1), 1);
        let mock = Arc::new(
            MockDataSource::new()
                .with_fill(buy.clone())
                .with_fill(buy)
                .with_fill(make_fill(Direction::Sell, "4", "3", day(2), 2)),
        );
        let analyzer = WalletAnalyzer::new(mock.clone(), mock, repo, settings()).unwrap();

        let report = analyzer.analyze(&Address::new("0xwallet")).await.unwrap();
        assert_eq!(report.diagnostics.fills, 2);
        assert_eq!(report.diagnostics.duplicate_fills, 1);
        assert_eq!(report.metrics.trade_count, 1);
    }

    #[tokio::test]
    async fn test_analyze_without_fills_scores_zero() {
        let (repo, _temp) = setup_repo().await;
        let mock = Arc::new(MockDataSource::new());
        let analyzer = WalletAnalyzer::new(mock.clone(), mock, repo.clone(), settings()).unwrap();

        let report = analyzer.analyze(&Address::new("0xnobody")).await.unwrap();
        assert_eq!(report.metrics.trade_count, 0);
        assert_eq!(report.score.composite, 0.0);
        assert_eq!(report.diagnostics, Diagnostics::default());
        assert!(repo
            .get_composite_score(&Address::new("0xnobody"))
            .await
            .unwrap()
            .is_some());
    }
}
