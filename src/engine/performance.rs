//! Risk and performance statistics over a lookback window.
//!
//! Trade-level statistics come from closed lots whose exit date falls in the
//! window; Sharpe ratio and maximum drawdown come from the equity curve.
//! Everything is recomputed from scratch on each call.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Address, Decimal};

use super::equity::EquityPoint;
use super::ClosedTradeLot;

/// Tunable parameters for time-series statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    /// Annual risk-free rate as a fraction (0.02 = 2%).
    pub risk_free_rate: f64,
    /// Price-bearing periods per year; 365 for an always-on market.
    pub periods_per_year: u32,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            periods_per_year: 365,
        }
    }
}

/// Performance statistics for one wallet over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub wallet: Address,
    pub window_days: u32,
    pub as_of: NaiveDate,
    pub trade_count: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_net_pnl_usd: Decimal,
    pub avg_roi_pct: Decimal,
    pub median_roi_pct: Decimal,
    pub best_trade_roi_pct: Decimal,
    pub worst_trade_roi_pct: Decimal,
    /// Share of closed lots with positive net P&L, in percent.
    pub win_rate_pct: Decimal,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: Decimal,
    pub avg_hold_days: Decimal,
    pub total_volume_usd: Decimal,
    pub avg_position_size_usd: Decimal,
    pub total_gas_cost_usd: Decimal,
    /// Gas cost as a percentage of volume.
    pub gas_cost_pct: Decimal,
    /// Equity points in the window built with at least one missing price.
    pub partial_points: u32,
}

impl PerformanceMetrics {
    /// Zero-valued record for a wallet with no closed trades in the window.
    pub fn empty(wallet: Address, window_days: u32, as_of: NaiveDate) -> Self {
        Self {
            wallet,
            window_days,
            as_of,
            trade_count: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_net_pnl_usd: Decimal::zero(),
            avg_roi_pct: Decimal::zero(),
            median_roi_pct: Decimal::zero(),
            best_trade_roi_pct: Decimal::zero(),
            worst_trade_roi_pct: Decimal::zero(),
            win_rate_pct: Decimal::zero(),
            sharpe_ratio: 0.0,
            max_drawdown_pct: Decimal::zero(),
            avg_hold_days: Decimal::zero(),
            total_volume_usd: Decimal::zero(),
            avg_position_size_usd: Decimal::zero(),
            total_gas_cost_usd: Decimal::zero(),
            gas_cost_pct: Decimal::zero(),
            partial_points: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trade_count == 0
    }

    /// First date covered by the window.
    pub fn window_start(&self) -> NaiveDate {
        window_start(self.as_of, self.window_days)
    }
}

/// First date of `[as_of - window_days, as_of]`, clamped to the earliest
/// representable date.
pub fn window_start(as_of: NaiveDate, window_days: u32) -> NaiveDate {
    as_of
        .checked_sub_signed(Duration::days(i64::from(window_days)))
        .unwrap_or(NaiveDate::MIN)
}

pub struct PerformanceCalculator {
    params: RiskParams,
}

impl PerformanceCalculator {
    pub fn new(params: RiskParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> RiskParams {
        self.params
    }

    /// Compute metrics for the window `[as_of - window_days, as_of]`.
    ///
    /// Lots and points outside the window are ignored, so callers may pass
    /// the wallet's full history.
    pub fn compute(
        &self,
        wallet: &Address,
        window_days: u32,
        as_of: NaiveDate,
        closed_lots: &[ClosedTradeLot],
        equity_curve: &[EquityPoint],
    ) -> PerformanceMetrics {
        let start = window_start(as_of, window_days);
        let in_window = |date: NaiveDate| date >= start && date <= as_of;

        let trades: Vec<&ClosedTradeLot> = closed_lots
            .iter()
            .filter(|lot| in_window(lot.exit_timestamp.date()))
            .collect();

        if trades.is_empty() {
            return PerformanceMetrics::empty(wallet.clone(), window_days, as_of);
        }

        let curve: Vec<EquityPoint> = equity_curve
            .iter()
            .filter(|p| in_window(p.date))
            .cloned()
            .collect();

        let n = Decimal::from_i64(trades.len() as i64);
        let winning = trades.iter().filter(|t| t.is_win()).count();

        let mut rois: Vec<Decimal> = trades.iter().map(|t| t.roi_percent).collect();
        rois.sort();

        let total_net_pnl: Decimal = trades.iter().map(|t| t.net_pnl_usd).sum();
        let total_volume: Decimal = trades.iter().map(|t| t.entry_value_usd).sum();
        let total_gas: Decimal = trades.iter().map(|t| t.total_gas_usd()).sum();
        let total_hold: i64 = trades.iter().map(|t| t.hold_duration_days).sum();

        let gas_cost_pct = total_gas
            .checked_div(total_volume)
            .map(|ratio| ratio * Decimal::hundred())
            .unwrap_or_default();

        PerformanceMetrics {
            wallet: wallet.clone(),
            window_days,
            as_of,
            trade_count: trades.len() as u32,
            winning_trades: winning as u32,
            losing_trades: (trades.len() - winning) as u32,
            total_net_pnl_usd: total_net_pnl,
            avg_roi_pct: rois.iter().sum::<Decimal>() / n,
            median_roi_pct: median(&rois),
            best_trade_roi_pct: rois.last().copied().unwrap_or_default(),
            worst_trade_roi_pct: rois.first().copied().unwrap_or_default(),
            win_rate_pct: Decimal::from_i64(winning as i64) / n * Decimal::hundred(),
            sharpe_ratio: sharpe_ratio(&curve, self.params),
            max_drawdown_pct: max_drawdown_pct(&curve),
            avg_hold_days: Decimal::from_i64(total_hold) / n,
            total_volume_usd: total_volume,
            avg_position_size_usd: total_volume / n,
            total_gas_cost_usd: total_gas,
            gas_cost_pct,
            partial_points: curve.iter().filter(|p| p.partial).count() as u32,
        }
    }
}

impl Default for PerformanceCalculator {
    fn default() -> Self {
        Self::new(RiskParams::default())
    }
}

/// Median of an already sorted slice; zero when empty.
fn median(sorted: &[Decimal]) -> Decimal {
    let len = sorted.len();
    if len == 0 {
        return Decimal::zero();
    }
    let mid = len / 2;
    if len % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / Decimal::from_i64(2)
    }
}

/// Annualized Sharpe ratio from daily portfolio values.
///
/// Days whose previous value is zero are skipped. Returns 0.0 with fewer
/// than two usable returns or zero volatility.
pub fn sharpe_ratio(points: &[EquityPoint], params: RiskParams) -> f64 {
    let returns: Vec<f64> = points
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].portfolio_value_usd;
            let curr = pair[1].portfolio_value_usd;
            (curr - prev).checked_div(prev).map(|r| r.to_f64())
        })
        .collect();

    if returns.len() < 2 || params.periods_per_year == 0 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }

    let periods = f64::from(params.periods_per_year);
    let annual_return = mean * periods;
    let annual_volatility = std_dev * periods.sqrt();
    let sharpe = (annual_return - params.risk_free_rate) / annual_volatility;

    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Largest peak-to-trough decline of portfolio value, in percent [0, 100].
pub fn max_drawdown_pct(points: &[EquityPoint]) -> Decimal {
    if points.len() < 2 {
        return Decimal::zero();
    }

    let mut peak = points[0].portfolio_value_usd;
    let mut max_drawdown = Decimal::zero();

    for point in &points[1..] {
        let value = point.portfolio_value_usd;
        if value > peak {
            peak = value;
        } else if peak.is_positive() {
            let drawdown = (peak - value) / peak;
            max_drawdown = max_drawdown.max(drawdown);
        }
    }

    (max_drawdown * Decimal::hundred())
        .max(Decimal::zero())
        .min(Decimal::hundred())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FillKey, TimeMs};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn curve(values: &[&str]) -> Vec<EquityPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| EquityPoint {
                wallet: Address::new("0xwallet"),
                date: start + Duration::days(i as i64),
                portfolio_value_usd: d(v),
                realized_pnl_usd: Decimal::zero(),
                unrealized_pnl_usd: Decimal::zero(),
                total_invested_usd: Decimal::zero(),
                partial: false,
                missing_prices: 0,
            })
            .collect()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i64::from(day) - 1)
    }

    fn lot(
        exit_day: u32,
        entry_value: &str,
        net_pnl: &str,
        roi: &str,
        tag: &str,
    ) -> ClosedTradeLot {
        let exit = TimeMs::new(TimeMs::from_date(date(exit_day)).as_ms() + 3_600_000);
        ClosedTradeLot {
            id: uuid::Uuid::nil(),
            wallet: Address::new("0xwallet"),
            token: Address::new("0xtoken"),
            token_symbol: "TKN".to_string(),
            trade_amount: d("1"),
            entry_price_usd: d(entry_value),
            exit_price_usd: d(entry_value),
            entry_timestamp: TimeMs::new(exit.as_ms() - 2 * 86_400_000),
            exit_timestamp: exit,
            hold_duration_days: 2,
            entry_value_usd: d(entry_value),
            exit_value_usd: d(entry_value),
            entry_gas_cost_usd: d("1"),
            exit_gas_cost_usd: d("2"),
            gross_pnl_usd: d(net_pnl),
            net_pnl_usd: d(net_pnl),
            roi_percent: d(roi),
            entry_fill: FillKey::new(format!("0xin{}", tag), 0),
            exit_fill: FillKey::new(format!("0xout{}", tag), 0),
        }
    }

    fn point(day: u32, value: &str, partial: bool) -> EquityPoint {
        EquityPoint {
            wallet: Address::new("0xwallet"),
            date: date(day),
            portfolio_value_usd: d(value),
            realized_pnl_usd: Decimal::zero(),
            unrealized_pnl_usd: Decimal::zero(),
            total_invested_usd: Decimal::zero(),
            partial,
            missing_prices: u32::from(partial),
        }
    }

    fn compute(lots: &[ClosedTradeLot], curve: &[EquityPoint]) -> PerformanceMetrics {
        // Window [Jan 21, Jan 31].
        PerformanceCalculator::default().compute(
            &Address::new("0xwallet"),
            10,
            date(31),
            lots,
            curve,
        )
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let lots = vec![
            lot(20, "100", "1000", "1000", "a"),
            lot(21, "100", "10", "10", "b"),
            lot(31, "100", "-20", "-20", "c"),
            lot(32, "100", "1000", "1000", "d"),
        ];
        let curve = vec![
            point(20, "1000", true),
            point(21, "100", false),
            point(25, "100", true),
            point(31, "100", false),
            point(32, "1", true),
        ];

        let metrics = compute(&lots, &curve);

        assert_eq!(metrics.trade_count, 2);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.total_net_pnl_usd, d("-10"));
        assert_eq!(metrics.win_rate_pct, d("50"));
        assert_eq!(metrics.median_roi_pct, d("-5"));
        assert_eq!(metrics.avg_roi_pct, d("-5"));
        assert_eq!(metrics.best_trade_roi_pct, d("10"));
        assert_eq!(metrics.worst_trade_roi_pct, d("-20"));
        // Only the Jan 25 point is both partial and inside the window.
        assert_eq!(metrics.partial_points, 1);
        // The 1000 -> 100 drop happens across the window start.
        assert_eq!(metrics.max_drawdown_pct, Decimal::zero());
        assert_eq!(metrics.window_start(), date(21));
    }

    #[test]
    fn test_breakeven_counts_as_loss() {
        let lots = vec![
            lot(22, "100", "30", "30", "a"),
            lot(23, "100", "-10", "-10", "b"),
            lot(24, "100", "0", "0", "c"),
        ];

        let metrics = compute(&lots, &[]);

        assert_eq!(metrics.trade_count, 3);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 2);
        assert_eq!(metrics.win_rate_pct.round_dp(2), d("33.33"));
        assert_eq!(metrics.median_roi_pct, d("0"));
        assert_eq!(metrics.avg_roi_pct.round_dp(2), d("6.67"));
        assert_eq!(metrics.avg_hold_days, d("2"));
        assert_eq!(metrics.total_volume_usd, d("300"));
        assert_eq!(metrics.avg_position_size_usd, d("100"));
        assert_eq!(metrics.total_gas_cost_usd, d("9"));
        assert_eq!(metrics.gas_cost_pct, d("3"));
    }

    #[test]
    fn test_zero_volume_has_zero_gas_ratio() {
        let lots = vec![lot(25, "0", "-3", "0", "a"), lot(26, "0", "-3", "0", "b")];

        let metrics = compute(&lots, &[]);

        assert_eq!(metrics.trade_count, 2);
        assert_eq!(metrics.win_rate_pct, Decimal::zero());
        assert_eq!(metrics.total_volume_usd, Decimal::zero());
        assert_eq!(metrics.total_gas_cost_usd, d("6"));
        assert_eq!(metrics.gas_cost_pct, Decimal::zero());
    }

    #[test]
    fn test_no_trades_in_window_is_empty() {
        let metrics = compute(&[lot(5, "100", "10", "10", "a")], &[point(31, "100", false)]);
        assert!(metrics.is_empty());
        assert_eq!(metrics, PerformanceMetrics::empty(Address::new("0xwallet"), 10, date(31)));
    }

    #[test]
    fn test_huge_window_clamps_start() {
        assert_eq!(window_start(date(31), u32::MAX), NaiveDate::MIN);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[d("1"), d("5"), d("9")]), d("5"));
        assert_eq!(median(&[d("1"), d("3"), d("5"), d("9")]), d("4"));
        assert_eq!(median(&[]), Decimal::zero());
    }

    #[test]
    fn test_max_drawdown_basic() {
        let points = curve(&["100", "120", "90", "110", "60"]);
        // peak 120 -> trough 60
        assert_eq!(max_drawdown_pct(&points), d("50"));
    }

    #[test]
    fn test_max_drawdown_short_series_is_zero() {
        assert_eq!(max_drawdown_pct(&curve(&["100"])), Decimal::zero());
        assert_eq!(max_drawdown_pct(&[]), Decimal::zero());
    }

    #[test]
    fn test_max_drawdown_monotonic_rise_is_zero() {
        assert_eq!(max_drawdown_pct(&curve(&["1", "2", "3"])), Decimal::zero());
    }

    #[test]
    fn test_max_drawdown_total_loss_is_hundred() {
        assert_eq!(max_drawdown_pct(&curve(&["50", "0"])), d("100"));
    }

    #[test]
    fn test_sharpe_requires_two_returns() {
        let params = RiskParams::default();
        assert_eq!(sharpe_ratio(&curve(&["100", "110"]), params), 0.0);
        assert_eq!(sharpe_ratio(&[], params), 0.0);
    }

    #[test]
    fn test_sharpe_zero_volatility() {
        // Constant 10% daily growth: identical returns, zero stdev.
        let points = curve(&["100", "110", "121"]);
        assert_eq!(sharpe_ratio(&points, RiskParams::default()), 0.0);
    }

    #[test]
    fn test_sharpe_skips_zero_base_days() {
        let params = RiskParams {
            risk_free_rate: 0.0,
            periods_per_year: 365,
        };
        // 0 -> 100 is skipped; remaining returns +10%, -10%.
        let points = curve(&["0", "100", "110", "99"]);
        let sharpe = sharpe_ratio(&points, params);
        assert_eq!(sharpe, 0.0);

        let points = curve(&["0", "100", "110", "121", "108.9"]);
        let sharpe = sharpe_ratio(&points, params);
        assert!(sharpe.is_finite());
        assert!(sharpe > 0.0);
    }

    #[test]
    fn test_sharpe_known_value() {
        let params = RiskParams {
            risk_free_rate: 0.0,
            periods_per_year: 4,
        };
        // returns: +10%, -5% -> mean 0.025, sample std = 0.106066...
        let points = curve(&["100", "110", "104.5"]);
        let sharpe = sharpe_ratio(&points, params);
        let expected = (0.025 * 4.0) / (0.075_f64 * 2f64.sqrt() * 2.0);
        assert!((sharpe - expected).abs() < 1e-9, "got {}", sharpe);
    }
}
