//! Leaderboard export of scored wallets.
//!
//! CSV by default; a `.json` path gets a JSON array of the same rows.

use crate::domain::Decimal;
use crate::orchestration::WalletReport;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One leaderboard line: score, headline metrics, and data-quality counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub wallet: String,
    pub composite: f64,
    pub category: String,
    pub roi_score: f64,
    pub volume_score: f64,
    pub consistency_score: f64,
    pub risk_score: f64,
    pub activity_score: f64,
    pub efficiency_score: f64,
    pub trade_count: u32,
    pub total_net_pnl_usd: String,
    pub win_rate_pct: String,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: String,
    pub oversells: usize,
    pub oversold_amount: String,
    pub partial_points: usize,
    pub unpriced_fills: usize,
    pub duplicate_fills: usize,
}

/// Rank reports by composite score, highest first; ties break on wallet.
pub fn rank_reports(reports: &[WalletReport]) -> Vec<LeaderboardRow> {
    let mut ordered: Vec<&WalletReport> = reports.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .composite
            .total_cmp(&a.score.composite)
            .then_with(|| a.wallet.cmp(&b.wallet))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, report)| {
            let score = &report.score;
            let metrics = &report.metrics;
            let diagnostics = &report.diagnostics;
            LeaderboardRow {
                rank: i + 1,
                wallet: report.wallet.to_string(),
                composite: score.composite,
                category: score.category.to_string(),
                roi_score: score.roi_score,
                volume_score: score.volume_score,
                consistency_score: score.consistency_score,
                risk_score: score.risk_score,
                activity_score: score.activity_score,
                efficiency_score: score.efficiency_score,
                trade_count: metrics.trade_count,
                total_net_pnl_usd: money(metrics.total_net_pnl_usd),
                win_rate_pct: money(metrics.win_rate_pct),
                sharpe_ratio: metrics.sharpe_ratio,
                max_drawdown_pct: money(metrics.max_drawdown_pct),
                oversells: diagnostics.oversells,
                oversold_amount: diagnostics.oversold_amount.to_canonical_string(),
                partial_points: diagnostics.partial_points,
                unpriced_fills: diagnostics.unpriced_fills,
                duplicate_fills: diagnostics.duplicate_fills,
            }
        })
        .collect()
}

fn money(value: Decimal) -> String {
    value.round_dp(2).to_canonical_string()
}

/// Write ranked rows with a header line.
///
/// # Errors
/// Returns an error if serialization or the underlying writer fails.
pub fn write_leaderboard<W: Write>(rows: &[LeaderboardRow], writer: W) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write ranked rows as a pretty-printed JSON array.
pub fn write_leaderboard_json<W: Write>(
    rows: &[LeaderboardRow],
    mut writer: W,
) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Rank `reports` and write them to `path`, creating parent directories.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_leaderboard_file(path: &Path, reports: &[WalletReport]) -> Result<usize, ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let rows = rank_reports(reports);
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    if is_json_path(path) {
        write_leaderboard_json(&rows, file)?;
    } else {
        write_leaderboard(&rows, file)?;
    }

    info!(path = %path.display(), rows = rows.len(), "Leaderboard written");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::engine::{CompositeScorer, PerformanceMetrics};
    use crate::orchestration::Diagnostics;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn report(wallet: &str, roi: &str, trades: u32) -> WalletReport {
        let mut metrics = PerformanceMetrics::empty(
            Address::new(wallet),
            30,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        metrics.trade_count = trades;
        metrics.avg_roi_pct = Decimal::from_str(roi).unwrap();
        metrics.total_net_pnl_usd = Decimal::from_str("1234.5678").unwrap();
        let score = CompositeScorer::default().score(&metrics);
        WalletReport {
            wallet: Address::new(wallet),
            metrics,
            score,
            diagnostics: Diagnostics {
                oversells: 1,
                oversold_amount: Decimal::from_i64(100),
                ..Diagnostics::default()
            },
        }
    }

    #[test]
    fn test_rank_orders_by_composite_then_wallet() {
        let reports = vec![
            report("0xbbb", "50", 5),
            report("0xccc", "10", 5),
            report("0xaaa", "50", 5),
            report("0xddd", "0", 0),
        ];
        let rows = rank_reports(&reports);
        let wallets: Vec<&str> = rows.iter().map(|r| r.wallet.as_str()).collect();
        assert_eq!(wallets, vec!["0xaaa", "0xbbb", "0xccc", "0xddd"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[3].rank, 4);
        assert_eq!(rows[3].composite, 0.0);
    }

    #[test]
    fn test_csv_output_has_header_and_rows() {
        let rows = rank_reports(&[report("0xaaa", "50", 5)]);
        let mut buf = Vec::new();
        write_leaderboard(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("rank,wallet,composite,category,roi_score"));
        assert!(header.ends_with("unpriced_fills,duplicate_fills"));

        let line = lines.next().unwrap();
        assert!(line.starts_with("1,0xaaa,"));
        assert!(line.contains(",1234.57,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_write_leaderboard_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("leaderboard.csv");
        let written = write_leaderboard_file(&path, &[report("0xaaa", "1", 1)]).unwrap();
        assert_eq!(written, 1);
        assert!(path.exists());
    }

    #[test]
    fn test_json_path_writes_json_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("leaderboard.JSON");
        write_leaderboard_file(&path, &[report("0xbbb", "5", 2), report("0xaaa", "50", 5)])
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["wallet"], "0xaaa");
        assert_eq!(rows[0]["rank"], 1);
        assert_eq!(rows[1]["oversold_amount"], "100");
    }
}
