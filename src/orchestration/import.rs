use crate::datasource::csv_import::{read_fills_csv, read_prices_csv};
use crate::datasource::PriceRow;
use crate::db::Repository;
use crate::domain::{Address, Decimal};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use super::AnalysisError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub fills_read: usize,
    pub fills_new: usize,
    pub prices_read: usize,
    pub tokens_priced: usize,
}

/// Load fill and price exports into the store. Re-importing the same files
/// inserts nothing new for fills and overwrites prices in place.
pub async fn import_csv(
    repo: &Repository,
    fills_path: Option<&Path>,
    prices_path: Option<&Path>,
) -> Result<ImportSummary, AnalysisError> {
    let mut summary = ImportSummary::default();

    if let Some(path) = fills_path {
        let fills = read_fills_csv(path)?;
        summary.fills_read = fills.len();
        summary.fills_new = repo.insert_fills_batch(&fills).await?;
        info!(
            path = %path.display(),
            read = summary.fills_read,
            new = summary.fills_new,
            "Fills imported"
        );
    }

    if let Some(path) = prices_path {
        let rows = read_prices_csv(path)?;
        summary.prices_read = rows.len();
        let by_token = group_by_token(rows);
        summary.tokens_priced = by_token.len();
        for (token, prices) in &by_token {
            repo.upsert_token_prices(token, prices).await?;
        }
        info!(
            path = %path.display(),
            read = summary.prices_read,
            tokens = summary.tokens_priced,
            "Prices imported"
        );
    }

    Ok(summary)
}

fn group_by_token(rows: Vec<PriceRow>) -> BTreeMap<Address, Vec<(NaiveDate, Decimal)>> {
    let mut grouped: BTreeMap<Address, Vec<(NaiveDate, Decimal)>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry(row.token)
            .or_default()
            .push((row.date, row.price_usd));
    }
    grouped
}
