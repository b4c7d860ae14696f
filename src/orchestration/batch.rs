use crate::domain::Address;
use crate::orchestration::analyzer::{WalletAnalyzer, WalletReport};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Stand-in deadline when `now + budget` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletFailure {
    pub wallet: Address,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<WalletReport>,
    pub failures: Vec<WalletFailure>,
    /// Started but cut off by the time budget.
    pub abandoned: Vec<Address>,
    /// Never started because the budget was already spent.
    pub skipped: Vec<Address>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.reports.len() + self.failures.len() + self.abandoned.len() + self.skipped.len()
    }
}

enum WalletOutcome {
    Scored(Box<WalletReport>),
    Failed(WalletFailure),
    Abandoned(Address),
    Skipped(Address),
}

/// Scores many wallets with bounded concurrency under a wall-clock budget.
///
/// Wallets are independent: a failure is recorded and the batch moves on.
pub struct BatchRunner {
    analyzer: Arc<WalletAnalyzer>,
    max_concurrent: usize,
    time_budget: Duration,
}

impl BatchRunner {
    pub fn new(analyzer: Arc<WalletAnalyzer>, max_concurrent: usize, time_budget: Duration) -> Self {
        Self {
            analyzer,
            max_concurrent: max_concurrent.max(1),
            time_budget,
        }
    }

    pub async fn run(&self, wallets: &[Address]) -> BatchSummary {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.time_budget)
            .unwrap_or_else(|| started + FAR_FUTURE);

        info!(
            wallets = wallets.len(),
            max_concurrent = self.max_concurrent,
            budget_secs = self.time_budget.as_secs(),
            "Starting batch"
        );

        let outcomes: Vec<WalletOutcome> = stream::iter(wallets.iter().cloned())
            .map(|wallet| {
                let analyzer = Arc::clone(&self.analyzer);
                async move {
                    if Instant::now() >= deadline {
                        return WalletOutcome::Skipped(wallet);
                    }
                    let result = tokio::time::timeout_at(deadline, analyzer.analyze(&wallet)).await;
                    match result {
                        Ok(Ok(report)) => WalletOutcome::Scored(Box::new(report)),
                        Ok(Err(e)) => {
                            warn!(wallet = %wallet, error = %e, "Wallet analysis failed");
                            WalletOutcome::Failed(WalletFailure {
                                wallet,
                                error: e.to_string(),
                            })
                        }
                        Err(_) => {
                            warn!(wallet = %wallet, "Wallet analysis abandoned: time budget exhausted");
                            WalletOutcome::Abandoned(wallet)
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match outcome {
                WalletOutcome::Scored(report) => summary.reports.push(*report),
                WalletOutcome::Failed(failure) => summary.failures.push(failure),
                WalletOutcome::Abandoned(wallet) => summary.abandoned.push(wallet),
                WalletOutcome::Skipped(wallet) => summary.skipped.push(wallet),
            }
        }
        summary.elapsed = started.elapsed();

        info!(
            scored = summary.reports.len(),
            failed = summary.failures.len(),
            abandoned = summary.abandoned.len(),
            skipped = summary.skipped.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Batch finished"
        );

        summary
    }
}
