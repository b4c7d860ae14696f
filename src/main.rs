use std::sync::Arc;

use whalescore::datasource::PriceSource;
use whalescore::orchestration::import_csv;
use whalescore::{
    config::Config, db::init_db, report, Address, AppError, BatchRunner, CachedPriceSource,
    FillSource, Repository, WalletAnalyzer,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), AppError> {
    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));

    import_csv(&repo, config.fills_csv.as_deref(), config.prices_csv.as_deref()).await?;

    // Fills and prices are served from the local store; prices go through the TTL cache.
    let fills: Arc<dyn FillSource> = repo.clone();
    let prices: Arc<dyn PriceSource> = Arc::new(CachedPriceSource::new(
        repo.clone(),
        config.price_cache_ttl,
    ));

    let analyzer = Arc::new(WalletAnalyzer::new(
        fills,
        prices,
        repo,
        config.analysis_settings(),
    )?);
    let runner = BatchRunner::new(
        analyzer,
        config.max_concurrent_wallets,
        config.batch_time_budget,
    );

    let wallets: Vec<Address> = config.wallets.iter().map(Address::new).collect();
    if wallets.is_empty() {
        tracing::warn!("No wallets configured; set WALLETS or WALLETS_FILE");
    }

    let summary = runner.run(&wallets).await;

    for failure in &summary.failures {
        tracing::error!(wallet = %failure.wallet, error = %failure.error, "Wallet not scored");
    }

    if let Some(path) = &config.report_path {
        report::write_leaderboard_file(path, &summary.reports)?;
    }

    tracing::info!(
        scored = summary.reports.len(),
        total = summary.total(),
        "Scoring run complete"
    );
    Ok(())
}
