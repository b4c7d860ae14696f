pub mod cache;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod report;

pub use config::Config;
pub use datasource::{CachedPriceSource, DataSourceError, FillSource, MockDataSource, PriceSource};
pub use db::{init_db, Repository};
pub use domain::{Address, Decimal, Direction, Fill, FillKey, TimeMs, TokenInfo};
pub use engine::{
    CompositeScore, CompositeScorer, EquityCurveBuilder, LotTracker, PerformanceCalculator,
    PerformanceMetrics,
};
pub use error::AppError;
pub use orchestration::{
    import_csv, BatchRunner, BatchSummary, ImportSummary, WalletAnalyzer, WalletReport,
};
