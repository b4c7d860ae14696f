//! Wallet pipeline coordination: data sources, engine, and store.

pub mod analyzer;
pub mod batch;
pub mod import;

pub use analyzer::{AnalysisError, AnalysisSettings, Diagnostics, WalletAnalyzer, WalletReport};
pub use batch::{BatchRunner, BatchSummary, WalletFailure};
pub use import::{import_csv, ImportSummary};
