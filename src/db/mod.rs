//! SQLite persistence for fills, lots, equity curves, metrics and scores.
//!
//! [`init_db`] opens the store; [`Repository`] owns every query, split by
//! table family under `repo/`.

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
