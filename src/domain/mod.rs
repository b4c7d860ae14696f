//! Domain types for the whale scoring engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Address, Direction, FillKey
//! - The Fill record, the canonical unit of evidence
//! - Stable fill ordering for deterministic processing

pub mod decimal;
pub mod fill;
pub mod ordering;
pub mod primitives;

pub use decimal::Decimal;
pub use fill::{Fill, TokenInfo};
pub use ordering::{sort_fills_deterministic, FillOrderingKey};
pub use primitives::{Address, Direction, FillKey, TimeMs};
