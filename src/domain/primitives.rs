//! Domain primitives: TimeMs, Address, Direction, FillKey.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Midnight UTC at the start of `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        let days = date
            .signed_duration_since(NaiveDate::default())
            .num_days();
        TimeMs(days * MS_PER_DAY)
    }

    /// Last millisecond of `date` (UTC).
    pub fn end_of_day(date: NaiveDate) -> Self {
        TimeMs(Self::from_date(date).0 + MS_PER_DAY - 1)
    }

    /// Calendar date (UTC) this instant falls on.
    pub fn date(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }

    /// Whole days elapsed from `earlier` to `self`, floored, never negative.
    pub fn whole_days_since(&self, earlier: TimeMs) -> i64 {
        (self.0 - earlier.0).max(0) / MS_PER_DAY
    }
}

/// Wallet or token contract address, normalized to lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a token movement relative to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Tokens received by the wallet.
    Buy,
    /// Tokens sent by the wallet.
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Direction::Buy),
            "SELL" => Ok(Direction::Sell),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Natural unique key of a fill: the transaction hash plus the log index
/// of the event inside that transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FillKey {
    pub tx_hash: String,
    pub log_index: i64,
}

impl FillKey {
    pub fn new(tx_hash: impl Into<String>, log_index: i64) -> Self {
        FillKey {
            tx_hash: tx_hash.into().trim().to_ascii_lowercase(),
            log_index,
        }
    }
}

impl std::fmt::Display for FillKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.log_index)
    }
}

impl std::str::FromStr for FillKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx_hash, log_index) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid fill key: {}", s))?;
        let log_index = log_index
            .parse::<i64>()
            .map_err(|_| format!("invalid log index in fill key: {}", s))?;
        Ok(FillKey::new(tx_hash, log_index))
    }
}
