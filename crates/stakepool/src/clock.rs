//! Injected time source and timestamp parsing.

use serde::{Deserialize, Deserializer};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Error, Debug)]
pub enum ClockError {
    #[error("invalid time: {0}")]
    InvalidTime(String),
}

/// Source of "now" in Unix seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

/// Wall clock (UTC).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Settable clock for tests and replaying operations at a given time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> i64 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> i64 {
        (**self).now()
    }
}

/// Parse RFC3339 timestamp into Unix seconds.
pub fn parse_time_rfc3339(s: &str) -> Result<i64, ClockError> {
    let dt = OffsetDateTime::parse(s.trim(), &Rfc3339)
        .map_err(|e| ClockError::InvalidTime(e.to_string()))?;
    Ok(dt.unix_timestamp())
}

/// Accept either decimal Unix seconds or RFC3339.
pub fn parse_timestamp(s: &str) -> Result<i64, ClockError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ClockError::InvalidTime("empty".to_string()));
    }
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }
    parse_time_rfc3339(s)
}

/// Format Unix seconds as RFC3339; falls back to the raw number when out of range.
pub fn format_timestamp(ts: i64) -> String {
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Unix(i64),
    Text(String),
}

/// Serde helper: timestamp fields may be written as Unix seconds or RFC3339 text.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Unix(ts) => Ok(ts),
        RawTimestamp::Text(s) => parse_timestamp(&s).map_err(serde::de::Error::custom),
    }
}
