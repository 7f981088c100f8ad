use std::ops::Add;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Storage timestamp with microsecond precision.
//
// PostgreSQL TIMESTAMPTZ keeps microseconds, so values are truncated on
// creation and survive a write/read cycle unchanged.

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageDatetime(pub DateTime<Utc>);

// Custom serde to always use microsecond precision with Z timezone
impl Serialize for StorageDatetime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for StorageDatetime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| StorageDatetime::from(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

impl StorageDatetime {
    pub fn now() -> Self {
        StorageDatetime(datetime_micros())
    }

    pub fn inner(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }
}

impl Add<Duration> for StorageDatetime {
    type Output = StorageDatetime;

    fn add(self, rhs: Duration) -> Self::Output {
        let new_time = self.0 + chrono::Duration::from_std(rhs).unwrap_or(chrono::Duration::zero());
        StorageDatetime::from(new_time)
    }
}

impl std::fmt::Display for StorageDatetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}

/// Truncates to microseconds.
impl From<DateTime<Utc>> for StorageDatetime {
    fn from(dt: DateTime<Utc>) -> Self {
        let micros = dt.timestamp_micros();
        StorageDatetime(DateTime::from_timestamp_micros(micros).unwrap_or(dt))
    }
}

impl From<StorageDatetime> for DateTime<Utc> {
    fn from(dt: StorageDatetime) -> Self {
        dt.0
    }
}

/// Create a DateTime truncated to microsecond precision (6 decimal places)
fn datetime_micros() -> DateTime<Utc> {
    let now = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(time) => time,
        Err(_) => std::time::Duration::from_secs(0),
    };

    let timestamp_micros = (now.as_secs() as i64 * 1_000_000) + (now.subsec_micros() as i64);
    if let Some(time) = DateTime::from_timestamp_micros(timestamp_micros) {
        time
    } else {
        DateTime::<Utc>::from_timestamp_nanos(0)
    }
}

/// Source of the current time for timestamp defaults.
pub trait Clock: Send + Sync {
    fn now(&self) -> StorageDatetime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> StorageDatetime {
        StorageDatetime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<StorageDatetime>,
}

impl FixedClock {
    pub fn new(at: impl Into<StorageDatetime>) -> Self {
        Self {
            current: Mutex::new(at.into()),
        }
    }

    pub fn set(&self, at: impl Into<StorageDatetime>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = at.into();
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = current.clone() + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> StorageDatetime {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
