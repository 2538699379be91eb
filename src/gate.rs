use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Time source for the refresh gate; injectable so tests can drive it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Rate limiter for refresh cycles, keyed by caller-chosen identifiers
/// (typically `view:<id>` or `source:<id>`). The first request for a key
/// passes and stamps the clock; further requests within the interval are
/// refused. This is what keeps at most one refresh in flight per key.
pub struct RefreshGate {
    clock: Arc<dyn Clock>,
    last: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_refresh(&self, key: &str, interval: Duration) -> bool {
        let now = self.clock.now();
        let mut last = self.last.lock().expect("refresh gate lock poisoned");
        match last.get(key) {
            Some(stamp) if now - *stamp < interval => {
                debug!("refresh gate refused {}", key);
                false
            }
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}
