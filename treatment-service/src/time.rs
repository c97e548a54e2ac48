use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

pub trait TimeSource {
    fn current_time(&self) -> DateTime<Utc>;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct FixedTime {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedTime {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedTime {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }
}

impl TimeSource for FixedTime {
    fn current_time(&self) -> DateTime<Utc> {
        self.now.read().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }
}
