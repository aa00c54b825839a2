//! Time sources.
//!
//! The registry never reads the wall clock directly. Every component that
//! needs "now" is handed a [`Clock`], so tests can pin and advance time.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn advance(&self, by: Duration) {
    let mut now = self.lock();
    *now += by;
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
    // A poisoned lock still holds a valid timestamp.
    self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.lock() }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
  fn now(&self) -> DateTime<Utc> { (**self).now() }
}

impl<C: Clock + ?Sized> Clock for &C {
  fn now(&self) -> DateTime<Utc> { (**self).now() }
}
