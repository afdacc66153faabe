//! Brute-force throttling around vault unlock attempts.
//!
//! `IntegrityGuard` counts consecutive authentication failures.  Once the
//! configured threshold is reached it refuses further attempts until a
//! cooldown has passed on a monotonic clock.  A refused attempt returns
//! `Cooldown` immediately: no key derivation runs and nothing sleeps.
//!
//! ```text
//! Idle { failures } --(failures reach max)--> Locked { until }
//! Locked { until }  --(clock passes until)--> Idle { failures: 0 }
//! any success                             --> Idle { failures: 0 }
//! ```
//!
//! A guard lives in memory.  Short-lived processes carry its state from
//! one run to the next with a [`GuardRecord`] stored beside the vault
//! file (`.<vault name>.guard`, JSON, owner-only).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::format;
use crate::errors::{ErrorKind, Result, VaultError};

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// Throttling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    /// Consecutive failures that trigger a cooldown.  `0` disables it.
    pub max_failures: u32,
    /// How long attempts are refused once triggered.
    pub cooldown: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Observable guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle { failures: u32 },
    Locked { until: Instant },
}

/// Guard state in a form that survives the process.
///
/// The cooldown end is wall-clock time because monotonic instants mean
/// nothing to another process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRecord {
    pub failures: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    failures: u32,
    last_attempt: Option<Instant>,
    locked_until: Option<Instant>,
}

/// Failure counter and cooldown gate for unlock attempts.
///
/// Attempts through one guard run one at a time, so concurrent callers
/// cannot all slip past the check while the counter sits one below the
/// threshold.
pub struct IntegrityGuard {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    in_flight: Mutex<()>,
}

impl IntegrityGuard {
    pub fn new(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner::default()),
            in_flight: Mutex::new(()),
        }
    }

    /// Guard backed by the system monotonic clock.
    pub fn with_system_clock(config: GuardConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Current state, expiring an elapsed cooldown first.
    pub fn state(&self) -> GuardState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Self::expire(&mut inner, now);
        match inner.locked_until {
            Some(until) => GuardState::Locked { until },
            None => GuardState::Idle {
                failures: inner.failures,
            },
        }
    }

    /// Time of the last counted attempt, if any.
    pub fn last_attempt(&self) -> Option<Instant> {
        self.inner.lock().last_attempt
    }

    /// Fail with `Cooldown` if attempts are currently refused.
    pub fn check(&self) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Self::expire(&mut inner, now);
        match inner.locked_until {
            Some(until) => Err(VaultError::Cooldown {
                remaining: until.saturating_duration_since(now),
            }),
            None => Ok(()),
        }
    }

    /// Run `attempt` unless cooling down, then record its outcome.
    ///
    /// Only `Auth` failures count towards the threshold.  Other errors
    /// (missing file, malformed data, weak parameters) neither count nor
    /// reset the streak.
    pub fn attempt<T>(&self, attempt: impl FnOnce() -> Result<T>) -> Result<T> {
        let _turn = self.in_flight.lock();
        if let Err(e) = self.check() {
            tracing::warn!("unlock attempt refused during cooldown");
            return Err(e);
        }

        let result = attempt();
        match &result {
            Ok(_) => self.record_success(),
            Err(e) if e.kind() == ErrorKind::Auth => self.record_failure(),
            Err(_) => {}
        }
        result
    }

    /// Reset the failure streak.
    pub fn record_success(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.failures = 0;
        inner.locked_until = None;
        inner.last_attempt = Some(now);
    }

    /// Count one authentication failure, locking at the threshold.
    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_attempt = Some(now);

        if self.config.max_failures > 0 && inner.failures >= self.config.max_failures {
            inner.locked_until = Some(now + self.config.cooldown);
            tracing::warn!(
                failures = inner.failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "too many failed unlock attempts, cooling down"
            );
        } else {
            tracing::warn!(failures = inner.failures, "unlock attempt failed");
        }
    }

    /// Snapshot the counter and any running cooldown.
    pub fn to_record(&self) -> GuardRecord {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        Self::expire(&mut inner, now);
        let locked_until = inner.locked_until.and_then(|until| {
            let remaining = chrono::Duration::from_std(until.saturating_duration_since(now)).ok()?;
            Some(Utc::now() + remaining)
        });
        GuardRecord {
            failures: inner.failures,
            locked_until,
        }
    }

    /// Adopt a record written by an earlier process.
    ///
    /// A cooldown that has already ended clears the streak.  A running one
    /// never lasts longer than the configured cooldown from now, so a
    /// skewed wall clock cannot lock the vault indefinitely.
    pub fn restore(&self, record: &GuardRecord) {
        let now = self.clock.now();
        let remaining = record
            .locked_until
            .and_then(|until| (until - Utc::now()).to_std().ok())
            .filter(|left| !left.is_zero())
            .map(|left| left.min(self.config.cooldown));

        let mut inner = self.inner.lock();
        match (record.locked_until, remaining) {
            (_, Some(left)) => {
                inner.failures = record.failures;
                inner.locked_until = Some(now + left);
            }
            (Some(_), None) => {
                inner.failures = 0;
                inner.locked_until = None;
            }
            (None, None) => {
                inner.failures = record.failures;
                inner.locked_until = None;
            }
        }
    }

    fn expire(inner: &mut Inner, now: Instant) {
        if matches!(inner.locked_until, Some(until) if now >= until) {
            inner.locked_until = None;
            inner.failures = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// Guard state file
// ---------------------------------------------------------------------------

/// Where the guard state of the vault at `vault_path` is kept.
pub fn record_path(vault_path: &Path) -> PathBuf {
    let name = vault_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vault".into());
    vault_path.with_file_name(format!(".{name}.guard"))
}

/// Load the stored guard state, or a clean one if none was stored.
///
/// An unreadable record is an error rather than a fresh start.
pub fn load_record(vault_path: &Path) -> Result<GuardRecord> {
    let path = record_path(vault_path);
    match fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content).map_err(|e| {
            VaultError::Serialization(format!("guard state {}: {e}", path.display()))
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(GuardRecord::default()),
        Err(e) => Err(e.into()),
    }
}

/// Store the guard state.  A clean state removes the file.
pub fn save_record(vault_path: &Path, record: &GuardRecord) -> Result<()> {
    let path = record_path(vault_path);
    if *record == GuardRecord::default() {
        return match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        };
    }

    let content = serde_json::to_string_pretty(record)
        .map_err(|e| VaultError::Serialization(format!("guard state: {e}")))?;
    format::write_file(&path, content.as_bytes())
}
