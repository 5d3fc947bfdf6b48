//! Injectable effects for deterministic behavior
//!
//! Timestamps, salts, and lifecycle uuids all flow through an explicit,
//! passed-in `Effects` bundle rather than global clocks or RNGs. Production
//! code uses real time and OS entropy; tests use a simulated clock and a
//! seeded RNG so challenge pools and minted identifiers are reproducible.

use crate::errors::{KeystoneError, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use uuid::Uuid;

/// Abstract time source - real system time or simulated time
pub trait TimeSource: Send + Sync {
    /// Current Unix timestamp in seconds
    fn now_unix(&self) -> Result<u64>;

    /// Advance time by N seconds (no-op for real time, used in tests)
    fn advance(&self, _seconds: u64) -> Result<()> {
        Ok(())
    }

    /// Whether this is a simulated source
    fn is_simulated(&self) -> bool {
        false
    }
}

/// Real system clock (production use)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_unix(&self) -> Result<u64> {
        let now = Utc::now().timestamp();
        u64::try_from(now)
            .map_err(|_| KeystoneError::internal("system time is before the Unix epoch"))
    }
}

/// Simulated clock for deterministic tests
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    current: Arc<Mutex<u64>>,
}

impl SimulatedClock {
    /// Create a simulated clock starting at the given Unix timestamp
    pub fn new(initial: u64) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }
}

impl TimeSource for SimulatedClock {
    fn now_unix(&self) -> Result<u64> {
        Ok(*self.current.lock())
    }

    fn advance(&self, seconds: u64) -> Result<()> {
        let mut current = self.current.lock();
        *current = current.saturating_add(seconds);
        Ok(())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Abstract randomness source - OS entropy or seeded deterministic RNG
pub trait RandomSource: Send + Sync {
    /// Fill a byte buffer with random data
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Generate a UUID (v4 in production, deterministic under a seed)
    fn gen_uuid(&self) -> Uuid;
}

/// OS entropy source (production use)
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }

    fn gen_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Seeded deterministic RNG (same seed, same sequence)
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: Arc<Mutex<StdRng>>,
}

impl SeededRandom {
    /// Create a seeded RNG
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Derive a seed from a test name for per-test isolation
    pub fn from_test_name(test_name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        test_name.hash(&mut hasher);
        Self::new(hasher.finish())
    }
}

impl RandomSource for SeededRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().fill_bytes(dest);
    }

    fn gen_uuid(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.fill_bytes(&mut bytes);
        Uuid::from_bytes(bytes)
    }
}

/// Bundle of injectable effects
///
/// Pass this to anything that needs a timestamp, a salt, or an instance id.
#[derive(Clone)]
pub struct Effects {
    /// Time source for timestamps and expiration checks
    pub time: Arc<dyn TimeSource>,
    /// Randomness for salts, uuids, and instance tokens
    pub random: Arc<dyn RandomSource>,
}

impl Effects {
    /// Production effects: real clock + OS entropy
    pub fn production() -> Self {
        Self {
            time: Arc::new(SystemClock),
            random: Arc::new(OsRandom),
        }
    }

    /// Deterministic effects: simulated clock + seeded RNG
    pub fn deterministic(seed: u64, initial_time: u64) -> Self {
        Self {
            time: Arc::new(SimulatedClock::new(initial_time)),
            random: Arc::new(SeededRandom::new(seed)),
        }
    }

    /// Deterministic effects isolated by test name, starting 2025-01-01
    pub fn for_test(test_name: &str) -> Self {
        Self {
            time: Arc::new(SimulatedClock::new(1735689600)),
            random: Arc::new(SeededRandom::from_test_name(test_name)),
        }
    }

    /// Current Unix timestamp
    pub fn now(&self) -> Result<u64> {
        self.time.now_unix()
    }

    /// Current time as a UTC datetime
    pub fn now_utc(&self) -> Result<DateTime<Utc>> {
        let unix = self.now()?;
        let unix = i64::try_from(unix)
            .map_err(|_| KeystoneError::internal("timestamp out of datetime range"))?;
        Utc.timestamp_opt(unix, 0)
            .single()
            .ok_or_else(|| KeystoneError::internal("timestamp out of datetime range"))
    }

    /// Advance the clock (simulation only)
    pub fn advance_time(&self, seconds: u64) -> Result<()> {
        self.time.advance(seconds)
    }

    /// Generate a fixed-size array of random bytes
    pub fn random_bytes<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random.fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a UUID
    pub fn gen_uuid(&self) -> Uuid {
        self.random.gen_uuid()
    }

    /// Whether the effects are simulated
    pub fn is_simulated(&self) -> bool {
        self.time.is_simulated()
    }
}

impl Default for Effects {
    fn default() -> Self {
        Self::production()
    }
}
