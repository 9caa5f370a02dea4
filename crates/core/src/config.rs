use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub store: StoreConfig,
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LEXIO_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LEXIO_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            pool: PoolConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
            evaluation: EvaluationConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  pool:        workers={}", self.pool.workers);
        tracing::info!(
            "  queue:       capacity={}, producer_permits={}",
            self.queue.capacity,
            self.queue.producer_permits
        );
        tracing::info!(
            "  store:       template_latency={}ms, read_latency={}ms, write_latency={}ms",
            self.store.template_latency_ms,
            self.store.student_read_latency_ms,
            self.store.student_write_latency_ms
        );
        tracing::info!("  evaluation:  result_buffer={}", self.evaluation.result_buffer);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            pool: PoolConfig::default(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

// ── Worker pool ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of evaluation worker threads (at least 1).
    pub workers: usize,
}

impl PoolConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            workers: profiled_env_usize(p, "POOL_WORKERS", default_worker_count()).max(1),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
        }
    }
}

// ── Exercise queue ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Bounded buffer size; producers block once it is full.
    pub capacity: usize,
    /// Producers admitted concurrently into `enqueue`.
    pub producer_permits: usize,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            capacity: profiled_env_usize(p, "EXERCISE_QUEUE_CAPACITY", 100).max(1),
            producer_permits: profiled_env_usize(p, "EXERCISE_PRODUCER_PERMITS", 10).max(1),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            producer_permits: 10,
        }
    }
}

// ── In-memory stores ──────────────────────────────────────────

/// Simulated persistence latency of the in-memory collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub template_latency_ms: u64,
    pub student_read_latency_ms: u64,
    pub student_write_latency_ms: u64,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            template_latency_ms: profiled_env_u64(
                p,
                "TEMPLATE_LATENCY_MS",
                defaults.template_latency_ms,
            ),
            student_read_latency_ms: profiled_env_u64(
                p,
                "STUDENT_READ_LATENCY_MS",
                defaults.student_read_latency_ms,
            ),
            student_write_latency_ms: profiled_env_u64(
                p,
                "STUDENT_WRITE_LATENCY_MS",
                defaults.student_write_latency_ms,
            ),
        }
    }

    /// Stores that answer immediately.
    pub fn no_latency() -> Self {
        Self {
            template_latency_ms: 0,
            student_read_latency_ms: 0,
            student_write_latency_ms: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            template_latency_ms: 50,
            student_read_latency_ms: 20,
            student_write_latency_ms: 30,
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Capacity of each result subscriber's feed. Grading waits when a
    /// feed is full.
    pub result_buffer: usize,
}

impl EvaluationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            result_buffer: profiled_env_usize(p, "EVALUATION_RESULT_BUFFER", 256).max(1),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { result_buffer: 256 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("LEXIOTEST_POOL_WORKERS", "3");
        let config = Config::for_profile("lexiotest");
        assert_eq!(config.profile, "LEXIOTEST");
        assert_eq!(config.pool.workers, 3);
        env::remove_var("LEXIOTEST_POOL_WORKERS");
    }

    #[test]
    fn zero_sizes_are_clamped() {
        env::set_var("ZEROTEST_EXERCISE_QUEUE_CAPACITY", "0");
        env::set_var("ZEROTEST_EXERCISE_PRODUCER_PERMITS", "0");
        let config = Config::for_profile("zerotest");
        assert_eq!(config.queue.capacity, 1);
        assert_eq!(config.queue.producer_permits, 1);
        env::remove_var("ZEROTEST_EXERCISE_QUEUE_CAPACITY");
        env::remove_var("ZEROTEST_EXERCISE_PRODUCER_PERMITS");
    }

    #[test]
    fn default_profile_label() {
        let config = Config::default();
        assert_eq!(config.profile_label(), "default");
        assert!(config.pool.workers >= 1);
    }

    #[test]
    fn store_default_matches_unset_environment() {
        let defaults = StoreConfig::default();
        assert_eq!(
            (
                defaults.template_latency_ms,
                defaults.student_read_latency_ms,
                defaults.student_write_latency_ms
            ),
            (50, 20, 30)
        );
        assert_eq!(Config::for_profile("storedefaulttest").store, defaults);
    }
}
