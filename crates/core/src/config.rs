use std::env;

use serde::{Deserialize, Serialize};

/// Default per-stream capture cap for child processes (64 MiB).
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024 * 1024;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ── Engine settings ───────────────────────────────────────────

/// Runtime knobs for the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum bytes captured from each of stdout / stderr per command.
    /// Output beyond this is drained and counted but not kept.
    pub output_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

impl EngineSettings {
    /// Build settings from environment variables (call `load_dotenv()` first).
    ///
    /// - `KAT_OUTPUT_LIMIT`: capture cap in bytes (0 disables capture entirely).
    pub fn from_env() -> Self {
        Self {
            output_limit: env_usize("KAT_OUTPUT_LIMIT", DEFAULT_OUTPUT_LIMIT),
        }
    }

    /// Override the capture cap.
    pub fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::debug!(output_limit = self.output_limit, "engine settings loaded");
    }
}
