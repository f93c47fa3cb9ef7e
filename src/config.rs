//! Pipeline configuration
//!
//! Every knob has a default; `PipelineConfig::from_env` overlays values from
//! the environment (loading `.env` first when present).

use crate::error::ConfigError;
use crate::summarize::types::ProcessingStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How section tasks are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Schedule {
    /// Every section is spawned up front; the concurrency gate bounds in-flight calls
    Bounded,
    /// Fixed-size batches run one after another
    Batched { batch_size: usize },
}

/// Settings for the concurrent section processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum simultaneous summarizer calls
    pub concurrency_limit: usize,
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Backoff before retry `n` is `n * retry_base_delay`
    #[serde(with = "duration_ms")]
    pub retry_base_delay: Duration,
    /// Minimum spacing between call starts (rate-limited services)
    #[serde(with = "duration_ms")]
    pub min_request_interval: Duration,
    pub schedule: Schedule,
    /// Give up on a section at the first non-retryable error (4xx other than 429)
    /// instead of spending its retries
    pub fail_fast_on_client_errors: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            min_request_interval: Duration::ZERO,
            schedule: Schedule::Bounded,
            fail_fast_on_client_errors: false,
        }
    }
}

/// Settings for hierarchical aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Section-level length factor for DUAL, relative to the final ratio (tunable)
    pub dual_intermediate_factor: f64,
    /// Section-level length factor for MULTI, relative to the final ratio (tunable)
    pub multi_intermediate_factor: f64,
    /// Lower clamp for the final-pass multiplier
    pub min_final_multiplier: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            dual_intermediate_factor: 2.0,
            multi_intermediate_factor: 3.0,
            min_final_multiplier: 0.01,
        }
    }
}

impl AggregationConfig {
    /// Length multiplier for section-level calls under `strategy`
    pub fn intermediate_multiplier(&self, strategy: ProcessingStrategy, target_ratio: f64) -> f64 {
        let factor = match strategy {
            ProcessingStrategy::Single => 1.0,
            ProcessingStrategy::Dual => self.dual_intermediate_factor,
            ProcessingStrategy::Multi => self.multi_intermediate_factor,
        };
        (target_ratio * factor).min(1.0)
    }
}

/// Input bounds checked before sectioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Characters, not bytes
    pub min_text_length: usize,
    pub max_text_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_text_length: 1,
            max_text_length: 5_000_000,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub processor: ProcessorConfig,
    pub aggregation: AggregationConfig,
    pub validation: ValidationConfig,
}

impl PipelineConfig {
    /// Defaults overlaid with `LONGDOC_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(limit) = parse_var::<usize, _>(&lookup, "LONGDOC_CONCURRENCY")? {
            if limit == 0 {
                return Err(ConfigError::Invalid {
                    key: "LONGDOC_CONCURRENCY".to_string(),
                    value: "0".to_string(),
                });
            }
            config.processor.concurrency_limit = limit;
        }
        if let Some(retries) = parse_var(&lookup, "LONGDOC_MAX_RETRIES")? {
            config.processor.max_retries = retries;
        }
        if let Some(ms) = parse_var(&lookup, "LONGDOC_RETRY_BASE_MS")? {
            config.processor.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "LONGDOC_MIN_REQUEST_INTERVAL_MS")? {
            config.processor.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(batch_size) = parse_var::<usize, _>(&lookup, "LONGDOC_BATCH_SIZE")? {
            config.processor.schedule = if batch_size == 0 {
                Schedule::Bounded
            } else {
                Schedule::Batched { batch_size }
            };
        }
        if let Some(fail_fast) = parse_var(&lookup, "LONGDOC_FAIL_FAST_CLIENT_ERRORS")? {
            config.processor.fail_fast_on_client_errors = fail_fast;
        }
        if let Some(max) = parse_var(&lookup, "LONGDOC_MAX_TEXT_LENGTH")? {
            config.validation.max_text_length = max;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
