//! Application state
//!
//! Holds all shared components and state

use crate::detector::{Detector, PersonFilter};
use crate::session_aggregator::{FinalizePolicy, SessionAggregator};
use crate::summary_sink::SummarySink;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL (finalized summaries)
    pub database_url: String,
    /// Inference server URL
    pub detector_url: String,
    /// Server port
    pub port: u16,
    /// Server host
    pub host: String,
    /// Shared secret for the session-wide query; unset means always rejected
    pub host_token: Option<String>,
    /// Deadline for one detector call
    pub detector_timeout: Duration,
    /// Deadline for one summary append
    pub sink_timeout: Duration,
    /// Summary append attempts per finalize
    pub sink_max_attempts: u32,
    /// Detection label that counts as attentive
    pub person_label: String,
    /// Minimum confidence for that label
    pub min_confidence: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "mysql://root@localhost/attendance_db".to_string()),
            detector_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            port: env_parse("PORT").unwrap_or(8000),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            host_token: std::env::var("HOST_TOKEN").ok().filter(|t| !t.is_empty()),
            detector_timeout: Duration::from_millis(env_parse("DETECTOR_TIMEOUT_MS").unwrap_or(10_000)),
            sink_timeout: Duration::from_millis(env_parse("SINK_TIMEOUT_MS").unwrap_or(5_000)),
            sink_max_attempts: env_parse("SINK_MAX_ATTEMPTS").unwrap_or(3),
            person_label: std::env::var("PERSON_LABEL").unwrap_or_else(|_| "person".to_string()),
            min_confidence: env_parse("MIN_CONFIDENCE").unwrap_or(0.0),
        }
    }
}

impl AppConfig {
    /// Exact string match against the configured host token
    pub fn token_matches(&self, token: Option<&str>) -> bool {
        match (&self.host_token, token) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }

    pub fn finalize_policy(&self) -> FinalizePolicy {
        FinalizePolicy {
            sink_timeout: self.sink_timeout,
            max_attempts: self.sink_max_attempts,
            ..FinalizePolicy::default()
        }
    }

    pub fn person_filter(&self) -> PersonFilter {
        PersonFilter {
            label: self.person_label.clone(),
            min_confidence: self.min_confidence,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// SessionAggregator (live counters)
    pub aggregator: Arc<SessionAggregator>,
    /// Detector (inference adapter)
    pub detector: Arc<dyn Detector>,
    /// SummarySink (durable log, health only; writes go through the aggregator)
    pub sink: Arc<dyn SummarySink>,
}

impl AppState {
    /// Wire the aggregator to `sink` using the config's finalize policy
    pub fn new(config: AppConfig, detector: Arc<dyn Detector>, sink: Arc<dyn SummarySink>) -> Self {
        let aggregator = Arc::new(SessionAggregator::new(sink.clone(), config.finalize_policy()));
        Self {
            config,
            aggregator,
            detector,
            sink,
        }
    }
}
