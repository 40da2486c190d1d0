//! Attendance Server Library
//!
//! Clients periodically submit webcam frames for a (user, session) pair. Each
//! frame runs through person detection; the verdicts accumulate in memory
//! until the session is finalized into durable storage.
//!
//! ## Components
//!
//! 1. FrameDecoder - data-URI/base64 payload to RGB pixel grid
//! 2. Detector - person detection adapter (inference server)
//! 3. SessionAggregator - per-(user, session) counters, finalize transaction
//! 4. SummarySink - append-only store for finalized summaries
//! 5. WebAPI - REST API endpoints

pub mod detector;
pub mod error;
pub mod frame_decoder;
pub mod models;
pub mod session_aggregator;
pub mod state;
pub mod summary_sink;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
