//! Logging infrastructure.
//!
//! Structured logging via `tracing`/`tracing-subscriber`: JSON or pretty
//! formatting, optional daily-rolling file output, and secret scrubbing
//! applied to every formatted event before it leaves the process.

mod logger;
mod secret_scrubbing;

pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubbingLayer;
