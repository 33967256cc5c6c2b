//! Phase-tagged progress lines for integration tests.
//!
//! Written to stderr, which the harness only shows for failing tests, so a
//! failure report ends with the phase it died in.
//!
//! Set `TEST_LOG=quiet` to suppress, or `TEST_LOG=json` for one JSON object
//! per line.
#![allow(dead_code)]

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use chrono::Utc;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Json,
    Quiet,
}

fn mode() -> Mode {
    static MODE: OnceLock<Mode> = OnceLock::new();
    *MODE.get_or_init(|| match std::env::var("TEST_LOG").as_deref() {
        Ok("quiet" | "0" | "off") => Mode::Quiet,
        Ok("json") => Mode::Json,
        _ => Mode::Text,
    })
}

/// Per-test logger.
pub struct TestLogger {
    test: String,
    started: Instant,
    phase: Mutex<&'static str>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test: &str) -> Self {
        let logger = Self {
            test: test.to_string(),
            started: Instant::now(),
            phase: Mutex::new("setup"),
        };
        logger.emit("start");
        logger
    }

    pub fn phase(&self, phase: &'static str) {
        *self.phase.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = phase;
        self.emit("phase");
    }

    pub fn finish_ok(&self) {
        self.emit("passed");
    }

    fn emit(&self, event: &str) {
        let phase = *self.phase.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let elapsed_ms = self.started.elapsed().as_millis();
        match mode() {
            Mode::Quiet => {}
            Mode::Json => eprintln!(
                "{}",
                json!({
                    "ts": Utc::now().to_rfc3339(),
                    "test": self.test,
                    "event": event,
                    "phase": phase,
                    "elapsedMs": elapsed_ms,
                })
            ),
            Mode::Text => eprintln!("[{}] {event} phase={phase} +{elapsed_ms}ms", self.test),
        }
    }
}
