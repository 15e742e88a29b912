//! Unit tests for log.rs
//!
//! The logger slot is process-wide: every test touching it is #[serial].

use crate::log::{self, Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::prism::Error;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Logger capturing entries for verification
#[derive(Clone)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Entries logged by this file (other tests may log concurrently)
    fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.source == "prism::test")
            .cloned()
            .collect()
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_default_logger_accepts_both_entry_shapes() {
    let logger = DefaultLogger;
    logger.log(&LogEntry {
        severity: LogSeverity::Info,
        timestamp: SystemTime::now(),
        source: "prism::test".to_string(),
        message: "plain".to_string(),
        file: None,
        line: None,
    });
    logger.log(&LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "prism::test".to_string(),
        message: "detailed".to_string(),
        file: Some("log_tests.rs"),
        line: Some(1),
    });
}

// ============================================================================
// GLOBAL SLOT TESTS
// ============================================================================

#[test]
#[serial]
fn test_macros_reach_custom_logger() {
    let capture = CaptureLogger::new();
    log::set_logger(capture.clone());

    crate::engine_info!("prism::test", "pass {} ready", "gbuffer");
    crate::engine_warn!("prism::test", "slow frame");

    let entries = capture.entries();
    log::reset_logger();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].severity, LogSeverity::Info);
    assert_eq!(entries[0].message, "pass gbuffer ready");
    assert_eq!(entries[0].source, "prism::test");
    assert!(entries[0].file.is_none());
    assert_eq!(entries[1].severity, LogSeverity::Warn);
}

#[test]
#[serial]
fn test_engine_error_carries_file_and_line() {
    let capture = CaptureLogger::new();
    log::set_logger(capture.clone());

    crate::engine_error!("prism::test", "device lost");

    let entries = capture.entries();
    log::reset_logger();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file, Some(file!()));
    assert!(entries[0].line.is_some());
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let capture = CaptureLogger::new();
    log::set_logger(capture.clone());
    log::set_min_severity(LogSeverity::Warn);

    crate::engine_trace!("prism::test", "hidden");
    crate::engine_debug!("prism::test", "hidden");
    crate::engine_info!("prism::test", "hidden");
    crate::engine_warn!("prism::test", "shown");

    assert_eq!(log::min_severity(), LogSeverity::Warn);
    let entries = capture.entries();
    log::reset_logger();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "shown");
    assert_eq!(log::min_severity(), LogSeverity::Trace);
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let capture = CaptureLogger::new();
    log::set_logger(capture.clone());

    let err = crate::engine_err!("prism::test", "code {}", 7);

    let entries = capture.entries();
    log::reset_logger();

    match err {
        Error::BackendError(msg) => assert_eq!(msg, "code 7"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn fails(flag: bool) -> crate::prism::Result<u32> {
        if flag {
            crate::engine_bail!("prism::test", "Pass '{}' already exists", "shadow");
        }
        Ok(1)
    }

    let capture = CaptureLogger::new();
    log::set_logger(capture);

    let failed = fails(true);
    let passed = fails(false);
    log::reset_logger();

    match failed {
        Err(Error::BackendError(msg)) => assert!(msg.contains("already exists")),
        other => panic!("expected BackendError, got {:?}", other),
    }
    assert_eq!(passed.unwrap(), 1);
}
