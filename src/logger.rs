use std::sync::Arc;

use parking_lot::Mutex;

/// Line-oriented sink for harness progress messages.
pub trait Logger {
    fn log(&self, line: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, line: &str) {
        tracing::info!(target: "optibench", "{line}");
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentLogger;

impl Logger for SilentLogger {
    fn log(&self, _line: &str) {}
}

/// Records lines in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct CaptureLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Logger for CaptureLogger {
    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_logger_shares_buffer() {
        let logger = CaptureLogger::new();
        let handle = logger.clone();
        logger.log("---");
        logger.log("Calibrating...");
        assert_eq!(handle.lines(), vec!["---", "Calibrating..."]);
        handle.clear();
        assert!(logger.lines().is_empty());
    }
}
