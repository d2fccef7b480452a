//! Advisory progress reporting for long-running recognition.
//!
//! Engines call [`ProgressSink::report`] as they move through their stages.
//! Sinks only observe: nothing they do can change the engine's result or the
//! orchestrator's decisions.

use std::sync::Mutex;

/// Observer for engine progress.
pub trait ProgressSink: Send + Sync {
    /// `progress` is in `[0.0, 1.0]`.
    fn report(&self, status: &str, progress: f32);
}

/// Writes progress to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, status: &str, progress: f32) {
        log::debug!("ocr: {status} ({:.0}%)", progress.clamp(0.0, 1.0) * 100.0);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _status: &str, _progress: f32) {}
}

/// Keeps every report in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<(String, f32)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, f32)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, status: &str, progress: f32) {
        if let Ok(mut events) = self.events.lock() {
            events.push((status.to_string(), progress));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_progress_keeps_order() {
        let sink = RecordingProgress::new();
        sink.report("loading", 0.0);
        sink.report("recognizing text", 0.5);
        sink.report("done", 1.0);

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].0, "loading");
        assert_eq!(events[2], ("done".to_string(), 1.0));
    }

    #[test]
    fn sinks_are_object_safe() {
        let sinks: Vec<Box<dyn ProgressSink>> = vec![
            Box::new(LogProgress),
            Box::new(NoProgress),
            Box::new(RecordingProgress::new()),
        ];
        for sink in &sinks {
            sink.report("x", 2.0);
        }
    }
}
