use log::debug;
use serde::Serialize;

/// One progress notification. Either part may be absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub percent: Option<f32>,
    pub message: Option<String>,
}

/// Receiver of progress events, passed explicitly into every invocation.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Per-invocation reporter. Percent never decreases and stays below 100
/// until [`ProgressReporter::finish`].
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    last_percent: f32,
}

impl<'a> ProgressReporter<'a> {
    const CEILING_BEFORE_FINISH: f32 = 99.0;

    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last_percent: 0.0,
        }
    }

    pub fn update(&mut self, percent: f32, message: impl Into<String>) {
        let percent = percent
            .min(Self::CEILING_BEFORE_FINISH)
            .max(self.last_percent);
        self.emit(Some(percent), Some(message.into()));
    }

    pub fn message(&mut self, message: impl Into<String>) {
        self.emit(None, Some(message.into()));
    }

    pub fn finish(&mut self, message: impl Into<String>) {
        self.emit(Some(100.0), Some(message.into()));
    }

    fn emit(&mut self, percent: Option<f32>, message: Option<String>) {
        if let Some(percent) = percent {
            self.last_percent = percent;
        }
        if let Some(message) = &message {
            debug!("progress: {message}");
        }
        self.sink.report(ProgressEvent { percent, message });
    }
}
