//! Host callback interface for progress and diagnostic events.
//!
//! The embedding pipeline engine receives session events through this trait
//! instead of inheriting a component base class. The default implementation
//! forwards to `tracing`.

use tracing::{error, info, warn};

/// Callback sink for events raised during a load session.
pub trait EventSink: Send + Sync {
    /// Informational message.
    fn info(&self, message: &str);

    /// Warning message.
    fn warning(&self, message: &str);

    /// Error message. Raised in addition to the returned error when extra
    /// context exists (e.g. a rollback failure on an error path).
    fn error(&self, message: &str);
}

/// Default event sink that forwards to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Event sink that records messages for assertions.
    #[derive(Debug, Default)]
    struct RecordingEvents {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl EventSink for RecordingEvents {
        fn info(&self, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push(("info".into(), message.into()));
        }

        fn warning(&self, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push(("warning".into(), message.into()));
        }

        fn error(&self, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push(("error".into(), message.into()));
        }
    }

    #[test]
    fn test_sink_receives_severities() {
        let sink = RecordingEvents::default();
        let dynamic: &dyn EventSink = &sink;
        dynamic.info("a");
        dynamic.warning("b");
        dynamic.error("c");

        let messages = sink.messages.lock().unwrap();
        assert_eq!(
            *messages,
            vec![
                ("info".to_string(), "a".to_string()),
                ("warning".to_string(), "b".to_string()),
                ("error".to_string(), "c".to_string()),
            ]
        );
    }
}
