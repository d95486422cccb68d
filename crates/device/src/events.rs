//! Lifecycle call recording

use std::sync::{Arc, Mutex};

/// Device lifecycle call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Opened { serial: String },
    ListenerAttached { serial: String },
    Started { serial: String },
    Stopped { serial: String },
    Closed { serial: String },
}

/// Shared, append-only list of lifecycle calls
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<DeviceEvent>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: DeviceEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn snapshot(&self) -> Vec<DeviceEvent> {
        self.0.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Count of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.0
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or(0)
    }
}
