//! Bundle assembler behind the frame listener service.
//!
//! The device thread pushes single frames; once one frame of every kind is
//! pending they are published together as a bundle. A published bundle that
//! nobody picked up is replaced by the next one (latest wins).

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{ContractError, FrameBundle, FrameListener, StreamFrame, StreamKind};
use tracing::{debug, instrument, trace};

/// Listener counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Frames accepted from the device
    pub frames_received: u64,
    /// Frames ignored while stopped
    pub frames_ignored: u64,
    /// Pending frames overwritten by a newer frame of the same kind
    pub frames_superseded: u64,
    /// Bundles published
    pub bundles_published: u64,
    /// Published bundles replaced before anyone waited for them
    pub bundles_dropped: u64,
}

#[derive(Debug)]
struct ListenerState {
    accepting: bool,
    pending: [Option<StreamFrame>; 3],
    ready: Option<FrameBundle>,
    outstanding: Option<u64>,
    next_id: u64,
    stats: ListenerStats,
}

impl ListenerState {
    fn missing(&self) -> Vec<StreamKind> {
        StreamKind::ALL
            .into_iter()
            .filter(|kind| self.pending[kind.index()].is_none())
            .collect()
    }

    /// Publish the pending frames once all three kinds are present
    fn try_publish(&mut self) -> bool {
        if self.pending.iter().any(Option::is_none) {
            return false;
        }
        let [color, infrared, depth] = std::mem::take(&mut self.pending);
        let (Some(color), Some(infrared), Some(depth)) = (color, infrared, depth) else {
            return false;
        };

        self.next_id += 1;
        let bundle = FrameBundle {
            id: self.next_id,
            color,
            infrared,
            depth,
        };

        if let Some(old) = self.ready.replace(bundle) {
            self.stats.bundles_dropped += 1;
            metrics::counter!("listener_bundles_dropped").increment(1);
            trace!(bundle_id = old.id, "unconsumed bundle replaced");
        }
        self.stats.bundles_published += 1;
        true
    }
}

/// Multi-frame listener that hands out complete Color + Infrared + Depth bundles
#[derive(Debug)]
pub struct SyncMultiFrameListener {
    state: Mutex<ListenerState>,
    ready: Condvar,
}

impl Default for SyncMultiFrameListener {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMultiFrameListener {
    /// Create a listener that accepts frames immediately
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState {
                accepting: true,
                pending: [None, None, None],
                ready: None,
                outstanding: None,
                next_id: 0,
                stats: ListenerStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ListenerState>, ContractError> {
        self.state
            .lock()
            .map_err(|_| ContractError::Other("frame listener lock poisoned".to_string()))
    }

    /// Stop accepting frames and drop everything pending
    pub fn stop(&self) {
        if let Ok(mut state) = self.lock() {
            state.accepting = false;
            state.pending = [None, None, None];
            state.ready = None;
        }
        self.ready.notify_all();
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().map(|state| state.accepting).unwrap_or(false)
    }

    /// Id of the bundle currently handed out
    pub fn outstanding(&self) -> Option<u64> {
        self.lock().ok().and_then(|state| state.outstanding)
    }

    pub fn stats(&self) -> ListenerStats {
        self.lock().map(|state| state.stats).unwrap_or_default()
    }
}

impl FrameListener for SyncMultiFrameListener {
    fn on_new_frame(&self, frame: StreamFrame) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        if !state.accepting {
            state.stats.frames_ignored += 1;
            return false;
        }

        state.stats.frames_received += 1;
        let slot = frame.kind.index();
        if state.pending[slot].replace(frame).is_some() {
            state.stats.frames_superseded += 1;
        }

        if state.try_publish() {
            drop(state);
            self.ready.notify_one();
        }
        true
    }

    #[instrument(
        level = "trace",
        name = "listener_wait_for_bundle",
        skip(self),
        fields(timeout_ms = timeout.as_millis() as u64)
    )]
    fn wait_for_bundle(&self, timeout: Duration) -> Result<FrameBundle, ContractError> {
        let state = self.lock()?;
        if let Some(id) = state.outstanding {
            return Err(ContractError::Other(format!(
                "bundle {id} must be released before waiting again"
            )));
        }

        let (mut state, _) = self
            .ready
            .wait_timeout_while(state, timeout, |s| s.accepting && s.ready.is_none())
            .map_err(|_| ContractError::Other("frame listener lock poisoned".to_string()))?;

        match state.ready.take() {
            Some(bundle) => {
                state.outstanding = Some(bundle.id);
                Ok(bundle)
            }
            None => Err(ContractError::Timeout {
                waited_ms: timeout.as_millis() as u64,
                missing: state.missing(),
            }),
        }
    }

    fn release(&self, bundle: FrameBundle) -> Result<(), ContractError> {
        let mut state = self.lock()?;
        if state.outstanding != Some(bundle.id) {
            return Err(ContractError::DoubleRelease {
                bundle_id: bundle.id,
            });
        }
        state.outstanding = None;
        Ok(())
    }

    fn discard_pending(&self) -> usize {
        let Ok(mut state) = self.lock() else {
            return 0;
        };
        let pending = state.pending.iter().filter(|f| f.is_some()).count();
        let ready = if state.ready.is_some() { StreamKind::ALL.len() } else { 0 };
        state.pending = [None, None, None];
        state.ready = None;

        let discarded = pending + ready;
        if discarded > 0 {
            debug!(discarded, "discarded pending frames");
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::thread;

    fn frame(kind: StreamKind, timestamp: u32) -> StreamFrame {
        StreamFrame {
            kind,
            width: 2,
            height: 1,
            bytes_per_pixel: 4,
            timestamp,
            sequence: timestamp,
            data: Bytes::from(vec![0u8; 8]),
        }
    }

    fn push_bundle(listener: &SyncMultiFrameListener, timestamp: u32) {
        for kind in StreamKind::ALL {
            assert!(listener.on_new_frame(frame(kind, timestamp)));
        }
    }

    #[test]
    fn test_bundle_from_three_frames() {
        let listener = SyncMultiFrameListener::new();
        push_bundle(&listener, 10);

        let bundle = listener.wait_for_bundle(Duration::from_millis(10)).unwrap();
        assert_eq!(bundle.id, 1);
        assert_eq!(bundle.color.timestamp, 10);
        assert_eq!(bundle.depth.kind, StreamKind::Depth);
        assert_eq!(listener.outstanding(), Some(1));

        listener.release(bundle).unwrap();
        assert_eq!(listener.outstanding(), None);
    }

    #[test]
    fn test_timeout_reports_missing_streams() {
        let listener = SyncMultiFrameListener::new();
        listener.on_new_frame(frame(StreamKind::Depth, 1));

        let err = listener.wait_for_bundle(Duration::from_millis(1)).unwrap_err();
        match err {
            ContractError::Timeout { waited_ms, missing } => {
                assert_eq!(waited_ms, 1);
                assert_eq!(missing, vec![StreamKind::Color, StreamKind::Infrared]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_latest_bundle_wins() {
        let listener = SyncMultiFrameListener::new();
        push_bundle(&listener, 1);
        push_bundle(&listener, 2);

        let bundle = listener.wait_for_bundle(Duration::from_millis(10)).unwrap();
        assert_eq!(bundle.infrared.timestamp, 2);
        assert_eq!(listener.stats().bundles_dropped, 1);
        listener.release(bundle).unwrap();
    }

    #[test]
    fn test_release_of_foreign_bundle() {
        let listener = SyncMultiFrameListener::new();
        push_bundle(&listener, 1);
        let bundle = listener.wait_for_bundle(Duration::from_millis(10)).unwrap();
        let id = bundle.id;
        listener.release(bundle).unwrap();

        let replay = FrameBundle {
            id,
            color: frame(StreamKind::Color, 1),
            infrared: frame(StreamKind::Infrared, 1),
            depth: frame(StreamKind::Depth, 1),
        };
        assert!(matches!(
            listener.release(replay),
            Err(ContractError::DoubleRelease { bundle_id }) if bundle_id == id
        ));
    }

    #[test]
    fn test_wait_requires_release() {
        let listener = SyncMultiFrameListener::new();
        push_bundle(&listener, 1);
        let _held = listener.wait_for_bundle(Duration::from_millis(10)).unwrap();
        push_bundle(&listener, 2);
        assert!(listener.wait_for_bundle(Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_frames_ignored_after_stop() {
        let listener = SyncMultiFrameListener::new();
        listener.stop();
        assert!(!listener.on_new_frame(frame(StreamKind::Color, 1)));
        assert_eq!(listener.stats().frames_ignored, 1);
        assert!(listener.wait_for_bundle(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_discard_pending() {
        let listener = SyncMultiFrameListener::new();
        push_bundle(&listener, 1);
        listener.on_new_frame(frame(StreamKind::Color, 2));
        assert_eq!(listener.discard_pending(), 4);
        assert_eq!(listener.discard_pending(), 0);
    }

    #[test]
    fn test_wait_wakes_on_producer_thread() {
        let listener = Arc::new(SyncMultiFrameListener::new());
        let producer = Arc::clone(&listener);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            push_bundle(&producer, 42);
        });

        let bundle = listener.wait_for_bundle(Duration::from_secs(5)).unwrap();
        assert_eq!(bundle.depth.timestamp, 42);
        listener.release(bundle).unwrap();
        handle.join().unwrap();
    }
}
