//! Scripted transport for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::{Transport, TransportError};

/// What the engine did to the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    Write(String),
    FlushInput,
}

#[derive(Default)]
struct Inner {
    activity: Vec<Activity>,
    responses: VecDeque<Vec<u8>>,
    fail_writes_from: Option<usize>,
    writes_seen: usize,
}

/// In-memory [`Transport`] that records what was done to it and plays back
/// scripted responses. Clones share state, so a test can keep a handle while
/// the engine owns its copy.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the next [`Transport::read_available`].
    pub fn push_response(&self, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .push_back(bytes.to_vec());
    }

    /// Fail the `n`-th write from now (0-based) and every write after it.
    pub fn fail_writes_from(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        let seen = inner.writes_seen;
        inner.fail_writes_from = Some(seen + n);
    }

    /// Every frame written so far, as ASCII, flushes excluded.
    pub fn frames(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .activity
            .iter()
            .filter_map(|a| match a {
                Activity::Write(frame) => Some(frame.clone()),
                Activity::FlushInput => None,
            })
            .collect()
    }

    /// Full activity log, input flushes included.
    pub fn activity(&self) -> Vec<Activity> {
        self.inner.lock().unwrap().activity.clone()
    }

    /// Forget recorded activity. Scripted responses and failure points stay.
    pub fn clear_activity(&self) {
        self.inner.lock().unwrap().activity.clear();
    }
}

impl Transport for MockTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.writes_seen;
        inner.writes_seen += 1;
        if matches!(inner.fail_writes_from, Some(n) if index >= n) {
            return Err(TransportError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "scripted failure",
            )));
        }
        inner
            .activity
            .push(Activity::Write(String::from_utf8_lossy(bytes).into_owned()));
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .responses
            .pop_front()
            .unwrap_or_default())
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.inner
            .lock()
            .unwrap()
            .activity
            .push(Activity::FlushInput);
        Ok(())
    }
}
