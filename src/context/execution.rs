use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ContextError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextState {
    Active,
    Ended,
}

/// One timed piece of work recorded against a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// Offset from the context's start.
    pub offset: Duration,
    /// `None` while the segment is still open.
    pub duration: Option<Duration>,
}

impl Segment {
    pub fn is_open(&self) -> bool {
        self.duration.is_none()
    }
}

#[derive(Debug)]
struct ContextData {
    state: ContextState,
    name: Option<String>,
    attributes: Map<String, Value>,
    segments: Vec<Segment>,
    ended_at: Option<Instant>,
}

#[derive(Debug)]
struct ContextInner {
    id: Uuid,
    created_at: SystemTime,
    started: Instant,
    max_segments: usize,
    data: Mutex<ContextData>,
}

/// A logical unit of work. Clones share the same underlying state, so a
/// context captured by a continuation observes every later mutation.
///
/// Lifecycle is `Active -> Ended`. Once ended, every mutation returns
/// [`ContextError::Ended`] while reads keep returning the last state.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    pub(crate) fn new(max_segments: usize) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: Uuid::new_v4(),
                created_at: SystemTime::now(),
                started: Instant::now(),
                max_segments,
                data: Mutex::new(ContextData {
                    state: ContextState::Active,
                    name: None,
                    attributes: Map::new(),
                    segments: Vec::new(),
                    ended_at: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn created_at(&self) -> SystemTime {
        self.inner.created_at
    }

    pub fn state(&self) -> ContextState {
        self.inner.data.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    pub fn name(&self) -> Option<String> {
        self.inner.data.lock().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), ContextError> {
        let mut data = self.inner.data.lock();
        if data.state == ContextState::Ended {
            return Err(ContextError::Ended);
        }
        data.name = Some(name.into());
        Ok(())
    }

    pub fn attributes(&self) -> Map<String, Value> {
        self.inner.data.lock().attributes.clone()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: Value) -> Result<(), ContextError> {
        let mut data = self.inner.data.lock();
        if data.state == ContextState::Ended {
            return Err(ContextError::Ended);
        }
        data.attributes.insert(key.into(), value);
        Ok(())
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.inner.data.lock().segments.clone()
    }

    /// Elapsed time so far, or the final duration once ended.
    pub fn duration(&self) -> Duration {
        let data = self.inner.data.lock();
        match data.ended_at {
            Some(end) => end.duration_since(self.inner.started),
            None => self.inner.started.elapsed(),
        }
    }

    pub fn start_segment(&self, name: impl Into<String>) -> Result<SegmentHandle, ContextError> {
        let mut data = self.inner.data.lock();
        if data.state == ContextState::Ended {
            return Err(ContextError::Ended);
        }
        if data.segments.len() >= self.inner.max_segments {
            return Err(ContextError::SegmentLimit);
        }
        data.segments.push(Segment {
            name: name.into(),
            offset: self.inner.started.elapsed(),
            duration: None,
        });
        Ok(SegmentHandle {
            context: self.clone(),
            index: data.segments.len() - 1,
        })
    }

    /// Active -> Ended. Returns false if the context had already ended.
    /// Open segments are closed at the end instant.
    pub(crate) fn finish(&self) -> bool {
        let mut data = self.inner.data.lock();
        if data.state == ContextState::Ended {
            return false;
        }
        let now = Instant::now();
        let end_offset = now.duration_since(self.inner.started);
        for segment in data.segments.iter_mut().filter(|s| s.is_open()) {
            segment.duration = Some(end_offset.saturating_sub(segment.offset));
        }
        data.state = ContextState::Ended;
        data.ended_at = Some(now);
        true
    }
}

impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ExecutionContext {}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Open segment on a context. Ending it records the elapsed time.
#[derive(Debug)]
pub struct SegmentHandle {
    context: ExecutionContext,
    index: usize,
}

impl SegmentHandle {
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn end(self) -> Result<Duration, ContextError> {
        let inner = &self.context.inner;
        let mut data = inner.data.lock();
        if data.state == ContextState::Ended {
            return Err(ContextError::Ended);
        }
        let now = inner.started.elapsed();
        let segment = &mut data.segments[self.index];
        let duration = now.saturating_sub(segment.offset);
        segment.duration = Some(duration);
        Ok(duration)
    }
}
