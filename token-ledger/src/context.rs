//! Invocation context
//!
//! One [`TxContext`] exists per invocation. It reads through to the world
//! state, stages writes and events locally, and either commits them together
//! or drops them. There is no partial rollback: a failed invocation is
//! discarded whole.

use crate::{
    events::{EmittedEvent, EventSink},
    identity::Identity,
    state::{StateIter, WorldState, WriteSet},
    Error, Result,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::sync::Arc;
use uuid::Uuid;

/// Source of wall-clock timestamps
pub trait Clock: Send + Sync {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> i64;
}

/// System clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        Utc::now().timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: Mutex<i64>,
}

impl ManualClock {
    /// Start at `nanos`
    pub fn new(nanos: i64) -> Self {
        Self {
            nanos: Mutex::new(nanos),
        }
    }

    /// Move forward by `nanos`
    pub fn advance(&self, nanos: i64) {
        *self.nanos.lock() += nanos;
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        *self.nanos.lock()
    }
}

/// Clock that never repeats a reading, across invocations
///
/// Log keys embed the timestamp, so two invocations stamped in the same
/// nanosecond would otherwise overwrite each other's entries.
pub struct MonotonicClock {
    inner: Arc<dyn Clock>,
    last: Mutex<i64>,
}

impl MonotonicClock {
    /// Wrap `inner`
    pub fn new(inner: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            last: Mutex::new(i64::MIN),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> i64 {
        let mut last = self.last.lock();
        let now = self.inner.now_nanos();
        *last = if now > *last {
            now
        } else {
            last.saturating_add(1)
        };
        *last
    }
}

/// State of one invocation
pub struct TxContext<'a> {
    id: Uuid,
    store: &'a dyn WorldState,
    identity: &'a dyn Identity,
    clock: &'a dyn Clock,
    writes: WriteSet,
    events: Vec<EmittedEvent>,
    last_stamp: i64,
}

impl<'a> TxContext<'a> {
    /// Open a context over `store`
    pub fn new(
        store: &'a dyn WorldState,
        identity: &'a dyn Identity,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            store,
            identity,
            clock,
            writes: WriteSet::new(),
            events: Vec::new(),
            last_stamp: i64::MIN,
        }
    }

    /// Invocation ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read a key, seeing this invocation's own staged writes first
    pub fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.to_vec()));
        }
        let value = self.store.get_state(key)?;
        tracing::debug!(key, found = value.is_some(), "State read");
        Ok(value)
    }

    /// Stage a write
    pub fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::write(key, "empty key"));
        }
        tracing::debug!(key, bytes = value.len(), "State write staged");
        self.writes.put(key, value);
        Ok(())
    }

    /// Prefix scan over store contents merged with staged writes
    pub fn scan_prefix(&self, prefix: &str) -> Result<StateIter<'_>> {
        let stored = self.store.scan_prefix(prefix)?;
        let pending: Vec<(String, Vec<u8>)> = self
            .writes
            .range_prefix(prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Box::new(MergedScan {
            stored: stored.peekable(),
            pending: pending.into_iter().peekable(),
        }))
    }

    /// Stage an event for delivery after commit
    pub fn set_event(&mut self, name: &str, payload: Vec<u8>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmitFailure {
                name: name.to_string(),
                reason: "event name must not be empty".to_string(),
            });
        }
        self.events.push(EmittedEvent {
            name: name.to_string(),
            payload,
        });
        Ok(())
    }

    /// Organization of the caller
    pub fn caller_org_id(&self) -> Result<String> {
        self.identity.caller_org_id()
    }

    /// Account of the caller
    pub fn caller_account_id(&self) -> Result<String> {
        self.identity.caller_account_id()
    }

    /// Nanosecond timestamp, strictly increasing within this invocation
    pub fn timestamp_nanos(&mut self) -> i64 {
        let now = self.clock.now_nanos();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp.saturating_add(1)
        };
        self.last_stamp = stamp;
        stamp
    }

    /// Staged writes
    pub fn write_set(&self) -> &WriteSet {
        &self.writes
    }

    /// Staged events
    pub fn pending_events(&self) -> &[EmittedEvent] {
        &self.events
    }

    /// Apply staged writes atomically, then deliver staged events
    ///
    /// A delivery failure is reported as `EmitFailure` even though the
    /// writes are already durable.
    pub fn commit(self, sink: &dyn EventSink) -> Result<usize> {
        let write_count = self.writes.len();
        if !self.writes.is_empty() {
            self.store.commit(self.writes)?;
        }

        tracing::debug!(
            invocation_id = %self.id,
            writes = write_count,
            events = self.events.len(),
            "Invocation committed"
        );

        for event in self.events {
            let name = event.name.clone();
            sink.emit(event).map_err(|e| match e {
                Error::EmitFailure { .. } => e,
                other => Error::EmitFailure {
                    name,
                    reason: other.to_string(),
                },
            })?;
        }

        Ok(write_count)
    }

    /// Drop staged writes and events
    pub fn discard(self) {
        tracing::debug!(
            invocation_id = %self.id,
            writes = self.writes.len(),
            "Invocation discarded"
        );
    }
}

/// Sorted merge of a store scan with staged writes; staged values win
struct MergedScan<'a> {
    stored: Peekable<StateIter<'a>>,
    pending: Peekable<std::vec::IntoIter<(String, Vec<u8>)>>,
}

impl Iterator for MergedScan<'_> {
    type Item = Result<(String, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let order = match (self.stored.peek(), self.pending.peek()) {
            (None, None) => return None,
            (Some(Err(_)), _) | (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(Ok((stored, _))), Some((pending, _))) => stored.cmp(pending),
        };

        match order {
            Ordering::Less => self.stored.next(),
            Ordering::Greater => self.pending.next().map(Ok),
            Ordering::Equal => {
                self.stored.next();
                self.pending.next().map(Ok)
            }
        }
    }
}
