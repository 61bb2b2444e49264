//! The callback registry.
//!
//! One [`CallbackRecord`] exists per distinct callback identity, i.e. per shared
//! `Arc` allocation. Records live in an append-only ordered collection; the mapping
//! from identity to record holds only `Weak` references, so tracking a callback never
//! keeps it alive. Links to freed callbacks are swept on every registration, hand-off
//! and [`CallbackRegistry::tracked_identities`] call.
//!
//! # Examples
//!
//! ```
//! use callback_inspector::{CallSite, CallbackRegistry, CallbackShape};
//! use std::sync::Arc;
//!
//! let registry = CallbackRegistry::new();
//! let on_done = Arc::new(|_: u32| ());
//!
//! let (record, created) = registry.resolve_or_create(&on_done, &CallbackShape::new("", 1));
//! assert!(created);
//! registry.add_handler(&record, CallSite::new("src/main.rs", 12));
//!
//! assert_eq!(registry.pending_callbacks().len(), 1);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};

use crate::call_site::CallSite;
use crate::shape::CallbackShape;
use crate::snapshot::{CallbackSnapshot, HandlerSnapshot};

// -------------------------------------------------------------------------------------------------
// Records
// -------------------------------------------------------------------------------------------------

/// Live tracking state for one callback identity.
///
/// Counters and handlers share one lock, so `total_called` always equals the sum of
/// the handlers' `called` counts, both here and in every snapshot.
#[derive(Debug)]
pub struct CallbackRecord {
    name: String,
    arity: usize,
    index: usize,
    created_at: DateTime<Utc>,
    state: Mutex<RecordState>,
}

#[derive(Debug, Default)]
struct RecordState {
    total_called: u64,
    handlers: Vec<HandlerState>,
}

#[derive(Debug)]
struct HandlerState {
    meta: CallSite,
    called: u64,
    log: Vec<String>,
    created_at: DateTime<Utc>,
}

impl CallbackRecord {
    fn new(shape: &CallbackShape, index: usize) -> Self {
        Self {
            name: shape.name.clone(),
            arity: shape.arity,
            index,
            created_at: Utc::now(),
            state: Mutex::new(RecordState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RecordState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn total_called(&self) -> u64 {
        self.state().total_called
    }

    pub fn handler_count(&self) -> usize {
        self.state().handlers.len()
    }

    /// Copy the record and all of its handlers under a single lock.
    pub fn snapshot(&self) -> CallbackSnapshot {
        let state = self.state();
        CallbackSnapshot {
            name: self.name.clone(),
            arity: self.arity,
            index: self.index,
            created_at: self.created_at,
            total_called: state.total_called,
            handlers: state
                .handlers
                .iter()
                .map(|h| HandlerSnapshot {
                    meta: h.meta.clone(),
                    called: h.called,
                    log: h.log.clone(),
                    created_at: h.created_at,
                })
                .collect(),
        }
    }

    fn push_handler(&self, meta: CallSite) -> usize {
        let mut state = self.state();
        state.handlers.push(HandlerState {
            meta,
            called: 0,
            log: Vec::new(),
            created_at: Utc::now(),
        });
        state.handlers.len() - 1
    }

    /// Returns the record-wide count after the increment.
    fn mark_called(&self, handler: usize) -> u64 {
        let mut state = self.state();
        state.total_called += 1;
        if let Some(h) = state.handlers.get_mut(handler) {
            h.called += 1;
        }
        state.total_called
    }

    fn handler_called(&self, handler: usize) -> Option<u64> {
        self.state().handlers.get(handler).map(|h| h.called)
    }

    fn append_log(&self, handler: usize, entry: String) {
        if let Some(h) = self.state().handlers.get_mut(handler) {
            h.log.push(entry);
        }
    }
}

/// Capability to update one handler of one record.
///
/// Holds the record weakly: once the owning registry is gone every operation is a
/// silent no-op.
#[derive(Debug, Clone)]
pub struct HandlerHandle {
    record: Weak<CallbackRecord>,
    index: usize,
    handler: usize,
}

impl HandlerHandle {
    /// Index of the record in its registry.
    pub fn record_index(&self) -> usize {
        self.index
    }

    /// Position of this handler within its record.
    pub fn handler_index(&self) -> usize {
        self.handler
    }

    pub fn record(&self) -> Option<Arc<CallbackRecord>> {
        self.record.upgrade()
    }

    /// Count one invocation on both the record and this handler.
    ///
    /// Returns the record-wide count, or `None` if the record is gone.
    pub fn mark_called(&self) -> Option<u64> {
        self.record
            .upgrade()
            .map(|record| record.mark_called(self.handler))
    }

    /// Invocations through this handler so far.
    pub fn called(&self) -> Option<u64> {
        self.record
            .upgrade()
            .and_then(|record| record.handler_called(self.handler))
    }

    /// Append a diagnostic entry to this handler's log.
    pub fn log(&self, entry: impl Into<String>) {
        if let Some(record) = self.record.upgrade() {
            record.append_log(self.handler, entry.into());
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------

/// Weak link from a callback allocation to its record.
struct IdentitySlot {
    callback: Weak<dyn Any + Send + Sync>,
    index: usize,
}

#[derive(Default)]
struct RegistryState {
    identity_index: HashMap<usize, IdentitySlot>,
    records: Vec<Arc<CallbackRecord>>,
}

impl RegistryState {
    /// Drop links to callbacks that have been freed, releasing their allocations.
    fn sweep(&mut self) {
        self.identity_index
            .retain(|_, slot| slot.callback.strong_count() > 0);
    }
}

/// Ledger of every callback an inspector has wrapped.
#[derive(Default)]
pub struct CallbackRegistry {
    state: Mutex<RegistryState>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CallbackRegistry")
            .field("records", &state.records.len())
            .field("tracked_identities", &state.identity_index.len())
            .finish()
    }
}

fn identity_of<F>(callback: &Arc<F>) -> usize {
    Arc::as_ptr(callback) as *const () as usize
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Find the record for `callback`'s identity, creating it if needed.
    ///
    /// Lookup and creation happen under one lock, so an identity never gets two
    /// records. The boolean is `true` when the record was created by this call.
    pub fn resolve_or_create<F>(
        &self,
        callback: &Arc<F>,
        shape: &CallbackShape,
    ) -> (Arc<CallbackRecord>, bool)
    where
        F: Any + Send + Sync,
    {
        let key = identity_of(callback);
        let mut state = self.state();

        let existing = state
            .identity_index
            .get(&key)
            .filter(|slot| slot.callback.strong_count() > 0)
            .map(|slot| slot.index);
        if let Some(index) = existing {
            return (Arc::clone(&state.records[index]), false);
        }

        state.sweep();

        let index = state.records.len();
        let record = Arc::new(CallbackRecord::new(shape, index));
        state.records.push(Arc::clone(&record));

        let weak: Weak<F> = Arc::downgrade(callback);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        state.identity_index.insert(
            key,
            IdentitySlot {
                callback: weak,
                index,
            },
        );

        (record, true)
    }

    /// Append a handler to `record` and return the capability to update it.
    pub fn add_handler(&self, record: &Arc<CallbackRecord>, meta: CallSite) -> HandlerHandle {
        self.state().sweep();
        let handler = record.push_handler(meta);
        HandlerHandle {
            record: Arc::downgrade(record),
            index: record.index(),
            handler,
        }
    }

    /// Shallow copy of the ordered collection.
    pub fn records(&self) -> Vec<Arc<CallbackRecord>> {
        self.state().records.clone()
    }

    /// Record at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Arc<CallbackRecord>> {
        self.state().records.get(index).cloned()
    }

    /// Snapshot of every record, in registration order.
    pub fn all_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.records().iter().map(|r| r.snapshot()).collect()
    }

    /// Snapshot of the records called at least once.
    pub fn complete_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.all_callbacks()
            .into_iter()
            .filter(CallbackSnapshot::is_complete)
            .collect()
    }

    /// Snapshot of the records never called.
    pub fn pending_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.all_callbacks()
            .into_iter()
            .filter(CallbackSnapshot::is_pending)
            .collect()
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of identity links whose callback is still alive.
    pub fn tracked_identities(&self) -> usize {
        let mut state = self.state();
        state.sweep();
        state.identity_index.len()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> CallbackShape {
        CallbackShape::new("greet", 2)
    }

    #[test]
    fn test_same_identity_resolves_to_one_record() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|_: u8, _: u8| ());

        let (first, created) = registry.resolve_or_create(&cb, &shape());
        assert!(created);
        let (second, created) = registry.resolve_or_create(&Arc::clone(&cb), &shape());
        assert!(!created);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_allocations_get_distinct_records() {
        let registry = CallbackRegistry::new();
        let a = Arc::new(|| ());
        let b = Arc::new(|| ());

        let (ra, _) = registry.resolve_or_create(&a, &CallbackShape::new("", 0));
        let (rb, _) = registry.resolve_or_create(&b, &CallbackShape::new("", 0));

        assert_eq!(ra.index(), 0);
        assert_eq!(rb.index(), 1);
    }

    #[test]
    fn test_handlers_keep_wrap_order() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|_: u8, _: u8| ());
        let (record, _) = registry.resolve_or_create(&cb, &shape());

        let first = registry.add_handler(&record, CallSite::new("a.rs", 1));
        let second = registry.add_handler(&record, CallSite::new("b.rs", 2));
        assert_eq!(first.handler_index(), 0);
        assert_eq!(second.handler_index(), 1);

        let snap = record.snapshot();
        assert_eq!(snap.handlers.len(), 2);
        assert_eq!(snap.handlers[0].meta.file.as_deref(), Some("a.rs"));
        assert_eq!(snap.handlers[1].meta.file.as_deref(), Some("b.rs"));
    }

    #[test]
    fn test_mark_called_updates_record_and_handler() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|_: u8, _: u8| ());
        let (record, _) = registry.resolve_or_create(&cb, &shape());
        let first = registry.add_handler(&record, CallSite::new("a.rs", 1));
        let second = registry.add_handler(&record, CallSite::new("b.rs", 2));

        assert_eq!(first.mark_called(), Some(1));
        assert_eq!(first.mark_called(), Some(2));
        assert_eq!(second.mark_called(), Some(3));

        let snap = record.snapshot();
        assert_eq!(snap.total_called, 3);
        assert_eq!(snap.handlers[0].called, 2);
        assert_eq!(snap.handlers[1].called, 1);
        assert_eq!(
            snap.total_called,
            snap.handlers.iter().map(|h| h.called).sum::<u64>()
        );
    }

    #[test]
    fn test_pending_and_complete_partition() {
        let registry = CallbackRegistry::new();
        let a = Arc::new(|| ());
        let b = Arc::new(|| ());
        let (ra, _) = registry.resolve_or_create(&a, &CallbackShape::new("", 0));
        let (rb, _) = registry.resolve_or_create(&b, &CallbackShape::new("", 0));
        registry.add_handler(&ra, CallSite::new("a.rs", 1));
        registry.add_handler(&rb, CallSite::new("b.rs", 1)).mark_called();

        let pending = registry.pending_callbacks();
        let complete = registry.complete_callbacks();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].index, 0);
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].index, 1);
        assert_eq!(registry.all_callbacks().len(), 2);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_calls() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|| ());
        let (record, _) = registry.resolve_or_create(&cb, &CallbackShape::new("", 0));
        let handle = registry.add_handler(&record, CallSite::new("a.rs", 1));

        let before = registry.pending_callbacks();
        handle.mark_called();

        assert_eq!(before.len(), 1);
        assert_eq!(before[0].total_called, 0);
        assert!(registry.pending_callbacks().is_empty());
    }

    #[test]
    fn test_registry_does_not_keep_callbacks_alive() {
        let registry = CallbackRegistry::new();
        let marker = Arc::new(());
        let captured = Arc::clone(&marker);
        let cb = Arc::new(move || {
            let _keep = &captured;
        });

        registry.resolve_or_create(&cb, &CallbackShape::new("", 0));
        assert_eq!(registry.tracked_identities(), 1);
        assert_eq!(Arc::strong_count(&marker), 2);

        drop(cb);
        assert_eq!(Arc::strong_count(&marker), 1);
        assert_eq!(registry.tracked_identities(), 0);
        // the record itself outlives the callback
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_freed_links_are_swept_on_hand_off() {
        let registry = CallbackRegistry::new();
        let kept = Arc::new(|| ());
        let freed = Arc::new(|_: u8| ());

        let (kept_record, _) = registry.resolve_or_create(&kept, &CallbackShape::new("", 0));
        registry.resolve_or_create(&freed, &CallbackShape::new("", 1));
        assert_eq!(registry.state().identity_index.len(), 2);

        drop(freed);
        // no new record, only another hand-off of a live callback
        registry.add_handler(&kept_record, CallSite::new("a.rs", 1));
        assert_eq!(registry.state().identity_index.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_handle_is_noop_after_registry_dropped() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|| ());
        let (record, _) = registry.resolve_or_create(&cb, &CallbackShape::new("", 0));
        let handle = registry.add_handler(&record, CallSite::new("a.rs", 1));
        drop(record);
        drop(registry);

        assert!(handle.record().is_none());
        assert_eq!(handle.mark_called(), None);
        assert_eq!(handle.called(), None);
        handle.log("ignored");
    }

    #[test]
    fn test_handler_log_is_append_only() {
        let registry = CallbackRegistry::new();
        let cb = Arc::new(|| ());
        let (record, _) = registry.resolve_or_create(&cb, &CallbackShape::new("", 0));
        let handle = registry.add_handler(&record, CallSite::new("a.rs", 1));

        handle.log("queued");
        handle.log(String::from("retrying"));

        let snap = record.snapshot();
        assert_eq!(snap.handlers[0].log, vec!["queued", "retrying"]);
    }
}
