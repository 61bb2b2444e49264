//! The inspector: wraps callbacks and answers questions about them.
//!
//! An [`Inspector`] owns one [`CallbackRegistry`] and one [`ShapeSynthesizer`].
//! Create independent inspectors for isolated bookkeeping (tests do), use
//! [`define_inspector!`](crate::define_inspector) for a module-level one, or
//! [`global`] for the process-wide instance.
//!
//! # Examples
//!
//! ```
//! use callback_inspector::{CallSite, Inspector};
//! use std::sync::Arc;
//!
//! fn greet(_a: u32, _b: u32) {}
//!
//! let inspector = Inspector::new();
//! let cb = Arc::new(greet);
//! let wrapped = inspector.wrap(&cb, CallSite::new("x.rs", 10)).unwrap();
//!
//! assert_eq!(wrapped.name(), "greet");
//! assert_eq!(wrapped.arity(), 2);
//! assert_eq!(inspector.pending_callbacks().len(), 1);
//!
//! wrapped.call(1, 2);
//! assert_eq!(inspector.complete_callbacks()[0].total_called, 1);
//! assert!(inspector.pending_callbacks().is_empty());
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use crate::callback::Callback;
use crate::config::InspectorConfig;
use crate::registry::CallbackRegistry;
use crate::report::{render, ExitReport, ReportMode};
use crate::shape::{CallbackShape, ShapeSynthesizer};
use crate::snapshot::CallbackSnapshot;
use crate::wrapped::{CallCounter, Wrapped};
use crate::{server, CallSite, InspectorEvent, Result};

// -------------------------------------------------------------------------------------------------
// Tracing callback support
// -------------------------------------------------------------------------------------------------

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives a reference to an `InspectorEvent` every time callbacks are
/// registered, handed off or invoked. It must be thread-safe because wrapped callbacks
/// may be invoked from any thread.
pub type TraceCallback = dyn Fn(&InspectorEvent) + Send + Sync + 'static;

/// Shared slot for the tracing callback; cloned into every wrapper.
#[derive(Clone, Default)]
pub(crate) struct TraceHook {
    slot: Arc<Mutex<Option<Arc<TraceCallback>>>>,
}

impl TraceHook {
    fn set(&self, callback: impl Fn(&InspectorEvent) + Send + Sync + 'static) {
        let mut guard = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    fn clear(&self) {
        let mut guard = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    /// Build and deliver an event if a callback is set.
    ///
    /// The slot lock is released before the callback runs, so the callback may use
    /// the inspector.
    pub(crate) fn emit(&self, event: impl FnOnce() -> InspectorEvent) {
        let callback = self
            .slot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(&event());
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Inspector
// -------------------------------------------------------------------------------------------------

/// Tracks callbacks handed across a program.
#[derive(Default)]
pub struct Inspector {
    registry: Arc<CallbackRegistry>,
    shapes: ShapeSynthesizer,
    trace: TraceHook,
    served: Mutex<HashMap<u16, SocketAddr>>,
    exit_report_armed: AtomicBool,
}

impl std::fmt::Debug for Inspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inspector")
            .field("registry", &self.registry)
            .field("shapes", &self.shapes.len())
            .field("exit_report_armed", &self.exit_report_armed)
            .finish_non_exhaustive()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn shapes(&self) -> &ShapeSynthesizer {
        &self.shapes
    }

    /// Wrap `callback` for the hand-off described by `site`.
    ///
    /// Every clone of the same `Arc` is the same callback: wrapping it again adds
    /// another handler to its existing record.
    ///
    /// # Errors
    ///
    /// [`InspectorError::MissingFile`](crate::InspectorError::MissingFile) or
    /// [`InspectorError::MissingLine`](crate::InspectorError::MissingLine) when the
    /// site cannot be attributed. Nothing is recorded in that case.
    pub fn wrap<F, Args>(&self, callback: &Arc<F>, site: CallSite) -> Result<Wrapped<F, Args>>
    where
        F: Callback<Args>,
    {
        site.validate()?;

        let shape = CallbackShape::of::<F, Args>();
        let (record, created) = self.registry.resolve_or_create(callback, &shape);
        if created {
            log::debug!("tracking callback #{} ({})", record.index(), shape);
            self.trace.emit(|| InspectorEvent::Registered {
                name: shape.name.clone(),
                arity: shape.arity,
                index: record.index(),
            });
        }

        let location = site.location();
        let handler = self.registry.add_handler(&record, site);
        log::debug!(
            "callback #{} handed off at {} (handler {})",
            record.index(),
            location,
            handler.handler_index()
        );
        self.trace.emit(|| InspectorEvent::HandlerAdded {
            index: record.index(),
            handler: handler.handler_index(),
            site: location,
        });

        let factory = self.shapes.build_wrapper(&shape.name, shape.arity);
        let counter = CallCounter::new(handler, self.trace.clone());
        Ok(factory.build(counter, Arc::clone(callback)))
    }

    /// Wrap a callback that has no other owner. Always a new identity.
    pub fn wrap_fn<F, Args>(&self, callback: F, site: CallSite) -> Result<Wrapped<F, Args>>
    where
        F: Callback<Args>,
    {
        self.wrap(&Arc::new(callback), site)
    }

    /// Wrap an optional callback. `None` passes through untouched and unchecked.
    pub fn wrap_optional<F, Args>(
        &self,
        callback: Option<&Arc<F>>,
        site: CallSite,
    ) -> Result<Option<Wrapped<F, Args>>>
    where
        F: Callback<Args>,
    {
        match callback {
            Some(callback) => self.wrap(callback, site).map(Some),
            None => Ok(None),
        }
    }

    /// Snapshot of every tracked callback.
    pub fn all_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.registry.all_callbacks()
    }

    /// Snapshot of callbacks called back at least once.
    pub fn complete_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.registry.complete_callbacks()
    }

    /// Snapshot of callbacks never called back.
    pub fn pending_callbacks(&self) -> Vec<CallbackSnapshot> {
        self.registry.pending_callbacks()
    }

    pub fn snapshot(&self, mode: ReportMode) -> Vec<CallbackSnapshot> {
        mode.select(&self.registry)
    }

    /// Render the text report for `mode`.
    pub fn render(&self, mode: ReportMode) -> String {
        render(&self.snapshot(mode))
    }

    /// Arm the final report.
    ///
    /// The first call returns an armed guard that prints the pending view (or the
    /// full view with `show_all`) when dropped, unless every callback was called
    /// back. Later calls return a disarmed guard.
    #[must_use = "the report prints when this guard is dropped"]
    pub fn report_on_exit(&self, show_all: bool) -> ExitReport {
        if self.exit_report_armed.swap(true, Ordering::SeqCst) {
            return ExitReport::disarmed();
        }
        self.trace.emit(|| InspectorEvent::ReportArmed { show_all });
        ExitReport::armed(Arc::clone(&self.registry), show_all)
    }

    /// Start the query listener on `port` (`0` picks a free port).
    ///
    /// Calling again with the same `port` returns the address already being served.
    pub fn serve(&self, port: u16) -> Result<SocketAddr> {
        self.serve_on("127.0.0.1", port)
    }

    /// Like [`serve`](Inspector::serve), binding `host` instead of loopback.
    pub fn serve_on(&self, host: &str, port: u16) -> Result<SocketAddr> {
        let mut served = self.served.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(addr) = served.get(&port) {
            return Ok(*addr);
        }
        let addr = server::spawn(host, port, Arc::clone(&self.registry))?;
        served.insert(port, addr);
        drop(served);

        self.trace.emit(|| InspectorEvent::Served {
            addr: addr.to_string(),
        });
        Ok(addr)
    }

    /// Start whatever `config` enables. Returns the exit report guard if one was armed.
    pub fn apply(&self, config: &InspectorConfig) -> Result<Option<ExitReport>> {
        if let Some(port) = config.serve_port {
            self.serve_on(&config.host, port)?;
        }
        Ok(config
            .report_on_exit
            .then(|| self.report_on_exit(config.show_all)))
    }

    /// Sets a tracing callback that will be invoked on every inspector event.
    ///
    /// # Example
    /// ```rust
    /// use callback_inspector::Inspector;
    ///
    /// let inspector = Inspector::new();
    /// inspector.set_trace_callback(|event| println!("[cb-trace] {}", event));
    /// ```
    pub fn set_trace_callback(&self, callback: impl Fn(&InspectorEvent) + Send + Sync + 'static) {
        self.trace.set(callback);
    }

    /// Clears the tracing callback.
    pub fn clear_trace_callback(&self) {
        self.trace.clear();
    }
}

// -------------------------------------------------------------------------------------------------
// Process-wide inspector
// -------------------------------------------------------------------------------------------------

static GLOBAL: LazyLock<Inspector> = LazyLock::new(Inspector::new);

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// The process-wide inspector.
pub fn global() -> &'static Inspector {
    &GLOBAL
}

/// Claim the process-wide inspector for this program.
///
/// Warns if it was already claimed; the same instance is returned either way.
pub fn install_global() -> &'static Inspector {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        log::warn!("callback inspector already registered in this process");
    }
    &GLOBAL
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InspectorError;
    use serial_test::serial;

    fn greet(_a: u32, _b: u32) {}

    #[test]
    fn test_wrap_preserves_shape() {
        fn foo(_a: u8, _b: u8, _c: u8) {}
        let inspector = Inspector::new();
        let wrapped = inspector
            .wrap(&Arc::new(foo), CallSite::new("x.rs", 1))
            .unwrap();
        assert_eq!(wrapped.name(), "foo");
        assert_eq!(wrapped.arity(), 3);
    }

    #[test]
    fn test_missing_metadata_creates_no_record() {
        let inspector = Inspector::new();
        let cb = Arc::new(greet);

        let err = inspector.wrap(&cb, CallSite::default()).unwrap_err();
        assert!(matches!(err, InspectorError::MissingFile));

        let no_line = CallSite {
            file: Some("x.rs".to_string()),
            ..CallSite::default()
        };
        let err = inspector.wrap(&cb, no_line).unwrap_err();
        assert!(matches!(err, InspectorError::MissingLine));

        assert!(inspector.registry().is_empty());
    }

    #[test]
    fn test_wrap_optional_passes_none_through() {
        let inspector = Inspector::new();
        let none: Option<&Arc<fn(u8)>> = None;
        let result = inspector.wrap_optional(none, CallSite::default()).unwrap();
        assert!(result.is_none());
        assert!(inspector.registry().is_empty());

        let cb: Arc<fn(u8)> = Arc::new(|_| ());
        let wrapped = inspector
            .wrap_optional(Some(&cb), CallSite::new("x.rs", 2))
            .unwrap();
        assert!(wrapped.is_some());
        assert_eq!(inspector.registry().len(), 1);
    }

    #[test]
    fn test_fan_out_accumulates_handlers() {
        let inspector = Inspector::new();
        let cb = Arc::new(greet);
        for line in 1..=3 {
            inspector.wrap(&cb, CallSite::new("x.rs", line)).unwrap();
        }

        let all = inspector.all_callbacks();
        assert_eq!(all.len(), 1);
        let lines: Vec<_> = all[0].handlers.iter().map(|h| h.meta.line).collect();
        assert_eq!(lines, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_rewrapping_a_wrapper_is_a_new_identity() {
        let inspector = Inspector::new();
        let first = inspector
            .wrap(&Arc::new(greet), CallSite::new("x.rs", 1))
            .unwrap();
        let second = inspector
            .wrap_fn(first.into_fn(), CallSite::new("x.rs", 2))
            .unwrap();

        second.call(1, 2);

        let all = inspector.all_callbacks();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].total_called, 1);
        assert_eq!(all[1].total_called, 1);
        assert_eq!(all[1].name, "");
    }

    #[test]
    fn test_shapes_are_cached_across_wraps() {
        let inspector = Inspector::new();
        inspector.wrap_fn(greet, CallSite::new("x.rs", 1)).unwrap();
        inspector.wrap_fn(greet, CallSite::new("x.rs", 2)).unwrap();
        assert_eq!(inspector.registry().len(), 2);
        assert_eq!(inspector.shapes().len(), 1);
    }

    #[test]
    fn test_trace_events_in_order() {
        let inspector = Inspector::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        inspector.set_trace_callback(move |event| {
            events_clone.lock().unwrap().push(event.to_string());
        });

        let wrapped = inspector.wrap_fn(greet, CallSite::new("x.rs", 7)).unwrap();
        wrapped.call(1, 2);
        inspector.clear_trace_callback();
        wrapped.call(1, 2);

        let recorded = events.lock().unwrap();
        assert_eq!(
            *recorded,
            vec![
                "registered { name: greet, arity: 2, index: 0 }",
                "handler added { index: 0, handler: 0, site: x.rs:7 }",
                "invoked { index: 0, handler: 0, total_called: 1 }",
            ]
        );
    }

    #[test]
    fn test_report_on_exit_is_idempotent() {
        let inspector = Inspector::new();
        let first = inspector.report_on_exit(false);
        let second = inspector.report_on_exit(true);
        assert!(first.is_armed());
        assert!(!second.is_armed());
    }

    #[test]
    fn test_apply_default_config_does_nothing() {
        let inspector = Inspector::new();
        let guard = inspector.apply(&InspectorConfig::default()).unwrap();
        assert!(guard.is_none());
    }

    #[test]
    #[serial]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(global(), install_global()));
        assert!(std::ptr::eq(global(), install_global()));
    }
}
