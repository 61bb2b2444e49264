//! # Callback Inspector
//!
//! Runtime instrumentation for finding dropped callbacks: a callback is handed to some
//! routine, and that routine silently never calls it back.
//!
//! Wrap a callback at the point you hand it off. The wrapper keeps the original's
//! name, parameter count and calling contract, and counts every invocation against
//! the call site it was handed off from. At any time you can ask which callbacks are
//! still pending, print a report when `main` returns, or query the state over HTTP.
//!
//! ## Quick Start
//!
//! ```rust
//! use callback_inspector::{wrap, Inspector, ReportMode};
//! use std::sync::Arc;
//!
//! fn on_loaded(_bytes: usize, _ok: bool) {}
//!
//! let inspector = Inspector::new();
//! let cb = Arc::new(on_loaded);
//!
//! // Hand the same callback to two consumers
//! let first = wrap!(inspector, cb, "load_primary").unwrap();
//! let _second = wrap!(inspector, cb, "load_fallback").unwrap();
//!
//! first.call(512, true);
//!
//! let record = &inspector.all_callbacks()[0];
//! assert_eq!(record.name, "on_loaded");
//! assert_eq!(record.total_called, 1);
//! assert_eq!(record.handlers[0].called, 1);
//! assert_eq!(record.handlers[1].called, 0);
//!
//! print!("{}", inspector.render(ReportMode::All));
//! ```
//!
//! ## Features
//!
//! - **Shape preserving**: wrappers report the original's declared name and arity
//! - **Leak free**: the registry links callbacks weakly and never keeps them alive
//! - **Fan-out aware**: one record per callback, one handler per hand-off
//! - **Snapshots**: point-in-time copies that later calls never change
//! - **Exit report**: printed from a drop guard, only when something was never called
//! - **Query listener**: `/all`, `/complete` and `/pending` as JSON
//! - **Tracing support**: optional callback system for monitoring inspector events
//!
//! ## Main Entry Points
//!
//! - [`Inspector::wrap`] - Wrap a shared callback for one hand-off
//! - [`Inspector::pending_callbacks`] - Callbacks never called back
//! - [`Inspector::report_on_exit`] - Arm the final report
//! - [`Inspector::serve`] - Start the query listener
//! - [`define_inspector!`] - Create an isolated module-level inspector
//! - [`global`] - The process-wide inspector

#[macro_use]
mod macros;

mod call_site;
mod callback;
mod config;
mod inspector;
mod inspector_error;
mod inspector_event;
mod registry;
mod report;
mod server;
mod shape;
mod snapshot;
mod wrapped;

// Re-export the main public API
pub use call_site::CallSite;
pub use callback::{declared_name, Callback};
pub use config::InspectorConfig;
pub use inspector::{global, install_global, Inspector, TraceCallback};
pub use inspector_error::{InspectorError, Result};
pub use inspector_event::InspectorEvent;
pub use registry::{CallbackRecord, CallbackRegistry, HandlerHandle};
pub use report::{needs_report, render, ExitReport, ReportMode};
pub use shape::{CallbackShape, ShapeSynthesizer, WrapperFactory};
pub use snapshot::{CallbackSnapshot, HandlerSnapshot};
pub use wrapped::{CallCounter, HandlerLog, Wrapped};
