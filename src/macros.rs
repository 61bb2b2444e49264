//! Macros for call-site capture and module-level inspectors.

/// Captures the current source location as a [`CallSite`](crate::CallSite).
///
/// Without arguments the enclosing module path is used as the site name; pass an
/// expression to name the routine the callback is handed to instead.
///
/// ```rust
/// use callback_inspector::call_site;
///
/// let site = call_site!("spawn_reader");
/// assert_eq!(site.file.as_deref(), Some(file!()));
/// assert_eq!(site.name.as_deref(), Some("spawn_reader"));
/// assert!(site.validate().is_ok());
/// ```
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(file!(), line!())
            .with_column(column!())
            .with_name(module_path!())
    };
    ($name:expr) => {
        $crate::CallSite::new(file!(), line!())
            .with_column(column!())
            .with_name($name)
    };
}

/// Wraps an `Arc` callback with the current source location as its call site.
///
/// ```rust
/// use callback_inspector::{wrap, Inspector};
/// use std::sync::Arc;
///
/// let inspector = Inspector::new();
/// let on_done = Arc::new(|code: i32| code == 0);
///
/// let wrapped = wrap!(inspector, on_done, "run_job").unwrap();
/// assert!(wrapped.call(0));
/// assert_eq!(inspector.all_callbacks()[0].handlers[0].meta.line, Some(line!() - 2));
/// ```
#[macro_export]
macro_rules! wrap {
    ($inspector:expr, $callback:expr) => {
        $inspector.wrap(&$callback, $crate::call_site!())
    };
    ($inspector:expr, $callback:expr, $name:expr) => {
        $inspector.wrap(&$callback, $crate::call_site!($name))
    };
}

/// Creates an isolated, module-level inspector.
///
/// The macro generates a module containing:
/// - Inspector storage static (hidden)
/// - Free functions delegating to it
///
/// # Examples
///
/// ```rust
/// use callback_inspector::{define_inspector, CallSite};
///
/// define_inspector!(io_callbacks);
///
/// let wrapped = io_callbacks::wrap_fn(|_: Vec<u8>| (), CallSite::new("io.rs", 3)).unwrap();
/// assert_eq!(io_callbacks::pending_callbacks().len(), 1);
///
/// wrapped.call(vec![1, 2, 3]);
/// assert_eq!(io_callbacks::complete_callbacks().len(), 1);
/// ```
///
/// # Multiple Inspectors
///
/// ```rust
/// use callback_inspector::{define_inspector, CallSite};
///
/// define_inspector!(network);
/// define_inspector!(storage);
///
/// network::wrap_fn(|| (), CallSite::new("net.rs", 1)).unwrap();
///
/// // No interference between inspectors
/// assert_eq!(network::all_callbacks().len(), 1);
/// assert!(storage::all_callbacks().is_empty());
/// ```
#[macro_export]
macro_rules! define_inspector {
    ($name:ident) => {
        #[allow(dead_code)]
        pub mod $name {
            use std::sync::{Arc, LazyLock};

            // Inspector storage (module-private)
            static INSPECTOR: LazyLock<$crate::Inspector> = LazyLock::new($crate::Inspector::new);

            /// The inspector behind this module.
            pub fn inspector() -> &'static $crate::Inspector {
                &INSPECTOR
            }

            /// Wrap a shared callback for a hand-off.
            pub fn wrap<F, Args>(
                callback: &Arc<F>,
                site: $crate::CallSite,
            ) -> $crate::Result<$crate::Wrapped<F, Args>>
            where
                F: $crate::Callback<Args>,
            {
                INSPECTOR.wrap(callback, site)
            }

            /// Wrap a callback with no other owner.
            pub fn wrap_fn<F, Args>(
                callback: F,
                site: $crate::CallSite,
            ) -> $crate::Result<$crate::Wrapped<F, Args>>
            where
                F: $crate::Callback<Args>,
            {
                INSPECTOR.wrap_fn(callback, site)
            }

            pub fn all_callbacks() -> Vec<$crate::CallbackSnapshot> {
                INSPECTOR.all_callbacks()
            }

            pub fn complete_callbacks() -> Vec<$crate::CallbackSnapshot> {
                INSPECTOR.complete_callbacks()
            }

            pub fn pending_callbacks() -> Vec<$crate::CallbackSnapshot> {
                INSPECTOR.pending_callbacks()
            }

            /// Render the text report.
            pub fn render(mode: $crate::ReportMode) -> String {
                INSPECTOR.render(mode)
            }

            /// Arm the final report (first call only).
            #[must_use = "the report prints when this guard is dropped"]
            pub fn report_on_exit(show_all: bool) -> $crate::ExitReport {
                INSPECTOR.report_on_exit(show_all)
            }

            /// Start the query listener.
            pub fn serve(port: u16) -> $crate::Result<std::net::SocketAddr> {
                INSPECTOR.serve(port)
            }

            /// Set a tracing callback for inspector events.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::InspectorEvent) + Send + Sync + 'static,
            ) {
                INSPECTOR.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                INSPECTOR.clear_trace_callback()
            }
        }
    };
}
