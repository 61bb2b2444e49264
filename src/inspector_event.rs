/// Events emitted by an inspector while it tracks callbacks.
///
/// These events are passed to the tracing callback set via `set_trace_callback`.
/// The `Clone` derive allows callbacks to store or forward events if needed.
///
/// # Examples
///
/// ```rust
/// use callback_inspector::InspectorEvent;
///
/// let event = InspectorEvent::Registered { name: "greet".into(), arity: 2, index: 0 };
/// assert_eq!(event.to_string(), "registered { name: greet, arity: 2, index: 0 }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectorEvent {
    /// A callback identity was seen for the first time and got a new record.
    Registered {
        /// Declared name of the callback (empty for closures)
        name: String,
        /// Declared parameter count
        arity: usize,
        /// Position in the global ordered collection
        index: usize,
    },

    /// A hand-off was recorded against an existing or new record.
    HandlerAdded {
        /// Record index
        index: usize,
        /// Position of the handler within the record
        handler: usize,
        /// `file:line` of the hand-off
        site: String,
    },

    /// A wrapped callback was invoked.
    Invoked {
        /// Record index
        index: usize,
        /// Position of the handler within the record
        handler: usize,
        /// Record-wide invocation count after this call
        total_called: u64,
    },

    /// A query listener started.
    Served {
        /// Bound address
        addr: String,
    },

    /// The exit report guard was armed.
    ReportArmed {
        /// Whether the exit report includes complete callbacks
        show_all: bool,
    },
}

impl std::fmt::Display for InspectorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InspectorEvent::Registered { name, arity, index } => {
                write!(
                    f,
                    "registered {{ name: {}, arity: {}, index: {} }}",
                    name, arity, index
                )
            }
            InspectorEvent::HandlerAdded {
                index,
                handler,
                site,
            } => {
                write!(
                    f,
                    "handler added {{ index: {}, handler: {}, site: {} }}",
                    index, handler, site
                )
            }
            InspectorEvent::Invoked {
                index,
                handler,
                total_called,
            } => {
                write!(
                    f,
                    "invoked {{ index: {}, handler: {}, total_called: {} }}",
                    index, handler, total_called
                )
            }
            InspectorEvent::Served { addr } => write!(f, "serving {{ addr: {} }}", addr),
            InspectorEvent::ReportArmed { show_all } => {
                write!(f, "exit report armed {{ show_all: {} }}", show_all)
            }
        }
    }
}
