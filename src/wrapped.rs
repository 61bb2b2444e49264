//! Wrapped callbacks.
//!
//! A [`Wrapped`] stands in for the original callback at a hand-off. Calling it
//! counts the invocation first and then delegates, so the count is recorded even
//! when the original panics. Name, arity and textual representation are those of
//! the original.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::callback::Callback;
use crate::inspector::TraceHook;
use crate::registry::HandlerHandle;
use crate::shape::{CallbackShape, WrapperFactory};
use crate::InspectorEvent;

/// Increment capability bound to one (record, handler) pair.
#[derive(Clone)]
pub struct CallCounter {
    handler: HandlerHandle,
    trace: TraceHook,
}

impl CallCounter {
    pub(crate) fn new(handler: HandlerHandle, trace: TraceHook) -> Self {
        Self { handler, trace }
    }

    /// Count one invocation. Never fails.
    pub fn mark(&self) {
        let Some(total_called) = self.handler.mark_called() else {
            return;
        };
        log::trace!(
            "callback #{} called through handler {} ({} total)",
            self.handler.record_index(),
            self.handler.handler_index(),
            total_called
        );
        self.trace.emit(|| InspectorEvent::Invoked {
            index: self.handler.record_index(),
            handler: self.handler.handler_index(),
            total_called,
        });
    }

    pub fn handler(&self) -> &HandlerHandle {
        &self.handler
    }
}

impl fmt::Debug for CallCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCounter")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

/// Log channel attached to one hand-off.
///
/// Can be handed to downstream code separately from the wrapper itself.
#[derive(Debug, Clone)]
pub struct HandlerLog {
    handler: HandlerHandle,
}

impl HandlerLog {
    /// Append a free-form entry to the hand-off's log.
    pub fn log(&self, entry: impl Into<String>) {
        self.handler.log(entry);
    }
}

/// An instrumented callback.
///
/// `Args` is the tuple of parameter types of the original. Use `call(..)` with the
/// original's parameters, [`invoke`](Wrapped::invoke) with a tuple, or
/// `into_fn()` to get a plain closure with the original's signature.
pub struct Wrapped<F, Args> {
    factory: Arc<WrapperFactory>,
    counter: CallCounter,
    original: Arc<F>,
    _args: PhantomData<fn(Args)>,
}

impl<F, Args> Wrapped<F, Args>
where
    F: Callback<Args>,
{
    pub(crate) fn new(factory: Arc<WrapperFactory>, counter: CallCounter, original: Arc<F>) -> Self {
        Self {
            factory,
            counter,
            original,
            _args: PhantomData,
        }
    }

    /// Count the invocation, then call the original with `args`.
    #[inline]
    pub fn invoke(&self, args: Args) -> F::Output {
        self.counter.mark();
        self.original.invoke(args)
    }
}

impl<F, Args> Wrapped<F, Args> {
    /// Declared name of the original callback.
    pub fn name(&self) -> &str {
        &self.factory.shape().name
    }

    /// Declared parameter count of the original callback.
    pub fn arity(&self) -> usize {
        self.factory.shape().arity
    }

    pub fn shape(&self) -> &CallbackShape {
        self.factory.shape()
    }

    /// The original callback.
    pub fn original(&self) -> &Arc<F> {
        &self.original
    }

    /// The hand-off this wrapper reports to.
    pub fn handler(&self) -> &HandlerHandle {
        self.counter.handler()
    }

    /// Invocations through this hand-off so far.
    pub fn called(&self) -> u64 {
        self.counter.handler().called().unwrap_or(0)
    }

    /// Append an entry to this hand-off's log.
    pub fn log(&self, entry: impl Into<String>) {
        self.counter.handler().log(entry);
    }

    /// A detached log channel for this hand-off.
    pub fn logger(&self) -> HandlerLog {
        HandlerLog {
            handler: self.counter.handler().clone(),
        }
    }

    /// Type name of the original callback.
    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

impl<F, Args> Clone for Wrapped<F, Args> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            counter: self.counter.clone(),
            original: Arc::clone(&self.original),
            _args: PhantomData,
        }
    }
}

impl<F, Args> fmt::Debug for Wrapped<F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("handler", self.handler())
            .finish()
    }
}

// Textual form is the original's, not the wrapper's.
impl<F, Args> fmt::Display for Wrapped<F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

macro_rules! impl_call {
    ($($ty:ident => $arg:ident),*) => {
        impl<Func, Ret, $($ty,)*> Wrapped<Func, ($($ty,)*)>
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
        {
            /// Count the invocation, then call the original with the same arguments.
            #[inline]
            pub fn call(&self, $($arg: $ty),*) -> Ret {
                self.counter.mark();
                (self.original)($($arg),*)
            }

            /// Convert into a plain closure with the original's signature.
            pub fn into_fn(self) -> impl Fn($($ty),*) -> Ret + Send + Sync {
                move |$($arg),*| self.call($($arg),*)
            }
        }
    };
}

impl_call!();
impl_call!(A0 => a0);
impl_call!(A0 => a0, A1 => a1);
impl_call!(A0 => a0, A1 => a1, A2 => a2);
impl_call!(A0 => a0, A1 => a1, A2 => a2, A3 => a3);
impl_call!(A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4);
impl_call!(A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5);
impl_call!(A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5, A6 => a6);
impl_call!(A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5, A6 => a6, A7 => a7);

#[cfg(test)]
mod tests {
    use crate::{CallSite, Inspector};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn site(line: u32) -> CallSite {
        CallSite::new(file!(), line)
    }

    #[test]
    fn test_call_forwards_arguments_and_result() {
        let inspector = Inspector::new();
        let wrapped = inspector
            .wrap_fn(|a: i32, b: i32| a * b, site(line!()))
            .unwrap();
        assert_eq!(wrapped.call(6, 7), 42);
        assert_eq!(wrapped.invoke((2, 3)), 6);
        assert_eq!(wrapped.called(), 2);
    }

    #[test]
    fn test_count_is_recorded_before_original_runs() {
        let inspector = Arc::new(Inspector::new());
        let seen = Arc::new(AtomicU64::new(u64::MAX));
        let seen_inner = Arc::clone(&seen);
        let inner = Arc::clone(&inspector);
        let wrapped = inspector
            .wrap_fn(
                move || {
                    let total = inner.all_callbacks()[0].total_called;
                    seen_inner.store(total, Ordering::SeqCst);
                },
                site(line!()),
            )
            .unwrap();

        wrapped.call();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_propagates_after_count() {
        let inspector = Inspector::new();
        let wrapped = inspector
            .wrap_fn(|_: u8| -> u8 { panic!("downstream failure") }, site(line!()))
            .unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| wrapped.call(1)));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"downstream failure"));
        assert_eq!(inspector.all_callbacks()[0].total_called, 1);
    }

    #[test]
    fn test_into_fn_keeps_counting() {
        let inspector = Inspector::new();
        let wrapped = inspector
            .wrap_fn(|s: String| s.len(), site(line!()))
            .unwrap();
        let handler = wrapped.handler().clone();

        let plain = wrapped.into_fn();
        fn consume(f: impl Fn(String) -> usize) -> usize {
            f("abc".to_string()) + f("de".to_string())
        }
        assert_eq!(consume(plain), 5);
        assert_eq!(handler.called(), Some(2));
    }

    #[test]
    fn test_clones_share_the_hand_off() {
        let inspector = Inspector::new();
        let wrapped = inspector.wrap_fn(|| (), site(line!())).unwrap();
        let copy = wrapped.clone();
        wrapped.call();
        copy.call();
        assert_eq!(wrapped.called(), 2);
        assert_eq!(inspector.all_callbacks()[0].handlers.len(), 1);
    }

    #[test]
    fn test_display_is_the_original_type() {
        fn on_ready() {}
        let inspector = Inspector::new();
        let wrapped = inspector.wrap_fn(on_ready, site(line!())).unwrap();
        assert!(wrapped.to_string().ends_with("on_ready"));
        assert_eq!(wrapped.to_string(), std::any::type_name_of_val(&on_ready));
    }

    #[test]
    fn test_logger_appends_to_handler_log() {
        let inspector = Inspector::new();
        let wrapped = inspector.wrap_fn(|| (), site(line!())).unwrap();
        wrapped.log("handed to scheduler");
        wrapped.logger().log("scheduler dropped task");

        let snap = &inspector.all_callbacks()[0];
        assert_eq!(
            snap.handlers[0].log,
            vec!["handed to scheduler", "scheduler dropped task"]
        );
    }
}
