//! Shape synthesis for wrapped callbacks.
//!
//! A wrapper must report the same declared name and parameter count as the callback
//! it replaces. The per-arity call adapters are generated at compile time (see
//! [`Wrapped`]); what is built at runtime is the [`WrapperFactory`] carrying the
//! interned shape, and factories are cached by `(name, arity)` so every wrapper of
//! the same shape shares one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::callback::{declared_name, Callback};
use crate::wrapped::{CallCounter, Wrapped};

/// Declared name and parameter count of a callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackShape {
    pub name: String,
    pub arity: usize,
}

impl CallbackShape {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }

    /// Shape of the callable type `F` called with `Args`.
    pub fn of<F, Args>() -> Self
    where
        F: Callback<Args>,
    {
        Self::new(declared_name::<F>(), F::ARITY)
    }
}

impl fmt::Display for CallbackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() {
            "<anonymous>"
        } else {
            &self.name
        };
        write!(f, "{} args:{}", name, self.arity)
    }
}

/// Builds wrappers of one shape.
#[derive(Debug)]
pub struct WrapperFactory {
    shape: CallbackShape,
}

impl WrapperFactory {
    pub fn shape(&self) -> &CallbackShape {
        &self.shape
    }

    /// Build a wrapper that runs `counter` and then delegates to `original`.
    pub fn build<F, Args>(self: &Arc<Self>, counter: CallCounter, original: Arc<F>) -> Wrapped<F, Args>
    where
        F: Callback<Args>,
    {
        debug_assert_eq!(F::ARITY, self.shape.arity);
        Wrapped::new(Arc::clone(self), counter, original)
    }
}

/// Cache of wrapper factories keyed by `(name, arity)`.
#[derive(Debug, Default)]
pub struct ShapeSynthesizer {
    factories: Mutex<HashMap<CallbackShape, Arc<WrapperFactory>>>,
}

impl ShapeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the factory for `(name, arity)`, creating it on first use.
    pub fn build_wrapper(&self, name: &str, arity: usize) -> Arc<WrapperFactory> {
        let shape = CallbackShape::new(name, arity);
        let mut factories = self.factories.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(
            factories
                .entry(shape.clone())
                .or_insert_with(|| Arc::new(WrapperFactory { shape })),
        )
    }

    /// Number of distinct shapes built so far.
    pub fn len(&self) -> usize {
        self.factories
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_read(_buf: Vec<u8>, _len: usize) {}

    #[test]
    fn test_same_shape_reuses_factory() {
        let synth = ShapeSynthesizer::new();
        let a = synth.build_wrapper("foo", 3);
        let b = synth.build_wrapper("foo", 3);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(synth.len(), 1);
    }

    #[test]
    fn test_different_shapes_get_distinct_factories() {
        let synth = ShapeSynthesizer::new();
        let a = synth.build_wrapper("foo", 3);
        let b = synth.build_wrapper("foo", 2);
        let c = synth.build_wrapper("bar", 3);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(synth.len(), 3);
        assert_eq!(b.shape(), &CallbackShape::new("foo", 2));
    }

    #[test]
    fn test_shape_of_fn_item() {
        fn shape_of<F: Callback<Args>, Args>(_: &F) -> CallbackShape {
            CallbackShape::of::<F, Args>()
        }
        assert_eq!(shape_of(&on_read), CallbackShape::new("on_read", 2));
        assert_eq!(shape_of(&|| 1u8), CallbackShape::new("", 0));
    }

    #[test]
    fn test_shape_display() {
        assert_eq!(CallbackShape::new("greet", 2).to_string(), "greet args:2");
        assert_eq!(CallbackShape::new("", 1).to_string(), "<anonymous> args:1");
    }
}
