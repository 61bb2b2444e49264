//! Fixed-arity callable shapes.
//!
//! Rust has no runtime reflection over a function's parameter list, so the shape of
//! a callback is captured at compile time instead: [`Callback`] is implemented once
//! per supported arity (0 through 8) for every `Fn` with that many parameters. The
//! argument tuple type selects the impl, and `ARITY` reports the declared count.

/// A callable value with a statically known parameter count.
///
/// `Args` is the tuple of parameter types, e.g. `(u32, String)` for a two-argument
/// callback. Implemented for all `Fn` closures, fn items and fn pointers of up to
/// eight parameters that are `Send + Sync + 'static`.
pub trait Callback<Args>: Send + Sync + 'static {
    /// Value returned by the callback
    type Output;

    /// Declared number of parameters
    const ARITY: usize;

    /// Call the callback with a tuple of arguments.
    fn invoke(&self, args: Args) -> Self::Output;
}

macro_rules! impl_callback {
    ($arity:expr; $($ty:ident => $arg:ident),*) => {
        impl<Func, Ret, $($ty,)*> Callback<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret + Send + Sync + 'static,
        {
            type Output = Ret;
            const ARITY: usize = $arity;

            #[inline]
            fn invoke(&self, ($($arg,)*): ($($ty,)*)) -> Ret {
                (self)($($arg),*)
            }
        }
    };
}

impl_callback!(0;);
impl_callback!(1; A0 => a0);
impl_callback!(2; A0 => a0, A1 => a1);
impl_callback!(3; A0 => a0, A1 => a1, A2 => a2);
impl_callback!(4; A0 => a0, A1 => a1, A2 => a2, A3 => a3);
impl_callback!(5; A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4);
impl_callback!(6; A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5);
impl_callback!(7; A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5, A6 => a6);
impl_callback!(8; A0 => a0, A1 => a1, A2 => a2, A3 => a3, A4 => a4, A5 => a5, A6 => a6, A7 => a7);

/// Declared name of a callable type.
///
/// Fn items yield their bare identifier (`my_crate::io::on_read` becomes `on_read`).
/// Generic arguments are dropped wherever they appear, so `Conn<u8>::on_close` and
/// `<Sink as Handler>::on_event` name the method. Closures, fn pointers and trait
/// objects have no declared name and yield an empty string. `Box` and `Arc` are
/// looked through.
pub fn declared_name<F: ?Sized>() -> String {
    name_from_type(std::any::type_name::<F>())
}

const POINTER_WRAPPERS: [&str; 2] = ["alloc::boxed::Box<", "alloc::sync::Arc<"];

const ANONYMOUS_PREFIXES: [&str; 5] = ["fn(", "unsafe ", "extern ", "for<", "dyn "];

pub(crate) fn name_from_type(type_name: &str) -> String {
    let type_name = type_name.trim_start_matches('&');
    let type_name = type_name.strip_prefix("mut ").unwrap_or(type_name);

    for wrapper in POINTER_WRAPPERS {
        if let Some(inner) = type_name
            .strip_prefix(wrapper)
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return name_from_type(inner);
        }
    }
    if ANONYMOUS_PREFIXES.iter().any(|p| type_name.starts_with(p)) {
        return String::new();
    }

    let path = strip_generics(type_name);
    match path.rsplit("::").next() {
        // `{{closure}}` and other compiler-generated segments
        Some(segment) if !segment.starts_with("{{") => segment.to_string(),
        _ => String::new(),
    }
}

/// Remove every balanced `<..>` group. `->` inside a group is not a closing bracket.
fn strip_generics(type_name: &str) -> String {
    let mut path = String::with_capacity(type_name.len());
    let mut depth = 0_usize;
    let mut chars = type_name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'>') => {
                chars.next();
                if depth == 0 {
                    path.push_str("->");
                }
            }
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => path.push(c),
            _ => {}
        }
    }
    path
}
