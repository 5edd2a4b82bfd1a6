//! Handler trait, declared parameter names, and type erasure.
//!
//! # How handlers are stored
//!
//! The route table holds handlers of *different* closure types in one
//! `matchit` tree per method. Rust collections can only hold one concrete
//! type, so every handler is erased behind `dyn ErasedHandler` and stored
//! as an `Arc`.
//!
//! ```text
//! params(["id"], |args| { … })                 ← user writes this
//!        ↓ app.get("/users/{id}", …)
//! handler.into_boxed_handler()                 ← Handler impl
//!        ↓
//! Arc::new(FnHandler { names, f })             ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(args)  at dispatch time         ← one vtable call
//! ```
//!
//! # Declared parameter names
//!
//! A handler says which names it wants, in which order, and the dispatcher
//! builds the positional [`Args`] from that list. Closures passed directly
//! declare no names; wrap them with [`params`] to declare some.

use std::sync::Arc;

use crate::error::BoxError;
use crate::value::Args;

// ── Internal types ────────────────────────────────────────────────────────────

/// What every handler becomes once registered: a list of declared names and
/// a synchronous call from resolved [`Args`] to success or a boxed error.
///
/// Exposed only so [`Handler::into_boxed_handler`] can name its return type.
#[doc(hidden)]
pub trait ErasedHandler {
    /// Declared parameter names, in declaration order.
    fn names(&self) -> &Arc<[String]>;
    fn call(&self, args: Args) -> Result<(), BoxError>;
}

/// A handler as a [`Route`](crate::Route) stores it, behind one `Arc`.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Outcome conversion ────────────────────────────────────────────────────────

/// What a handler or callback may return.
///
/// `()` always succeeds. `Result<(), E>` fails with `E` converted into a
/// [`BoxError`], so handlers can use `?` on any error type.
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> { Ok(()) }
}

impl<E> IntoOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by:
///
/// - any `Fn() -> impl IntoOutcome` closure (no declared parameters);
/// - any `Fn(Args) -> impl IntoOutcome` closure (no declared parameters,
///   so `args` is always empty);
/// - the value returned by [`params`], which attaches declared names.
///
/// `T` is a marker that keeps the blanket impls apart; callers never name
/// it. The trait is **sealed** (via the private `Sealed` supertrait).
pub trait Handler<T>: private::Sealed<T> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed<T> {}
}

/// A handler closure together with its declared parameter names.
///
/// Built by [`params`].
pub struct Declared<F> {
    names: Vec<String>,
    f: F,
}

/// Declare the parameter names a handler wants bound, in order.
///
/// ```rust
/// use micro::{App, params};
///
/// let mut app = App::new();
/// app.get("/hello/{world}", params(["world", "greeting"], |args| {
///     let world = args.str(0).unwrap_or("nobody");
///     let greeting = args.str(1).unwrap_or("Hello");
///     println!("{greeting} {world}!");
/// }));
/// ```
pub fn params<I, S, F, R>(names: I, f: F) -> Declared<F>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    Declared { names: names.into_iter().map(Into::into).collect(), f }
}

// ── Implementations ───────────────────────────────────────────────────────────

impl<F, R> private::Sealed<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
}

impl<F, R> Handler<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler { names: Arc::from(Vec::new()), f: move |_: Args| self() })
    }
}

impl<F, R> private::Sealed<Args> for F
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
}

impl<F, R> Handler<Args> for F
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler { names: Arc::from(Vec::new()), f: self })
    }
}

impl<F, R> private::Sealed<Args> for Declared<F>
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
}

impl<F, R> Handler<Args> for Declared<F>
where
    F: Fn(Args) -> R + Send + Sync + 'static,
    R: IntoOutcome,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler { names: Arc::from(self.names), f: self.f })
    }
}

/// Bridges a typed closure to the trait-object world.
struct FnHandler<F> {
    names: Arc<[String]>,
    f: F,
}

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Args) -> R,
    R: IntoOutcome,
{
    fn names(&self) -> &Arc<[String]> {
        &self.names
    }

    fn call(&self, args: Args) -> Result<(), BoxError> {
        (self.f)(args).into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args(h: &BoxedHandler) -> Args {
        Args::new(Arc::clone(h.names()), vec![None; h.names().len()])
    }

    #[test]
    fn bare_closure_declares_nothing() {
        let h = Handler::<()>::into_boxed_handler(|| {});
        assert!(h.names().is_empty());
        assert!(h.call(empty_args(&h)).is_ok());

        let h = Handler::<Args>::into_boxed_handler(|args: Args| assert!(args.is_empty()));
        assert!(h.names().is_empty());
        assert!(h.call(empty_args(&h)).is_ok());
    }

    #[test]
    fn declared_names_keep_order() {
        let h = params(["response", "world", "foo"], |_args| {}).into_boxed_handler();
        assert_eq!(&h.names()[..], ["response", "world", "foo"]);
    }

    #[test]
    fn result_errors_are_boxed() {
        let h = params(["x"], |_args| -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk on fire"))
        })
        .into_boxed_handler();
        let err = h.call(empty_args(&h)).unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }
}
