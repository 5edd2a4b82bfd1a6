//! The application: route registration, parameters, lifecycle, dispatch.
//!
//! # One dispatch
//!
//! ```text
//! run(path, ctx)
//!   MATCHING   route table lookup ─────────── miss ──┐
//!   RESOLVING  declared names → Args                 │
//!   BEFORE     before callbacks ──────────── fail ───┤
//!   INVOKING   handler(args) ─────────────── fail ───┤
//!   AFTER      after callbacks ───────────── fail ───┤
//!                                                    ↓
//!                                   ERROR  error callbacks (at most once)
//!   FINISH     finish callbacks  ← always, exactly once
//! ```
//!
//! Route misses and handler failures are absorbed by the error stage and
//! `run` returns `Ok(())`. A failing *callback* is different: it still goes
//! through the error stage (when it happened before it), finish callbacks
//! still run, and then `run` returns it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::callbacks::{CallbackRegistry, Stage};
use crate::context::{CgiEnvironment, RequestContext, RequestSource};
use crate::error::Error;
use crate::handler::{Handler, IntoOutcome};
use crate::method::Method;
use crate::params::ParameterStore;
use crate::router::{Matched, RouteTable};
use crate::value::{Args, Value, Values};

/// Route value name reserved for the handler itself. Never bound to a
/// handler parameter, even if a template or default uses it.
pub const HANDLER_KEY: &str = "controller";

/// The dispatcher.
///
/// Configure it with `&mut self` methods during setup, then dispatch with
/// [`run`](App::run), which only needs `&self`. A configured `App` is
/// `Send + Sync` and can be shared behind an `Arc`.
///
/// ```rust
/// use micro::{App, Method, RequestContext, params};
///
/// let mut app = App::new();
/// app.set("greeting", "Hello").unwrap();
/// app.get("/hello/{name}", params(["greeting", "name"], |args| {
///     println!("{} {}!", args.str(0).unwrap(), args.str(1).unwrap());
/// }));
/// app.error(|err| eprintln!("{err}"));
///
/// app.run("/hello/world", &RequestContext::from(Method::Get)).unwrap();
/// ```
pub struct App {
    routes: RouteTable,
    params: ParameterStore,
    callbacks: CallbackRegistry,
    source: Box<dyn RequestSource>,
}

impl App {
    /// A new, empty application reading ambient requests from the CGI
    /// environment.
    pub fn new() -> Self {
        Self {
            routes: RouteTable::new(),
            params: ParameterStore::new(),
            callbacks: CallbackRegistry::new(),
            source: Box::new(CgiEnvironment::new()),
        }
    }

    /// Replace where [`run_current`](App::run_current) gets its request.
    pub fn with_source(mut self, source: impl RequestSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    // ── Routes ────────────────────────────────────────────────────────────────

    /// Register a handler for a method + template pair. Returns `self` for
    /// chaining. If the template collides with an earlier one for the same
    /// method, the earlier route keeps matching.
    ///
    /// # Panics
    ///
    /// Panics on a malformed template, see [`RouteTable::add`].
    pub fn add<T>(&mut self, method: Method, template: &str, handler: impl Handler<T>) -> &mut Self {
        self.add_with_defaults(method, template, Values::new(), handler)
    }

    /// Like [`add`](App::add), with route-level default values that bind
    /// when the path does not capture the name.
    pub fn add_with_defaults<T>(
        &mut self,
        method: Method,
        template: &str,
        defaults: Values,
        handler: impl Handler<T>,
    ) -> &mut Self {
        self.routes.add(method, template, handler.into_boxed_handler(), defaults);
        self
    }

    pub fn get<T>(&mut self, template: &str, handler: impl Handler<T>) -> &mut Self {
        self.add(Method::Get, template, handler)
    }

    pub fn post<T>(&mut self, template: &str, handler: impl Handler<T>) -> &mut Self {
        self.add(Method::Post, template, handler)
    }

    pub fn put<T>(&mut self, template: &str, handler: impl Handler<T>) -> &mut Self {
        self.add(Method::Put, template, handler)
    }

    pub fn delete<T>(&mut self, template: &str, handler: impl Handler<T>) -> &mut Self {
        self.add(Method::Delete, template, handler)
    }

    /// The underlying route table, for inspection.
    pub fn routes(&self) -> &RouteTable { &self.routes }

    /// The underlying route table, for registering routes directly.
    pub fn routes_mut(&mut self) -> &mut RouteTable { &mut self.routes }

    // ── Lifecycle callbacks ───────────────────────────────────────────────────

    /// Runs after the route is resolved, before the handler.
    pub fn before<F, R>(&mut self, callback: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.callbacks.register(Stage::Before, callback);
    }

    /// Runs after the handler returned successfully.
    pub fn after<F, R>(&mut self, callback: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.callbacks.register(Stage::After, callback);
    }

    /// Runs once per failed dispatch with the captured error.
    pub fn error<F, R>(&mut self, callback: F)
    where
        F: Fn(&Error) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.callbacks.register_error(callback);
    }

    /// Runs last on every dispatch.
    pub fn finish<F, R>(&mut self, callback: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        self.callbacks.register(Stage::Finish, callback);
    }

    // ── Parameters ────────────────────────────────────────────────────────────

    /// Make `value` available to every handler that declares `key`.
    ///
    /// Fails with [`Error::DuplicateParameter`] if `key` is already set.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self, Error> {
        self.params.set(key, value)?;
        Ok(self)
    }

    /// Like [`set`](App::set), but the value is produced by `provider` on
    /// first use and cached.
    pub fn set_lazy<F>(&mut self, key: impl Into<String>, provider: F) -> Result<&mut Self, Error>
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        self.params.set_lazy(key, provider)?;
        Ok(self)
    }

    /// The parameter under `key`, or `None`. Never fails.
    pub fn fetch(&self, key: &str) -> Option<Value> {
        self.params.fetch(key)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Dispatch one request.
    ///
    /// Returns `Err` only when a lifecycle callback failed; route misses and
    /// handler failures are delivered to the `error` callbacks instead.
    pub fn run(&self, path: &str, ctx: &RequestContext) -> Result<(), Error> {
        let escalated = match self.dispatch(path, ctx) {
            Ok(()) => None,
            Err(err) => self.fail(err),
        };

        let finished = self.callbacks.invoke(Stage::Finish, None);

        match (escalated, finished) {
            (Some(err), Err(dropped)) => {
                warn!(error = %dropped, "finish callback failed after an earlier callback failure");
                Err(err)
            }
            (Some(err), Ok(())) | (None, Err(err)) => Err(err),
            (None, Ok(())) => Ok(()),
        }
    }

    /// Dispatch the request described by the configured [`RequestSource`].
    pub fn run_current(&self) -> Result<(), Error> {
        let (path, ctx) = self.source.current();
        self.run(&path, &ctx)
    }

    /// Dispatch an `http::Request`, for embedding in a server.
    pub fn run_request<B>(&self, req: &http::Request<B>) -> Result<(), Error> {
        self.run(req.uri().path(), &RequestContext::from_request(req))
    }

    /// MATCHING through AFTER. Any `Err` is headed for the error stage.
    fn dispatch(&self, path: &str, ctx: &RequestContext) -> Result<(), Error> {
        let Ok(method) = ctx.method().parse::<Method>() else {
            debug!(method = ctx.method(), path, "unknown method, no route");
            return Err(Error::route_not_found(ctx.method(), path));
        };

        let Some(Matched { route, mut values }) = self.routes.lookup(method, path) else {
            debug!(%method, path, "no route matched");
            return Err(Error::not_routed(method, path));
        };
        debug!(%method, path, template = route.template(), "route matched");

        values.remove(HANDLER_KEY);
        let args = self.resolve(route.handler().names().clone(), &values);

        self.callbacks.invoke(Stage::Before, None)?;
        route.handler().call(args).map_err(Error::Handler)?;
        self.callbacks.invoke(Stage::After, None)
    }

    /// Bind each declared name: route value, then parameter store, then
    /// nothing. Position follows the declaration, never the route.
    fn resolve(&self, names: Arc<[String]>, values: &Values) -> Args {
        let resolved = names
            .iter()
            .map(|name| {
                let value = values.get(name).cloned().or_else(|| self.params.fetch(name));
                if value.is_none() {
                    trace!(param = %name, "no value bound");
                }
                value
            })
            .collect();
        Args::new(names, resolved)
    }

    /// ERROR stage. Returns the failure `run` must surface, if any.
    fn fail(&self, err: Error) -> Option<Error> {
        warn!(error = %err, "dispatch failed");
        let handled = self.callbacks.invoke(Stage::Error, Some(&err));

        if err.is_callback() {
            if let Err(dropped) = handled {
                warn!(error = %dropped, "error callback failed while handling a callback failure");
            }
            return Some(err);
        }
        handled.err()
    }
}

impl Default for App {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes)
            .field("params", &self.params)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::params;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    fn get() -> RequestContext {
        RequestContext::from(Method::Get)
    }

    #[test]
    fn app_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<App>();
    }

    #[test]
    fn reserved_handler_key_is_not_bindable() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let mut app = App::new();
        app.set("controller", "from-store").unwrap();
        app.add_with_defaults(
            Method::Get,
            "/c",
            Values::new().with(HANDLER_KEY, "from-route"),
            params(["controller"], move |args| {
                *sink.lock().unwrap() = args.str(0).map(str::to_owned);
            }),
        );

        app.run("/c", &get()).unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("from-store"));
    }

    #[test]
    fn unknown_method_is_a_route_miss() {
        let seen = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&seen);
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);

        let mut app = App::new();
        app.get("/test", move || *flag.lock().unwrap() = true);
        app.error(move |err| *sink.lock().unwrap() = err.is_not_found());

        app.run("/test", &RequestContext::new("BREW")).unwrap();
        assert!(*seen.lock().unwrap());
        assert!(!*ran.lock().unwrap());
    }

    #[test]
    #[traced_test]
    fn route_miss_is_logged() {
        let app = App::new();
        app.run("/missing", &get()).unwrap();
        assert!(logs_contain("no route matched"));
        assert!(logs_contain("dispatch failed"));
    }

    #[test]
    fn finish_failure_is_returned() {
        let mut app = App::new();
        app.get("/test", || {});
        app.finish(|| Err::<(), _>("finish broke"));

        let err = app.run("/test", &get()).unwrap_err();
        assert!(matches!(err, Error::Callback { stage: Stage::Finish, .. }));
    }

    #[test]
    fn earliest_callback_failure_wins() {
        let mut app = App::new();
        app.get("/test", || {});
        app.before(|| Err::<(), _>("before broke"));
        app.error(|_err| Err::<(), _>("error broke"));
        app.finish(|| Err::<(), _>("finish broke"));

        let err = app.run("/test", &get()).unwrap_err();
        assert!(matches!(err, Error::Callback { stage: Stage::Before, .. }));
    }
}
