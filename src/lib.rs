//! # micro
//!
//! A minimal HTTP dispatch core. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! micro takes a path and a request context, finds the route, binds the
//! handler's declared parameters *by name*, and runs the handler inside a
//! small lifecycle:
//!
//! ```text
//! before → handler → after        (success)
//! error                           (route miss or any failure, at most once)
//! finish                          (always)
//! ```
//!
//! What micro intentionally does not own:
//!
//! - **Transport** — no sockets, no HTTP parsing. Feed it from CGI
//!   ([`CgiEnvironment`]) or from any server built on the `http` types
//!   ([`App::run_request`]).
//! - **Responses** — handlers and callbacks write wherever they like; micro
//!   produces no output of its own.
//! - **Middleware stacks** — four flat callback lists, that is all.
//!
//! Path matching is radix-tree based, one tree per method, via [`matchit`].
//!
//! ## Parameter binding
//!
//! A handler declares the names it wants. For each name, in declared order,
//! micro looks in the route's captured values, then in the application's
//! parameter store ([`App::set`], [`App::set_lazy`]), and otherwise binds
//! nothing. Lazy parameters are computed on first use and cached.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use micro::{App, Method, RequestContext, Value, params};
//!
//! let out = Arc::new(Mutex::new(String::new()));
//!
//! let mut app = App::new();
//! app.set("out", Value::from_arc(Arc::clone(&out))).unwrap();
//! app.get("/hello/{world}", params(["out", "world"], |args| {
//!     let out = args.value::<Mutex<String>>(0).unwrap();
//!     *out.lock().unwrap() = format!("Hello {}!", args.str(1).unwrap());
//! }));
//! app.error(|err| eprintln!("dispatch failed: {err}"));
//!
//! app.run("/hello/world", &RequestContext::from(Method::Get)).unwrap();
//! assert_eq!(*out.lock().unwrap(), "Hello world!");
//! ```

mod app;
mod callbacks;
mod context;
mod error;
mod handler;
mod method;
mod params;
mod router;
mod value;

pub use app::{App, HANDLER_KEY};
pub use callbacks::{CallbackRegistry, Stage};
pub use context::{CgiEnvironment, RequestContext, RequestSource};
pub use error::{BoxError, Error};
pub use handler::{Declared, Handler, IntoOutcome, params};
pub use method::Method;
pub use params::ParameterStore;
pub use router::{Matched, Route, RouteTable};
pub use value::{Args, Value, Values};
