//! Radix-tree route table.
//!
//! One tree per HTTP method. O(path-length) lookup. You register a template
//! and a handler; a lookup gives you back the route and the values its
//! placeholders captured. Binding those values to handler parameters is the
//! dispatcher's job, not this module's.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use matchit::{InsertError, Router as MatchitRouter};
use tracing::warn;

use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::value::{Value, Values};

/// A registered route. Immutable once added.
pub struct Route {
    method: Method,
    template: String,
    handler: BoxedHandler,
    defaults: Values,
}

impl Route {
    pub fn method(&self) -> Method { self.method }

    /// The template as registered (before placeholder normalisation).
    pub fn template(&self) -> &str { &self.template }

    /// The handler's declared parameter names, in declaration order.
    pub fn param_names(&self) -> &[String] { self.handler.names() }

    /// Route-level values applied when the path does not capture the name.
    pub fn defaults(&self) -> &Values { &self.defaults }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("params", &self.param_names())
            .finish()
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct Matched {
    pub route: Arc<Route>,
    /// Route defaults overlaid with the captured path segments.
    pub values: Values,
}

/// The route table.
///
/// Build it once at setup; lookups borrow it immutably, so a finished table
/// can be shared freely between threads.
#[derive(Default)]
pub struct RouteTable {
    trees: HashMap<Method, MatchitRouter<Arc<Route>>>,
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` + `template`.
    ///
    /// Placeholders use `{name}` (one segment) or `{*name}` (the rest of the
    /// path). The older `{:name}` and `{:name:regex}` spellings are accepted
    /// and treated as `{name}`; the regex is not enforced.
    ///
    /// A template that collides with one already registered for the same
    /// method (the same template again, or `/users/{id}` after
    /// `/users/{name}`) is still listed by [`routes`](RouteTable::routes),
    /// but never matches: the first registration wins.
    ///
    /// # Panics
    ///
    /// Panics if the template is malformed, e.g. a catch-all that is not the
    /// last segment. Routes are set up once at startup, so this surfaces
    /// immediately.
    pub fn add(&mut self, method: Method, template: &str, handler: BoxedHandler, defaults: Values) {
        let route = Arc::new(Route {
            method,
            template: template.to_owned(),
            handler,
            defaults,
        });
        let tree = self.trees.entry(method).or_default();
        match tree.insert(normalize(template), Arc::clone(&route)) {
            Ok(()) => {}
            Err(InsertError::Conflict { with }) => {
                warn!(%method, template, shadowed_by = %with, "route shadowed by an earlier registration");
            }
            Err(e) => panic!("invalid route `{template}`: {e}"),
        }
        self.routes.push(route);
    }

    /// Find the route for `method` + `path`, or `None`.
    pub fn lookup(&self, method: Method, path: &str) -> Option<Matched> {
        let tree = self.trees.get(&method)?;
        let matched = tree.at(path).ok()?;
        let route = Arc::clone(matched.value);
        let mut values = route.defaults.clone();
        for (name, segment) in matched.params.iter() {
            values.insert(name, Value::from(segment));
        }
        Some(Matched { route, values })
    }

    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(Arc::as_ref)
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes()).finish()
    }
}

/// Rewrite `{:name}` and `{:name:regex}` placeholders to matchit's `{name}`.
///
/// Braces inside a constraint (`{:year:(\d{4})}`) are balanced, so the
/// placeholder ends at its own closing brace. An unterminated placeholder is
/// passed through untouched for matchit to reject.
fn normalize(template: &str) -> Cow<'_, str> {
    if !template.contains(':') {
        return Cow::Borrowed(template);
    }
    let mut out = String::with_capacity(template.len());
    let mut inner = String::new();
    let mut depth = 0usize;
    for c in template.chars() {
        match (c, depth) {
            ('{', 0) => depth = 1,
            ('}', 1) => {
                depth = 0;
                let name = inner.strip_prefix(':').unwrap_or(&inner);
                let name = name.split(':').next().unwrap_or_default();
                out.push('{');
                out.push_str(name);
                out.push('}');
                inner.clear();
            }
            (_, 0) => out.push(c),
            _ => {
                match c {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                inner.push(c);
            }
        }
    }
    if depth > 0 {
        out.push('{');
        out.push_str(&inner);
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::value::Args;
    use tracing_test::traced_test;

    fn noop() -> BoxedHandler {
        Handler::<()>::into_boxed_handler(|| {})
    }

    #[test]
    fn lookup_is_per_method() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/test", noop(), Values::new());

        assert!(table.lookup(Method::Get, "/test").is_some());
        assert!(table.lookup(Method::Post, "/test").is_none());
        assert!(table.lookup(Method::Get, "/other").is_none());
    }

    #[test]
    fn placeholders_are_captured() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/hello/{world}", noop(), Values::new());

        let matched = table.lookup(Method::Get, "/hello/world").unwrap();
        assert_eq!(matched.route.template(), "/hello/{world}");
        assert_eq!(matched.values.get("world").and_then(Value::as_str), Some("world"));
    }

    #[test]
    fn legacy_placeholder_syntax() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/hello/{:world}", noop(), Values::new());

        let matched = table.lookup(Method::Get, "/hello/there").unwrap();
        assert_eq!(matched.values.get("world").and_then(Value::as_str), Some("there"));
        assert_eq!(matched.route.template(), "/hello/{:world}");
    }

    #[test]
    fn path_segments_override_defaults() {
        let mut table = RouteTable::new();
        let defaults = Values::new().with("page", "1").with("format", "json");
        table.add(Method::Get, "/posts/{page}", noop(), defaults);

        let matched = table.lookup(Method::Get, "/posts/3").unwrap();
        assert_eq!(matched.values.get("page").and_then(Value::as_str), Some("3"));
        assert_eq!(matched.values.get("format").and_then(Value::as_str), Some("json"));
    }

    #[test]
    fn catch_all_takes_the_rest() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/files/{*path}", noop(), Values::new());

        let matched = table.lookup(Method::Get, "/files/a/b/c.txt").unwrap();
        assert_eq!(matched.values.get("path").and_then(Value::as_str), Some("a/b/c.txt"));
    }

    #[test]
    fn routes_listed_in_registration_order() {
        let mut table = RouteTable::new();
        table.add(Method::Post, "/b", noop(), Values::new());
        table.add(Method::Get, "/a", noop(), Values::new());

        let listed: Vec<_> = table.routes().map(|r| (r.method(), r.template())).collect();
        assert_eq!(listed, [(Method::Post, "/b"), (Method::Get, "/a")]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn constrained_placeholder_drops_its_pattern() {
        assert_eq!(normalize("/users/{:id:(\\d+)}"), "/users/{id}");
        assert_eq!(normalize("/{:year:(\\d{4})}/{:slug}"), "/{year}/{slug}");
        assert_eq!(normalize("/files/{*path}"), "/files/{*path}");

        let mut table = RouteTable::new();
        table.add(Method::Get, "/users/{:id:(\\d+)}", noop(), Values::new());
        let matched = table.lookup(Method::Get, "/users/42").unwrap();
        assert_eq!(matched.values.get("id").and_then(Value::as_str), Some("42"));
        assert_eq!(matched.route.template(), "/users/{:id:(\\d+)}");
    }

    #[test]
    #[traced_test]
    fn conflicting_route_keeps_the_first() {
        let first = Handler::<Args>::into_boxed_handler(crate::handler::params(["name"], |_| {}));
        let mut table = RouteTable::new();
        table.add(Method::Get, "/users/{name}", first, Values::new());
        table.add(Method::Get, "/users/{id}", noop(), Values::new());

        let matched = table.lookup(Method::Get, "/users/ann").unwrap();
        assert_eq!(matched.route.template(), "/users/{name}");
        assert_eq!(matched.route.param_names(), ["name"]);
        assert_eq!(matched.values.get("name").and_then(Value::as_str), Some("ann"));
        assert!(!matched.values.contains("id"));
        assert_eq!(table.len(), 2);
        assert!(logs_contain("route shadowed by an earlier registration"));
    }

    #[test]
    fn defaults_are_kept_on_the_route() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/posts", noop(), Values::new().with("page", "1"));
        table.add(Method::Get, "/about", noop(), Values::new());

        let routes: Vec<_> = table.routes().collect();
        assert_eq!(routes[0].defaults().get("page").and_then(Value::as_str), Some("1"));
        assert!(routes[1].defaults().is_empty());
        assert!(table.lookup(Method::Get, "/about").unwrap().values.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid route `/files/{*path}/meta`")]
    fn malformed_route_panics() {
        let mut table = RouteTable::new();
        table.add(Method::Get, "/files/{*path}/meta", noop(), Values::new());
    }
}
