//! Request context and the ambient-request boundary.
//!
//! The dispatcher itself never reads process state. It is handed a path and
//! a [`RequestContext`]. When the caller has neither (a CGI-style deployment
//! where the request lives in environment variables), a [`RequestSource`]
//! produces them. [`CgiEnvironment`] is the one place that touches the
//! process environment.
//!
//! | Variable | Used for |
//! |---|---|
//! | `REQUEST_METHOD` | the verb matched against routes (default `GET`) |
//! | `REQUEST_URI` | the path, query string stripped (default `/`) |
//! | `SCRIPT_NAME` / `PHP_SELF` | directory prefix removed from the path |
//!
//! The environment is not guaranteed to be UTF-8: a CGI server copies raw
//! header bytes into `HTTP_*` variables. Names that are not UTF-8 are
//! skipped and values are converted lossily, so one odd header never stops
//! a request from being served.

use std::collections::HashMap;
use std::ffi::OsString;

use tracing::debug;

use crate::method::Method;

// ── RequestContext ────────────────────────────────────────────────────────────

/// The environment of one request: its method plus free-form variables.
#[derive(Clone, Debug)]
pub struct RequestContext {
    method: String,
    vars: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), vars: HashMap::new() }
    }

    /// Build from CGI-style variables. The method comes from
    /// `REQUEST_METHOD`, `GET` when absent.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let method = vars.get("REQUEST_METHOD").cloned().unwrap_or_else(|| "GET".to_owned());
        Self { method, vars }
    }

    /// Adapter for servers built on the `http` types.
    ///
    /// Mirrors the CGI variable names: `REQUEST_METHOD`, `REQUEST_URI`,
    /// `QUERY_STRING`, and one `HTTP_*` entry per header.
    pub fn from_request<B>(req: &http::Request<B>) -> Self {
        let mut vars = HashMap::new();
        vars.insert("REQUEST_METHOD".to_owned(), req.method().as_str().to_owned());
        let uri = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
        vars.insert("REQUEST_URI".to_owned(), uri.to_owned());
        if let Some(query) = req.uri().query() {
            vars.insert("QUERY_STRING".to_owned(), query.to_owned());
        }
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
                vars.insert(key, value.to_owned());
            }
        }
        Self { method: req.method().as_str().to_owned(), vars }
    }

    /// Builder: add or replace one variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// The raw method string, as received.
    pub fn method(&self) -> &str { &self.method }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Method> for RequestContext {
    fn from(method: Method) -> Self {
        Self::new(method.as_str())
    }
}

// ── RequestSource ─────────────────────────────────────────────────────────────

/// Supplies the current request when [`App::run_current`](crate::App::run_current)
/// is called without explicit arguments.
pub trait RequestSource: Send + Sync {
    /// The request path and context of the request being served.
    fn current(&self) -> (String, RequestContext);
}

/// Reads the request from CGI/1.1 environment variables.
///
/// `CgiEnvironment::new()` reads the live process environment on every
/// call; [`from_vars`](CgiEnvironment::from_vars) and
/// [`from_os_vars`](CgiEnvironment::from_os_vars) pin a fixed set, which is
/// what tests use.
#[derive(Clone, Debug, Default)]
pub struct CgiEnvironment {
    fixed: Option<HashMap<String, String>>,
}

impl CgiEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { fixed: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()) }
    }

    /// Pin a fixed set of raw OS strings, converted the same way as the live
    /// environment.
    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self { fixed: Some(utf8_vars(vars)) }
    }
}

impl RequestSource for CgiEnvironment {
    fn current(&self) -> (String, RequestContext) {
        let ctx = match &self.fixed {
            Some(vars) => RequestContext::from_vars(vars.clone()),
            None => RequestContext::from_vars(utf8_vars(std::env::vars_os())),
        };
        let script = ctx.var("SCRIPT_NAME").or_else(|| ctx.var("PHP_SELF")).unwrap_or("");
        let path = request_path(ctx.var("REQUEST_URI").unwrap_or("/"), script);
        (path, ctx)
    }
}

/// Environment pairs as UTF-8: names that are not valid UTF-8 are dropped,
/// values are converted lossily.
fn utf8_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let name = match name.into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(name = ?raw, "skipping non-UTF-8 environment variable");
                    return None;
                }
            };
            let value = value.into_string().unwrap_or_else(|raw| {
                debug!(%name, "environment value is not UTF-8, converting lossily");
                raw.to_string_lossy().into_owned()
            });
            Some((name, value))
        })
        .collect()
}

/// Strip the query string and the script's directory from a request URI.
///
/// `/app/users/1?x=y` served by `/app/index.cgi` becomes `/users/1`. A script
/// at the root (`/index.cgi`) leaves the URI alone.
fn request_path(uri: &str, script_name: &str) -> String {
    let uri = uri.split_once('?').map_or(uri, |(path, _)| path);
    let dir = match script_name.rfind('/') {
        Some(i) if i > 0 => &script_name[..i],
        _ => "",
    };
    let path = match uri.strip_prefix(dir) {
        Some(rest) if !dir.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => uri,
    };
    if path.is_empty() { "/".to_owned() } else { path.to_owned() }
}
