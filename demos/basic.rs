//! Minimal micro example: name-bound parameters and lifecycle callbacks.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Or as a CGI script, letting the environment describe the request:
//!   REQUEST_METHOD=GET REQUEST_URI=/users/42 SCRIPT_NAME=/index.cgi \
//!       cargo run --example basic -- --cgi

use std::sync::{Arc, Mutex};

use micro::{App, Args, Error, Method, RequestContext, Value, params};

/// Stand-in for a response object: handlers append, `finish` prints.
#[derive(Default)]
struct Response {
    status: u16,
    body: String,
}

type Shared = Arc<Mutex<Response>>;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let response: Shared = Arc::default();
    let mut app = App::new();

    app.set("response", Value::from_arc(Arc::clone(&response)))?
        .set_lazy("users", || Value::new(vec!["alice", "bob"]))?;

    app.get("/users/{id}", params(["response", "id", "users"], get_user))
        .post("/users", params(["response"], create_user))
        .delete("/users/{id}", params(["response", "id"], delete_user));

    let res = Arc::clone(&response);
    app.before(move || {
        let mut res = res.lock().unwrap();
        res.status = 200;
        res.body.clear();
    });

    let res = Arc::clone(&response);
    app.error(move |err| {
        let mut res = res.lock().unwrap();
        res.status = if err.is_not_found() { 404 } else { 500 };
        res.body = err.to_string();
    });

    let res = Arc::clone(&response);
    app.finish(move || {
        let res = res.lock().unwrap();
        println!("{} {}", res.status, res.body);
    });

    if std::env::args().any(|a| a == "--cgi") {
        return app.run_current();
    }

    for (method, path) in [
        (Method::Get, "/users/1"),
        (Method::Get, "/users/7"),
        (Method::Post, "/users"),
        (Method::Delete, "/users/1"),
        (Method::Get, "/nowhere"),
    ] {
        app.run(path, &RequestContext::from(method))?;
    }
    Ok(())
}

fn respond(args: &Args, status: u16, body: String) {
    if let Some(res) = args.value::<Mutex<Response>>(0) {
        let mut res = res.lock().unwrap();
        res.status = status;
        res.body = body;
    }
}

// GET /users/{id}
fn get_user(args: Args) -> Result<(), String> {
    let id: usize = args.str(1).unwrap_or("").parse().map_err(|_| "id must be a number".to_owned())?;
    let users = args.value::<Vec<&str>>(2).ok_or("no user store")?;
    let name = users.get(id).ok_or_else(|| format!("user {id} does not exist"))?;
    respond(&args, 200, format!(r#"{{"id":{id},"name":"{name}"}}"#));
    Ok(())
}

// POST /users
fn create_user(args: Args) {
    respond(&args, 201, r#"{"id":2,"name":"new_user"}"#.to_owned());
}

// DELETE /users/{id} → 204 No Content
fn delete_user(args: Args) {
    respond(&args, 204, String::new());
}
