//! Minimal tsu-sets example: a default set, an auth set that builds on it,
//! and an error that the default error handler turns into a response.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i -H 'x-user: alice' http://localhost:3000/
//!   curl -i -H 'x-user: mallory' http://localhost:3000/

use std::sync::Arc;

use tsu_sets::{
    Flow, HandlerError, MiddlewareRef, Registry, Server, from_async, from_fn, middleware,
};

#[derive(Clone)]
struct User(String);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let registry = Arc::new(Registry::new());

    registry.create_set("default", vec![
        MiddlewareRef::handler(middleware::request_id()),
        MiddlewareRef::handler(middleware::trace()),
    ]);

    // "auth" runs everything in "default" first.
    registry.create_set("auth", vec![
        MiddlewareRef::from("default"),
        from_fn(|req, res| {
            let Some(name) = req.header("x-user") else {
                res.text(401, "who are you?");
                return Flow::Stop;
            };
            let user = User(name.to_owned());
            req.extensions_mut().insert(user);
            Flow::Continue
        }).into(),
        from_async(|req, _res| Box::pin(async move {
            // Stand-in for a permission lookup against a slow backend.
            tokio::task::yield_now().await;
            match req.extensions().get::<User>() {
                Some(User(name)) if name == "mallory" => {
                    Err(HandlerError::status(403, "forbidden").with_header("x-reason", "banned"))
                }
                _ => Ok(()),
            }
        })).into(),
    ]);

    let app = registry
        .apply_middleware("auth", from_fn(|req, _res| {
            let name = req.extensions().get::<User>().map_or("stranger", |u| u.0.as_str());
            format!("hello, {name}\n")
        }))
        .expect("auth set resolves");

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}
