use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use passage_tokens::SessionProjection;
use passage_tower::{AccessGate, RequireSession};
use tower_http::validate_request::ValidateRequestHeaderLayer;

/// Stands in for a real session lookup: any request carrying an
/// `x-demo-session` header is treated as signed in
async fn attach_session(mut req: Request, next: Next) -> Response {
    let session = SessionProjection {
        authenticated: req.headers().contains_key("x-demo-session"),
        ..SessionProjection::default()
    };
    req.extensions_mut().insert(session);
    next.run(req).await
}

async fn handle_root() -> &'static str {
    "Handled GET /"
}

async fn handle_home() -> &'static str {
    "Handled GET /home"
}

async fn handle_login() -> &'static str {
    "Handled GET /login"
}

async fn handle_dashboard() -> &'static str {
    "Handled GET /dashboard"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let require_session = RequireSession::<axum::body::Body>::new(AccessGate::default());

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/home", get(handle_home))
        .route("/login", get(handle_login))
        .route("/dashboard", get(handle_dashboard))
        .layer(ValidateRequestHeaderLayer::custom(require_session))
        .layer(middleware::from_fn(attach_session));

    println!("Press Ctrl+C to exit");
    println!("Try: curl -i http://127.0.0.1:8080/dashboard");
    println!("Then: curl -i -H 'x-demo-session: 1' http://127.0.0.1:8080/login");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .unwrap();
    axum::serve(listener, app).await.unwrap();
}
