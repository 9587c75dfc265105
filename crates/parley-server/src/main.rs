use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::auth::{self, AppState, AppStateInner};
use parley_api::middleware::{rate_limit, require_auth, RateLimiter};
use parley_api::{export, messages, users};
use parley_gateway::registry::Registry;
use parley_gateway::router::Router as DeliveryRouter;
use parley_gateway::session;
use parley_types::api::Claims;

#[derive(Clone)]
struct GatewayState {
    registry: Registry,
    router: DeliveryRouter,
}

/// Per-crate directives: env-filter prefix matching stops at `::`, so the
/// bin target alone would leave the library crates silent.
const DEFAULT_LOG_DIRECTIVES: &str =
    "parley=debug,parley_server=debug,parley_gateway=debug,parley_api=debug,parley_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_DIRECTIVES.into()),
        )
        .init();

    // Config. The signing secret has no default on purpose.
    let jwt_secret = std::env::var("PARLEY_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("PARLEY_JWT_SECRET must be set"))?;
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(parley_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = Registry::new();
    let delivery_router = DeliveryRouter::new(db.clone(), registry.clone());
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        router: delivery_router.clone(),
    });

    // 50-token burst, refilled at 60/s, applied to everything
    let limiter = RateLimiter::new(60.0, 50.0);

    // Routes
    let public_routes = Router::new()
        .route("/users/register", post(auth::register))
        .route("/users/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me/contacts", get(users::contacts))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/messages", post(messages::send_message))
        .route(
            "/messages/{sender_id}/{recipient_id}",
            get(messages::get_messages_between),
        )
        .route(
            "/export/messages/{sender_id}/{recipient_id}",
            get(export::export_messages),
        )
        .route("/validate-token", get(auth::validate_token))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ))
        .with_state(GatewayState {
            registry,
            router: delivery_router,
        });

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<GatewayState>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state.registry, state.router, claims.sub))
}
