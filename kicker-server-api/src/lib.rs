use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use kicker_server_domain::{ServiceError, app::AppState, player::Player};
use log::info;
use tower_http::cors::{AllowOrigin, CorsLayer};

mod leaderboard;
mod matches;
mod players;

const DEFAULT_HTTP_PORT: &str = "8081";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

pub async fn run(
    app: AppState,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) {
    let router = Router::new()
        .route("/api/profile", get(players::get_profile))
        .route("/api/players/search", get(players::search_players))
        .route("/api/players/{login}/stats", get(players::get_player_stats))
        .route("/api/matches/submit", post(matches::submit_match))
        .route("/api/matches/{id}/confirm", put(matches::confirm_match))
        .route("/api/matches/pending", get(matches::get_pending_matches))
        .route("/api/matches/history", get(matches::get_match_history))
        .route("/api/leaderboard", get(leaderboard::get_leaderboard))
        .route("/health", get(health))
        .layer(cors_layer());

    let port = std::env::var("KICKER_HTTP_PORT")
        .unwrap_or_else(|_| DEFAULT_HTTP_PORT.to_string())
        .parse::<u16>()
        .expect("KICKER_HTTP_PORT must be a valid u16");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .unwrap();

    info!("HTTP API listening on port {}", port);
    axum::serve(listener, router.with_state(app))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .unwrap();

    info!("HTTP API shut down gracefully");
}

fn cors_layer() -> CorsLayer {
    let origins = std::env::var("KICKER_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());
    let origins: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

pub struct ApiError(ServiceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::http::Response<axum::body::Body> {
        let (status, msg) = match self.0 {
            ServiceError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            ServiceError::Unauthorized(msg) => (axum::http::StatusCode::UNAUTHORIZED, msg),
            ServiceError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            ServiceError::Forbidden(msg) => (axum::http::StatusCode::FORBIDDEN, msg),
            ServiceError::Conflict(msg) => (axum::http::StatusCode::CONFLICT, msg),
            ServiceError::Internal(msg) => {
                (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = serde_json::json!({ "error": msg });
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError(value)
    }
}

pub(crate) type BearerAuth = Option<TypedHeader<Authorization<Bearer>>>;

pub(crate) async fn authenticate(app: &AppState, auth: BearerAuth) -> Result<Player, ApiError> {
    let Some(TypedHeader(bearer)) = auth else {
        return Err(ApiError(ServiceError::Unauthorized(
            "Authorization header required".to_string(),
        )));
    };
    Ok(app.player_service.resolve_token(bearer.token()).await?)
}
