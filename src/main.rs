use std::sync::Arc;

use kicker_auth_intra::IntraIdentityProvider;
use kicker_persistence_sqlite::{
    SqliteMatchRepository, SqlitePlayerRepository, create_db_pool, init_schema,
};
use kicker_server_domain::{
    app::construct_app, auth::ArcIdentityProvider, matches::ArcMatchRepository,
    player::ArcPlayerRepository,
};
use log::info;

mod logs;

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received. Preparing graceful exit...");
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logs::init_logger();

    let pool = create_db_pool().await;
    init_schema(&pool)
        .await
        .expect("Failed to initialize database schema");
    info!("Database connected and schema initialized");

    let player_repository: ArcPlayerRepository =
        Arc::new(Box::new(SqlitePlayerRepository::new(pool.clone())));
    let match_repository: ArcMatchRepository =
        Arc::new(Box::new(SqliteMatchRepository::new(pool)));
    let identity_provider: ArcIdentityProvider =
        Arc::new(Box::new(IntraIdentityProvider::new()));

    let app = construct_app(player_repository, match_repository, identity_provider);

    info!("Starting application");
    kicker_server_api::run(app, shutdown_signal()).await;
}
