//! HTTP surface of the messaging core.
//!
//! All routes live under `/api`, mirroring the base URL the web client is
//! configured with:
//!
//! | Method & Path | Purpose |
//! |---|---|
//! | GET `/api/conversations/:email` | conversations of a user, newest first |
//! | POST `/api/conversations` | find or create the conversation for a pair |
//! | GET `/api/messages/:conversation_id` | messages of a conversation, oldest first |
//! | POST `/api/messages/:conversation_id` | append a message |
//! | GET `/api/user/email/:email` | directory lookup by email |
//! | GET `/api/user/:id` | directory lookup by id |
//! | GET `/api/health` | liveness |
//!
//! Errors are returned as `{ "error": "..." }` with a 4xx/5xx status.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use config::Config;
use error::ServerError;
use routes::{
    append_message_handler, create_conversation_handler, health_handler,
    list_conversations_handler, list_messages_handler, user_by_email_handler,
    user_by_id_handler,
};
use state::State;

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/conversations", post(create_conversation_handler))
        .route("/conversations/:email", get(list_conversations_handler))
        .route(
            "/messages/:conversation_id",
            get(list_messages_handler).post(append_message_handler),
        )
        .route("/user/email/:email", get(user_by_email_handler))
        .route("/user/:id", get(user_by_id_handler));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!("Initializing state...");
    let state = State::new(config)?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{address}/api");
    info!("Database at {}", state.config.database_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
