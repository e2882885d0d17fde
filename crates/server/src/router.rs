use super::{handlers, state::AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        // Pages and sign-in
        .route("/", get(handlers::login_page))
        .route("/login", get(handlers::login_page))
        .route("/loginerr", get(handlers::login_error_page))
        .route("/logout", get(handlers::logout))
        .route("/dashboard", get(handlers::dashboard))
        .route("/auth/microsoft", get(handlers::login_microsoft))
        .route(
            "/auth/microsoft/callback",
            get(handlers::microsoft_callback),
        )
        .route("/chat", get(handlers::chat_page))
        .route("/health", get(handlers::health_check))
        // JSON API
        .route("/api/settings", get(handlers::settings_handler))
        .route("/api/me", get(handlers::me_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route(
            "/api/conversation/new",
            post(handlers::new_conversation_handler),
        )
        .route(
            "/api/conversations",
            get(handlers::list_conversations_handler),
        )
        .route(
            "/api/conversation/{id}/resolve",
            post(handlers::resolve_conversation_handler),
        )
        .route(
            "/api/conversation/{id}/history",
            get(handlers::conversation_history_handler),
        )
        // Documents
        .route(
            "/download/view/{*blob}",
            get(handlers::view_document_handler),
        )
        .route(
            "/download/file/{*blob}",
            get(handlers::download_file_handler),
        )
        .route(
            "/download/stream/{*blob}",
            get(handlers::stream_document_handler),
        )
        .route("/stream/jsonl", post(handlers::stream_jsonl_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
