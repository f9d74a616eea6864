//! HTTP gateway for rollcall.
//!
//! Serves the liveness and health endpoints and, in Telegram webhook mode,
//! receives Bot API updates at `POST /telegram` and hands them to the running
//! [`TelegramChannel`].
//!
//! Built on Axum.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use rollcall_channels::telegram::{TelegramChannel, Update};
use rollcall_core::error::ChannelError;
use rollcall_session::SessionController;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Header Telegram sets to the `secret_token` given to `setWebhook`.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub controller: Arc<SessionController>,
    pub telegram: Option<Arc<TelegramChannel>>,
    pub webhook_secret: Option<String>,
}

impl GatewayState {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            telegram: None,
            webhook_secret: None,
        }
    }

    /// Route webhook updates to `channel`, checking `secret` when set.
    pub fn with_telegram(mut self, channel: Arc<TelegramChannel>, secret: Option<String>) -> Self {
        self.telegram = Some(channel);
        self.webhook_secret = secret;
        self
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(alive_handler))
        .route("/health", get(health_handler))
        .route("/telegram", post(telegram_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port` and serve until the task is cancelled.
pub async fn serve(host: &str, port: u16, state: GatewayState) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let app = build_router(Arc::new(state));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

// --- Handlers ---

#[derive(Serialize)]
struct AliveResponse {
    status: &'static str,
}

async fn alive_handler() -> Json<AliveResponse> {
    Json(AliveResponse { status: "alive" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_sessions: usize,
    telegram_webhook: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.controller.session_count().await,
        telegram_webhook: state.telegram.is_some(),
    })
}

async fn telegram_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = state.webhook_secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Rejected Telegram webhook call with a bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let Some(channel) = state.telegram.as_ref() else {
        warn!("Telegram webhook called but no Telegram channel is configured");
        return StatusCode::NOT_FOUND;
    };

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed Telegram update");
            return StatusCode::BAD_REQUEST;
        }
    };
    debug!(update_id = update.update_id, "Telegram update received");

    match channel.inject_update(update).await {
        Ok(()) => StatusCode::OK,
        Err(ChannelError::ConnectionLost(reason)) => {
            warn!(reason = %reason, "Telegram channel is not running");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            warn!(error = %e, "Failed to accept Telegram update");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rollcall_channels::TelegramConfig;
    use rollcall_core::channel::{Channel, InboundKind};
    use rollcall_storage::{InMemoryArchive, InMemoryRosterStore};
    use tower::ServiceExt;

    fn controller() -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::new(InMemoryRosterStore::unreadable("not needed")),
            Arc::new(InMemoryArchive::new()),
        ))
    }

    /// A Bot API stand-in that accepts every call.
    async fn fake_bot_api() -> String {
        async fn handle(Path(_method): Path<String>) -> Json<serde_json::Value> {
            Json(serde_json::json!({ "ok": true, "result": true }))
        }
        let app = Router::new().route("/botgw-token/{method}", post(handle));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn telegram(api_base: &str) -> Arc<TelegramChannel> {
        Arc::new(TelegramChannel::new(TelegramConfig {
            bot_token: "gw-token".into(),
            allowed_users: vec!["*".into()],
            use_webhook: true,
            public_url: Some("https://rollcall.example.com".into()),
            webhook_secret: Some("s3cret".into()),
            api_base: api_base.into(),
            poll_timeout_secs: 1,
        }))
    }

    fn update_body() -> String {
        serde_json::json!({
            "update_id": 77,
            "message": {
                "message_id": 1,
                "from": { "id": 42, "first_name": "Amy" },
                "chat": { "id": 42 },
                "text": "1, 3"
            }
        })
        .to_string()
    }

    fn post_update(body: String, secret: Option<&str>) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/telegram")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            req = req.header(SECRET_HEADER, secret);
        }
        req.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn root_reports_alive() {
        let app = build_router(Arc::new(GatewayState::new(controller())));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"status":"alive"}"#);
    }

    #[tokio::test]
    async fn health_counts_sessions() {
        let app = build_router(Arc::new(GatewayState::new(controller())));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_sessions"], 0);
        assert_eq!(json["telegram_webhook"], false);
    }

    #[tokio::test]
    async fn webhook_without_telegram_is_not_found() {
        let app = build_router(Arc::new(GatewayState::new(controller())));
        let response = app.oneshot(post_update(update_body(), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhook_checks_secret_token() {
        let base = fake_bot_api().await;
        let channel = telegram(&base);
        let state = Arc::new(
            GatewayState::new(controller()).with_telegram(channel.clone(), Some("s3cret".into())),
        );

        let response = build_router(state.clone())
            .oneshot(post_update(update_body(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = build_router(state)
            .oneshot(post_update(update_body(), Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn webhook_before_start_is_server_error() {
        let base = fake_bot_api().await;
        let state = Arc::new(GatewayState::new(controller()).with_telegram(telegram(&base), None));
        let response = build_router(state)
            .oneshot(post_update(update_body(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn webhook_rejects_malformed_update() {
        let base = fake_bot_api().await;
        let state = Arc::new(GatewayState::new(controller()).with_telegram(telegram(&base), None));
        let response = build_router(state)
            .oneshot(post_update("{not json".into(), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_update_reaches_the_channel() {
        let base = fake_bot_api().await;
        let channel = telegram(&base);
        let mut rx = channel.start().await.unwrap();
        let state = Arc::new(
            GatewayState::new(controller()).with_telegram(channel.clone(), Some("s3cret".into())),
        );

        let response = build_router(state)
            .oneshot(post_update(update_body(), Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let msg = rx.recv().await.unwrap().unwrap();
        assert_eq!(msg.requester().as_str(), "telegram:42");
        assert_eq!(msg.kind, InboundKind::Text { text: "1, 3".into() });
        channel.stop().await.unwrap();
    }
}
