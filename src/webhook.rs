//! HTTP listener for replies pushed by an inbound mail provider

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use lettre::message::Mailbox;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::constants::{WEBHOOK_PATH, WEBHOOK_TOKEN_HEADER};
use crate::mail::InboundEmail;
use crate::outreach::ReplyResponder;

#[derive(Clone)]
pub struct WebhookState {
    pub responder: Arc<ReplyResponder>,
    /// Required value of the token header, when configured
    pub token: Option<String>,
}

/// Reply notification body
#[derive(Debug, Deserialize)]
struct ReplyPayload {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

type JsonResponse = (StatusCode, Json<Value>);

fn error(status: StatusCode, message: impl Into<String>) -> JsonResponse {
    (
        status,
        Json(json!({ "status": "error", "message": message.into() })),
    )
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(handle_reply))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook on `addr` until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: WebhookState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind webhook listener on {}", addr))?;
    tracing::info!("Webhook listening on http://{}{}", addr, WEBHOOK_PATH);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Webhook server failed")?;

    tracing::info!("Webhook stopped");
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_reply(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    payload: Result<Json<ReplyPayload>, JsonRejection>,
) -> JsonResponse {
    if let Some(ref expected) = state.token {
        let given = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if given != Some(expected.as_str()) {
            tracing::warn!("Rejected webhook call with missing or wrong token");
            return error(StatusCode::UNAUTHORIZED, "invalid webhook token");
        }
    }

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!("Malformed webhook payload: {}", rejection.body_text());
            return error(rejection.status(), rejection.body_text());
        }
    };

    let email = match into_inbound(payload) {
        Ok(email) => email,
        Err(message) => {
            tracing::warn!("Rejected webhook payload: {}", message);
            return error(StatusCode::BAD_REQUEST, message);
        }
    };

    tracing::info!("Webhook reply from {}", email.from_addr);
    match state.responder.handle(&email).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "success" }))),
        Err(e) => {
            tracing::error!("Failed to handle webhook reply from {}: {:#}", email.from_addr, e);
            error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}

fn into_inbound(payload: ReplyPayload) -> Result<InboundEmail, &'static str> {
    let from = payload
        .from
        .map(|from| from.trim().to_string())
        .filter(|from| !from.is_empty())
        .ok_or("missing 'from' field")?;
    if from.parse::<Mailbox>().is_err() {
        return Err("'from' is not an email address");
    }
    let body = payload
        .body
        .filter(|body| !body.trim().is_empty())
        .ok_or("missing 'body' field")?;

    Ok(InboundEmail {
        uid: None,
        message_id: payload.message_id.filter(|id| !id.trim().is_empty()),
        from_addr: from,
        subject: payload.subject.unwrap_or_default(),
        body: body.trim().to_string(),
    })
}
