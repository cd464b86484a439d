use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::pipeline::PullRequestEvent;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: Option<String>,
    pub repository: Option<Repository>,
    pub pull_request: Option<PullRequest>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub title: Option<String>,
    pub user: Option<User>,
    pub state: Option<String>,
    pub html_url: Option<String>,
    pub diff_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct User {
    pub login: String,
}

#[derive(Serialize)]
pub struct WebhookResponse {
    pub message: String,
}

type HmacSha256 = Hmac<Sha256>;

fn verify_github_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if !signature.starts_with("sha256=") {
        return false;
    }

    let signature_hex = &signature[7..];

    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    mac.update(payload);

    // Constant-time verification
    mac.verify_slice(&signature_bytes).is_ok()
}

async fn verify_webhook_signature(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // No configured secret means deliveries are accepted unverified.
    let Some(secret) = &state.webhook_secret else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get("x-hub-signature-256")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_github_signature(secret, &bytes, signature) {
        error!("Invalid webhook signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

/// Extract a processable pull-request event from a delivery, or `None`
/// for anything that should be acknowledged as a no-op.
fn extract_event(github_event: Option<&str>, payload: &WebhookPayload) -> Option<PullRequestEvent> {
    if github_event != Some("pull_request") {
        return None;
    }

    let repo_name = payload.repository.as_ref()?.full_name.clone()?;
    let pr = payload.pull_request.as_ref()?;

    Some(PullRequestEvent {
        repo_name,
        pr_number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        author: pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_default(),
        state: pr.state.clone().unwrap_or_else(|| "open".to_string()),
        html_url: pr.html_url.clone().unwrap_or_default(),
        diff_url: pr.diff_url.clone().unwrap_or_default(),
    })
}

pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WebhookResponse>, StatusCode> {
    let delivery_id = Uuid::new_v4();

    let github_event = request
        .headers()
        .get("x-github-event")
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let payload: WebhookPayload =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    info!(
        "Received webhook delivery {} (event: {:?}, action: {:?})",
        delivery_id,
        github_event.as_deref(),
        payload.action.as_deref()
    );

    let Some(event) = extract_event(github_event.as_deref(), &payload) else {
        return Ok(Json(WebhookResponse {
            message: "ignored".to_string(),
        }));
    };

    info!(
        "Delivery {}: PR #{} in {} by {}",
        delivery_id, event.pr_number, event.repo_name, event.author
    );

    // Acknowledge immediately; the pipeline runs to completion in the
    // background. Callers must not assume the analysis is done when
    // the 200 comes back.
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        match pipeline.process(&event).await {
            Ok(outcome) => {
                info!(
                    "Delivery {}: pipeline finished for PR #{} ({:?})",
                    delivery_id, event.pr_number, outcome
                );
            }
            Err(e) => {
                warn!(
                    "Delivery {}: pipeline failed for PR #{}: {}",
                    delivery_id, event.pr_number, e
                );
            }
        }
    });

    Ok(Json(WebhookResponse {
        message: "accepted".to_string(),
    }))
}

pub fn webhook_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/github", post(github_webhook_handler))
        .layer(middleware::from_fn_with_state(
            state,
            verify_webhook_signature,
        ))
}
