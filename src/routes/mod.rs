use axum::{
    extract::State,
    http::StatusCode,
    middleware::{self as axum_middleware},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{token_prefix, AuthManager, Persistence};
use crate::carrier::CarrierClient;
use crate::config::Config;
use crate::converters::carrier_to_slack::{
    build_carrier_message, DECLINE_ACTION_ID, INVITE_ACTION_ID,
};
use crate::error::ApiError;
use crate::http_client::ResilientHttpClient;
use crate::middleware;
use crate::models::slack::{
    CarrierQuery, InteractionForm, InteractionPayload, SlackMessage, SlashCommand,
};
use crate::slack::SlackResponder;
use crate::store::{run_blocking, AuditAction, AuditEntry};

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const EMPTY_QUERY_MESSAGE: &str = "Please provide a valid MC number.";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub carriers: Arc<CarrierClient>,
    pub responder: Arc<SlackResponder>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the upstream clients around an already bootstrapped auth manager
    pub fn new(config: Arc<Config>, auth_manager: Arc<AuthManager>) -> anyhow::Result<Self> {
        let http_client = Arc::new(ResilientHttpClient::new(
            auth_manager.clone(),
            config.http_connect_timeout,
            config.http_request_timeout,
        )?);
        let carriers = Arc::new(CarrierClient::new(
            http_client,
            config.carrier_api_url.clone(),
        ));
        let responder = Arc::new(SlackResponder::new(
            config.slack_webhook_url.clone(),
            Duration::from_secs(config.slack_response_timeout),
        )?);

        Ok(Self {
            auth_manager,
            carriers,
            responder,
            config,
        })
    }
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// Slack routes (signed requests only)
pub fn slack_routes(state: AppState) -> Router {
    Router::new()
        .route("/slack/commands", post(slash_command_handler))
        .route("/slack/interactions", post(interaction_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::slack_signature_middleware,
        ))
        .with_state(state)
}

/// Diagnostic routes (API key, never in production)
pub fn diagnostic_routes(state: AppState) -> Router {
    Router::new()
        .route("/test/refresh", get(test_refresh_handler))
        .route("/test/token", get(test_token_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::diagnostic_auth_middleware,
        ))
        .with_state(state)
}

/// GET /health
///
/// Does not touch the credential path, so it stays green while the token is bad.
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// POST /slack/commands
///
/// Answers inside Slack's 3 second window with an empty ack; the lookup and
/// delivery run in a background task.
async fn slash_command_handler(
    State(state): State<AppState>,
    Form(command): Form<SlashCommand>,
) -> Response {
    let query = match command.carrier_query() {
        Some(query) => query,
        None => {
            tracing::info!("Received Slack command with no text");
            return EMPTY_QUERY_MESSAGE.into_response();
        }
    };

    tracing::info!(
        user_id = %command.user_id,
        channel_id = %command.channel_id,
        mc_number = %query.mc_number,
        "Slash command received"
    );

    let response_url = command.response_url;
    tokio::spawn(async move {
        lookup_and_deliver(state, query, response_url).await;
    });

    StatusCode::OK.into_response()
}

async fn lookup_and_deliver(state: AppState, query: CarrierQuery, response_url: Option<String>) {
    match state.carriers.preview_carrier(&query).await {
        Ok(carrier) => {
            let message = build_carrier_message(&carrier, &query.mc_number);
            tracing::info!(mc_number = %query.mc_number, "Sending Slack response");
            if let Err(e) = state
                .responder
                .deliver(&message, response_url.as_deref())
                .await
            {
                tracing::error!(mc_number = %query.mc_number, error = %e, "Error sending Slack response");
            }
        }
        Err(err) => {
            tracing::error!(mc_number = %query.mc_number, error = %err, "Carrier lookup failed");
            // Failures go only to the requesting user
            let Some(url) = response_url else {
                tracing::warn!("No response_url to report the failure to");
                return;
            };
            let message = SlackMessage::ephemeral(err.user_message());
            if let Err(e) = state.responder.respond(&url, &message).await {
                tracing::error!(error = %e, "Error sending failure response");
            }
        }
    }
}

/// POST /slack/interactions
///
/// Invite and Decline buttons from the risk assessment message. Acks at once;
/// the audit row and the confirmation are written in the background.
async fn interaction_handler(
    State(state): State<AppState>,
    Form(form): Form<InteractionForm>,
) -> Result<Response, ApiError> {
    let payload: InteractionPayload = serde_json::from_str(&form.payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid interaction payload: {}", e)))?;

    if payload.kind != "block_actions" {
        tracing::debug!(kind = %payload.kind, "Ignoring interaction");
        return Ok(StatusCode::OK.into_response());
    }

    tokio::spawn(async move {
        apply_decisions(state, payload).await;
    });

    Ok(StatusCode::OK.into_response())
}

async fn apply_decisions(state: AppState, payload: InteractionPayload) {
    for action in &payload.actions {
        let audit_action = match action.action_id.as_str() {
            INVITE_ACTION_ID => AuditAction::Invite,
            DECLINE_ACTION_ID => AuditAction::Decline,
            other => {
                tracing::debug!(action_id = %other, "Ignoring unknown action");
                continue;
            }
        };
        let mc_number = action.value.clone().unwrap_or_default();

        record_audit(&state, AuditEntry::new(&payload.user.id, &mc_number, audit_action)).await;

        if let Some(url) = payload.response_url.as_deref() {
            let message = decision_message(&payload.user.id, &mc_number, audit_action);
            if let Err(e) = state.responder.respond(url, &message).await {
                tracing::error!(error = %e, "Error sending interaction confirmation");
            }
        }
    }
}

/// Audit failures never fail the interaction
async fn record_audit(state: &AppState, entry: AuditEntry) {
    let Some(store) = state.auth_manager.store() else {
        tracing::warn!(
            slack_user_id = %entry.actor,
            mc_number = %entry.subject,
            action = %entry.action,
            "No credential store; audit entry not recorded"
        );
        return;
    };

    let logged = entry.clone();
    match run_blocking(store, move |s| s.record_audit(&entry)).await {
        Ok(()) => tracing::info!(
            slack_user_id = %logged.actor,
            mc_number = %logged.subject,
            action = %logged.action,
            "Audit entry logged"
        ),
        Err(e) => tracing::error!(
            slack_user_id = %logged.actor,
            mc_number = %logged.subject,
            action = %logged.action,
            error = %e,
            "Failed to write audit entry"
        ),
    }
}

fn decision_message(user_id: &str, mc_number: &str, action: AuditAction) -> SlackMessage {
    let verb = match action {
        AuditAction::Invite => "invited",
        AuditAction::Decline => "declined",
    };
    let mut message = SlackMessage::ephemeral(format!(
        "<@{}> {} carrier MC {}.",
        user_id, verb, mc_number
    ));
    message.replace_original = Some(false);
    message
}

/// GET /test/refresh
async fn test_refresh_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    tracing::info!("Refresh token test endpoint called");
    let success = state.auth_manager.refresh().await?;

    let persistence = match &success.persistence {
        Persistence::Saved => "saved",
        Persistence::Failed(_) => "failed",
        Persistence::Disabled => "disabled",
    };

    Ok(Json(json!({
        "status": "success",
        "message": "Token refreshed successfully",
        "timestamp": Utc::now().to_rfc3339(),
        "hasNewRefreshToken": success.refresh_token_rotated,
        "persistence": persistence
    })))
}

/// GET /test/token
///
/// Reads the cache only; never triggers a refresh.
async fn test_token_handler(State(state): State<AppState>) -> Json<Value> {
    let credentials = state.auth_manager.credentials();
    Json(json!({
        "status": "success",
        "tokenPrefix": token_prefix(&credentials.bearer_token),
        "updatedAt": credentials.updated_at.to_rfc3339(),
        "durability": state.auth_manager.durability_enabled()
    }))
}
