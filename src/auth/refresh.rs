// Token refresh exchange

use reqwest::Client;

use super::types::{token_prefix, RefreshFailure, TokenData, TokenEndpoint, TokenResponse};

/// Run a single `grant_type=refresh_token` exchange
///
/// Touches no shared state; the coordinator decides what to do with the result.
pub async fn exchange_refresh_token(
    client: &Client,
    endpoint: &TokenEndpoint,
    refresh_token: &str,
) -> Result<TokenData, RefreshFailure> {
    tracing::info!("Attempting to refresh access token...");

    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    if let Some((client_id, client_secret)) = endpoint.client_credentials() {
        form.push(("client_id", client_id));
        form.push(("client_secret", client_secret));
    }

    tracing::debug!(
        url = %endpoint.url,
        refresh_token = %token_prefix(refresh_token),
        with_client_credentials = endpoint.client_credentials().is_some(),
        "Token refresh request"
    );

    let response = client
        .post(&endpoint.url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            let kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection_failed"
            } else {
                "request_error"
            };
            tracing::error!(error_kind = kind, error = %e, "Token refresh request failed");
            RefreshFailure::Network(format!("{} ({})", e, kind))
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "Error refreshing access token"
        );

        // OAuth error bodies carry a code and description worth surfacing
        if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(&error_text) {
            if let Some(error_code) = error_json.get("error").and_then(|v| v.as_str()) {
                tracing::error!(
                    error = error_code,
                    description = error_json
                        .get("error_description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default(),
                    "Token endpoint error details"
                );
            }
        }

        if status.is_client_error() {
            tracing::error!(
                "Refresh token might be invalid or expired. Manual intervention may be required."
            );
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
                body: error_text,
            });
        }

        return Err(RefreshFailure::Upstream {
            status: status.as_u16(),
            body: error_text,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| RefreshFailure::Network(format!("failed to read token response: {}", e)))?;
    let data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        RefreshFailure::MalformedResponse(format!("failed to parse token response: {}", e))
    })?;

    let access_token = match data.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(RefreshFailure::MalformedResponse(
                "New access token not found in refresh response".to_string(),
            ))
        }
    };

    // An empty refresh_token is the same as an absent one
    let refresh_token = data.refresh_token.filter(|t| !t.is_empty());

    tracing::info!(
        rotated = refresh_token.is_some(),
        expires_in = data.expires_in,
        "Access token refreshed successfully."
    );
    if refresh_token.is_none() {
        tracing::warn!(
            "New refresh token was not provided in the response. Old refresh token will be reused."
        );
    }

    Ok(TokenData {
        access_token,
        refresh_token,
    })
}
