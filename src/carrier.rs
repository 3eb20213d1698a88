// MyCarrierPortal carrier lookup

use std::sync::Arc;
use thiserror::Error;

use crate::http_client::{self, CallError, ResilientHttpClient, UpstreamError};
use crate::models::carrier::Carrier;
use crate::models::slack::CarrierQuery;

const PREVIEW_PATH: &str = "/api/v1/Carrier/PreviewCarrier";

#[derive(Debug, Error)]
pub enum CarrierError {
    /// Empty result array
    #[error("no data returned for carrier")]
    NotFound,

    #[error(transparent)]
    Call(#[from] CallError),
}

impl CarrierError {
    /// Canned text for the Slack user; never includes upstream bodies
    pub fn user_message(&self) -> &'static str {
        match self {
            CarrierError::NotFound => "No data found for the provided MC number.",
            CarrierError::Call(CallError::AuthExhausted) => {
                "Authentication failed even after attempting to refresh. Please contact an administrator."
            }
            CarrierError::Call(CallError::RefreshFailed(_)) => {
                "Error: Could not refresh authentication. Please check logs or contact admin."
            }
            CarrierError::Call(CallError::Upstream(_)) => {
                "Error fetching data. Please try again later."
            }
        }
    }
}

/// Client for the carrier preview endpoint
pub struct CarrierClient {
    http: Arc<ResilientHttpClient>,
    base_url: String,
}

impl CarrierClient {
    pub fn new(http: Arc<ResilientHttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn preview_url(&self) -> String {
        format!("{}{}", self.base_url, PREVIEW_PATH)
    }

    /// Look up one carrier by MC (docket) number, optionally narrowed by DOT number
    pub async fn preview_carrier(&self, query: &CarrierQuery) -> Result<Carrier, CarrierError> {
        let url = self.preview_url();
        let mut params = vec![("docketNumber", query.mc_number.as_str())];
        if let Some(dot) = query.dot_number.as_deref() {
            params.push(("DOTNumber", dot));
        }

        tracing::info!(mc_number = %query.mc_number, "Fetching data for MC number");

        let carriers = self
            .http
            .call_with_auth(|token| {
                let request = self
                    .http
                    .client()
                    .post(&url)
                    .query(&params)
                    .bearer_auth(token)
                    .header("Content-Type", "application/json");
                async move {
                    let response = http_client::send(request).await?;
                    response
                        .json::<Vec<Carrier>>()
                        .await
                        .map_err(|e| UpstreamError::Decode(e.to_string()))
                }
            })
            .await?;

        match carriers.into_iter().next() {
            Some(carrier) => {
                tracing::info!(mc_number = %query.mc_number, "Data received for MC number");
                Ok(carrier)
            }
            None => {
                tracing::info!(mc_number = %query.mc_number, "No data found for MC number");
                Err(CarrierError::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthManager, AuthSettings, CredentialPair, TokenEndpoint};
    use mockito::Matcher;
    use std::time::Duration;

    fn carrier_client(server: &mockito::ServerGuard) -> CarrierClient {
        let settings = AuthSettings {
            seed_bearer_token: "A1".to_string(),
            seed_refresh_token: "R1".to_string(),
            endpoint: TokenEndpoint::new(format!("{}/token", server.url())),
            token_timeout: Duration::from_secs(5),
        };
        let auth = AuthManager::new(&settings, CredentialPair::new("A1", "R1"), None).unwrap();
        let http = ResilientHttpClient::new(Arc::new(auth), 5, 10).unwrap();
        CarrierClient::new(Arc::new(http), format!("{}/", server.url()))
    }

    fn query(mc: &str) -> CarrierQuery {
        CarrierQuery {
            mc_number: mc.to_string(),
            dot_number: None,
        }
    }

    #[tokio::test]
    async fn test_preview_carrier_returns_first_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::UrlEncoded("docketNumber".into(), "123456".into()))
            .match_header("authorization", "Bearer A1")
            .with_status(200)
            .with_body(r#"[{"CompanyName":"ACME"},{"CompanyName":"OTHER"}]"#)
            .create_async()
            .await;

        let carrier = carrier_client(&server)
            .preview_carrier(&query("123456"))
            .await
            .unwrap();
        assert_eq!(carrier.company_name.as_deref(), Some("ACME"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_preview_carrier_sends_dot_number() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("docketNumber".into(), "123456".into()),
                Matcher::UrlEncoded("DOTNumber".into(), "7654321".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"CompanyName":"ACME"}]"#)
            .create_async()
            .await;

        let q = CarrierQuery {
            mc_number: "123456".to_string(),
            dot_number: Some("7654321".to_string()),
        };
        carrier_client(&server).preview_carrier(&q).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_array_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = carrier_client(&server)
            .preview_carrier(&query("000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, CarrierError::NotFound));
        assert_eq!(err.user_message(), "No data found for the provided MC number.");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let mut server = mockito::Server::new_async().await;
        let expired = server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer A1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A2","refresh_token":"R2"}"#)
            .expect(1)
            .create_async()
            .await;
        let fresh = server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer A2")
            .with_status(200)
            .with_body(r#"[{"CompanyName":"ACME"}]"#)
            .expect(1)
            .create_async()
            .await;

        let carrier = carrier_client(&server)
            .preview_carrier(&query("123456"))
            .await
            .unwrap();
        assert_eq!(carrier.company_name.as_deref(), Some("ACME"));

        expired.assert_async().await;
        token.assert_async().await;
        fresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_gets_generic_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PREVIEW_PATH)
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = carrier_client(&server)
            .preview_carrier(&query("123456"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Error fetching data. Please try again later.");
    }

    #[test]
    fn test_user_messages_for_auth_failures() {
        assert!(CarrierError::Call(CallError::AuthExhausted)
            .user_message()
            .starts_with("Authentication failed"));
        let refresh = CarrierError::Call(CallError::RefreshFailed(
            crate::auth::RefreshFailure::Network("timeout".to_string()),
        ));
        assert!(refresh.user_message().contains("Could not refresh authentication"));
    }
}
