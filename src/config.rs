use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthSettings, TokenEndpoint};
use crate::store::{CredentialStore, EnvFileStore, SqliteStore};

pub const DEFAULT_CARRIER_API_URL: &str = "https://mycarrierpacketsapi-stage.azurewebsites.net";
const DEFAULT_DB_FILE: &str = "~/.local/share/carrier-relay/credentials.sqlite3";

/// Carrier Relay - MyCarrierPortal lookups from Slack
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Seed bearer token for the carrier API
    #[arg(long, env = "BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Seed refresh token for the carrier API
    #[arg(long, env = "REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// OAuth2 token endpoint
    #[arg(long, env = "TOKEN_ENDPOINT_URL")]
    pub token_endpoint_url: Option<String>,

    /// OAuth2 client id (sent only together with the secret)
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Carrier API base URL
    #[arg(long, env = "CARRIER_API_URL", default_value = DEFAULT_CARRIER_API_URL)]
    pub carrier_api_url: String,

    /// Slack signing secret
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    /// Slack incoming webhook for results
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: Option<String>,

    /// Credential store backend (sqlite, env-file, none)
    #[arg(long, env = "CREDENTIAL_STORE", default_value = "sqlite")]
    pub credential_store: String,

    /// SQLite credential database
    #[arg(long, env = "CREDENTIAL_DB_FILE", default_value = DEFAULT_DB_FILE)]
    pub db_file: String,

    /// Env file used by the env-file backend
    #[arg(long, env = "CREDENTIAL_ENV_FILE", default_value = ".env")]
    pub env_file: String,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "5")]
    pub http_connect_timeout: u64,

    /// Carrier API request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    /// Token endpoint timeout in seconds
    #[arg(long, env = "TOKEN_REQUEST_TIMEOUT", default_value = "10")]
    pub token_timeout: u64,

    /// Slack delivery timeout in seconds
    #[arg(long, env = "SLACK_RESPONSE_TIMEOUT", default_value = "5")]
    pub slack_timeout: u64,

    /// API key for the /test diagnostic routes
    #[arg(long, env = "TEST_API_KEY", hide_env_values = true)]
    pub test_api_key: Option<String>,

    /// Deployment environment (development, production)
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub app_env: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (pretty, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Carrier API credentials
    pub seed_bearer_token: String,
    pub seed_refresh_token: String,
    pub token_endpoint_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub carrier_api_url: String,

    // Slack
    pub slack_signing_secret: String,
    pub slack_webhook_url: Option<String>,

    // Persistence
    pub credential_store: StoreBackend,
    pub credential_db_file: PathBuf,
    pub credential_env_file: PathBuf,

    // Timeouts (seconds)
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub token_request_timeout: u64,
    pub slack_response_timeout: u64,

    // Diagnostics
    pub test_api_key: Option<String>,
    pub app_env: AppEnv,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StoreBackend {
    Sqlite,
    EnvFile,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AppEnv {
    Development,
    Production,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = Self::from_args(CliArgs::parse())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        Ok(Config {
            server_host: args.host,
            server_port: args.port,

            seed_bearer_token: args.bearer_token.unwrap_or_default(),
            seed_refresh_token: args.refresh_token.unwrap_or_default(),
            token_endpoint_url: args.token_endpoint_url.unwrap_or_default(),
            client_id: non_empty(args.client_id),
            client_secret: non_empty(args.client_secret),
            carrier_api_url: args.carrier_api_url,

            slack_signing_secret: args.slack_signing_secret.unwrap_or_default(),
            slack_webhook_url: non_empty(args.slack_webhook_url),

            credential_store: parse_store_backend(&args.credential_store)?,
            credential_db_file: expand_tilde(&args.db_file),
            credential_env_file: expand_tilde(&args.env_file),

            http_connect_timeout: args.http_connect_timeout,
            http_request_timeout: args.http_timeout,
            token_request_timeout: args.token_timeout,
            slack_response_timeout: args.slack_timeout,

            test_api_key: non_empty(args.test_api_key),
            app_env: parse_app_env(&args.app_env),

            log_level: args.log_level,
            log_format: parse_log_format(&args.log_format),
        })
    }

    /// Validate configuration, naming every missing required value at once
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("BEARER_TOKEN", &self.seed_bearer_token),
            ("REFRESH_TOKEN", &self.seed_refresh_token),
            ("TOKEN_ENDPOINT_URL", &self.token_endpoint_url),
            ("SLACK_SIGNING_SECRET", &self.slack_signing_secret),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }

        if self.client_id.is_some() != self.client_secret.is_some() {
            tracing::warn!(
                "Only one of CLIENT_ID / CLIENT_SECRET is set; client credentials will not be sent"
            );
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            seed_bearer_token: self.seed_bearer_token.clone(),
            seed_refresh_token: self.seed_refresh_token.clone(),
            endpoint: TokenEndpoint {
                url: self.token_endpoint_url.clone(),
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
            },
            token_timeout: Duration::from_secs(self.token_request_timeout),
        }
    }

    /// Store selected by `CREDENTIAL_STORE`; `None` disables durability
    pub fn credential_store(&self) -> Option<Arc<dyn CredentialStore>> {
        match self.credential_store {
            StoreBackend::Sqlite => Some(Arc::new(SqliteStore::new(&self.credential_db_file))),
            StoreBackend::EnvFile => Some(Arc::new(EnvFileStore::new(&self.credential_env_file))),
            StoreBackend::None => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_store_backend(s: &str) -> Result<StoreBackend> {
    match s.trim().to_lowercase().as_str() {
        "sqlite" | "" => Ok(StoreBackend::Sqlite),
        "env-file" | "env_file" | "envfile" => Ok(StoreBackend::EnvFile),
        "none" | "off" => Ok(StoreBackend::None),
        other => anyhow::bail!(
            "Unknown CREDENTIAL_STORE '{}' (expected sqlite, env-file or none)",
            other
        ),
    }
}

fn parse_app_env(s: &str) -> AppEnv {
    match s.to_lowercase().as_str() {
        "production" | "prod" => AppEnv::Production,
        _ => AppEnv::Development,
    }
}

fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}
