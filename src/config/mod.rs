//! Configuration for the provisioning core, loaded from the environment.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,
    pub database: DatabaseConfig,
    pub scim: ScimConfig,
    pub telemetry: TelemetryConfig,
    pub signing: SigningConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Which pluggable `EventProcessor` implementation drives delivery. Only
/// `Scheduled` is implemented here; the others are recognized so operators can
/// select them once a broker-backed processor exists, but selecting one that
/// isn't implemented is a startup error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Scheduled,
    Cdi,
    Kafka,
    Amqp,
}

impl ProcessorKind {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "cdi" => Ok(Self::Cdi),
            "kafka" => Ok(Self::Kafka),
            "amqp" => Ok(Self::Amqp),
            other => anyhow::bail!("unknown scim.processor value: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScimConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub token_lifetime: Duration,
    pub processor: ProcessorKind,
    pub http_timeout: Duration,
    /// Batch size passed to `ClaimDue` on every poller tick.
    pub claim_batch_size: u32,
    /// How long an `IN_PROGRESS` delivery may sit before the poller reclaims it.
    pub reclaim_staleness: Duration,
    /// How long the scheduler waits for in-flight workers to finish on shutdown.
    pub drain_timeout: Duration,
}

impl Default for ScimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(5),
            token_lifetime: Duration::from_secs(3600),
            processor: ProcessorKind::Scheduled,
            http_timeout: Duration::from_secs(30),
            claim_batch_size: 100,
            reclaim_staleness: Duration::from_secs(300),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Ambient structured-logging/metrics/tracing configuration, independent of
/// whatever transport or container setup the operator chooses.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_format: String,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
}

/// Stand-in for the tenant signing-key store the real issuer owns. The core
/// only needs *a* key to mint bearer tokens with; key rotation and JWKS
/// publication belong to the authorization server.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub hmac_secret: String,
    pub kid: String,
    /// Base issuer URL; a tenant's `iss` claim is `{issuer_base_url}/t/{tenant_id}`.
    pub issuer_base_url: String,
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            scim: {
                let defaults = ScimConfig::default();
                ScimConfig {
                    enabled: env::var("SCIM_ENABLED")
                        .map(|s| s.to_lowercase() != "false")
                        .unwrap_or(defaults.enabled),
                    poll_interval: env_duration_secs("SCIM_POLL_INTERVAL_SECS", defaults.poll_interval),
                    token_lifetime: env_duration_secs(
                        "SCIM_TOKEN_LIFETIME_SECS",
                        defaults.token_lifetime,
                    ),
                    processor: env::var("SCIM_PROCESSOR")
                        .ok()
                        .map(|s| ProcessorKind::parse(&s))
                        .transpose()?
                        .unwrap_or(defaults.processor),
                    http_timeout: env_duration_secs("SCIM_HTTP_TIMEOUT_SECS", defaults.http_timeout),
                    claim_batch_size: env::var("SCIM_CLAIM_BATCH_SIZE")
                        .unwrap_or_else(|_| "100".to_string())
                        .parse()
                        .unwrap_or(defaults.claim_batch_size),
                    reclaim_staleness: env_duration_secs(
                        "SCIM_RECLAIM_STALENESS_SECS",
                        defaults.reclaim_staleness,
                    ),
                    drain_timeout: env_duration_secs("SCIM_DRAIN_TIMEOUT_SECS", defaults.drain_timeout),
                }
            },
            telemetry: TelemetryConfig {
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "scim-provisioning-core".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                tracing_enabled: env::var("OTEL_TRACING_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            },
            signing: SigningConfig {
                hmac_secret: env::var("SCIM_SIGNING_SECRET")
                    .context("SCIM_SIGNING_SECRET is required")?,
                kid: env::var("SCIM_SIGNING_KID").unwrap_or_else(|_| "default".to_string()),
                issuer_base_url: env::var("SCIM_ISSUER_BASE_URL")
                    .unwrap_or_else(|_| "https://auth.internal".to_string()),
            },
        })
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
