//! Gateway configuration
//!
//! Loaded from environment variables with development defaults. Nothing in
//! the pipeline hardcodes a limit, a TTL or a threshold; everything flows
//! from here.
//!
//! Environment variables:
//! - `STOCKGATE_BIND`: bind host (default `0.0.0.0`)
//! - `PORT` / `STOCKGATE_PORT`: listen port (default `3000`)
//! - `STOCKGATE_REDIS_URL`: shared store URL (default `redis://localhost:6379`)
//! - `STOCKGATE_INVENTORY_URL`: backend base URL (default `http://localhost:8000`)
//! - `STOCKGATE_BACKEND_TIMEOUT_MS`: proxy request timeout (default `5000`)
//! - `STOCKGATE_CACHE_TTL_SECS`: cache entry TTL (default `30`)
//! - `STOCKGATE_BROAD_WINDOW_SECS` / `STOCKGATE_BROAD_MAX_REQUESTS`:
//!   broad fixed window (defaults `900` / `100`)
//! - `STOCKGATE_STOCK_WINDOW_SECS` / `STOCKGATE_STOCK_MAX_REQUESTS`:
//!   stock-query fixed window (defaults `60` / `50`)
//! - `STOCKGATE_SLA_WARNING_MS` / `STOCKGATE_SLA_VIOLATION_MS`:
//!   latency thresholds (defaults `2000` / `3000`)
//! - `STOCKGATE_ENVIRONMENT`: audit environment tag (default `development`)
//! - `STOCKGATE_API_TOKENS`: comma-separated
//!   `token:username:role[:name[:department]]` entries for the static
//!   identity verifier

use std::time::Duration;

use stockgate_core::{Principal, Role, SlaThresholds};

/// One static token entry for the shipped identity verifier.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub token: String,
    pub principal: Principal,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_host: String,
    pub port: u16,
    pub redis_url: String,

    // ========================================================================
    // Backend proxy
    // ========================================================================
    /// Inventory backend base URL.
    pub inventory_url: String,
    /// Fixed proxy timeout. Deliberately shorter than the SLA violation
    /// threshold so a stuck backend cannot blow the latency budget.
    pub backend_timeout: Duration,

    // ========================================================================
    // Cache
    // ========================================================================
    /// Short relative to inventory volatility.
    pub cache_ttl_secs: u64,

    // ========================================================================
    // Rate limiting
    // ========================================================================
    pub broad_window: Duration,
    pub broad_max_requests: i64,
    pub stock_window: Duration,
    pub stock_max_requests: i64,

    // ========================================================================
    // SLA
    // ========================================================================
    pub sla_warning_ms: u64,
    pub sla_violation_ms: u64,

    /// Environment tag stamped on audit events.
    pub environment: String,

    pub api_tokens: Vec<ApiToken>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            redis_url: "redis://localhost:6379".to_string(),
            inventory_url: "http://localhost:8000".to_string(),
            backend_timeout: Duration::from_millis(5000),
            cache_ttl_secs: 30,
            broad_window: Duration::from_secs(900),
            broad_max_requests: 100,
            stock_window: Duration::from_secs(60),
            stock_max_requests: 50,
            sla_warning_ms: 2000,
            sla_violation_ms: 3000,
            environment: "development".to_string(),
            api_tokens: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl GatewayConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("STOCKGATE_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let api_tokens = std::env::var("STOCKGATE_API_TOKENS")
            .ok()
            .map(|s| parse_api_tokens(&s))
            .unwrap_or_default();

        Self {
            bind_host: std::env::var("STOCKGATE_BIND").unwrap_or(defaults.bind_host),
            port,
            redis_url: std::env::var("STOCKGATE_REDIS_URL").unwrap_or(defaults.redis_url),
            inventory_url: std::env::var("STOCKGATE_INVENTORY_URL")
                .unwrap_or(defaults.inventory_url),
            backend_timeout: Duration::from_millis(env_parse(
                "STOCKGATE_BACKEND_TIMEOUT_MS",
                defaults.backend_timeout.as_millis() as u64,
            )),
            cache_ttl_secs: env_parse("STOCKGATE_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            broad_window: Duration::from_secs(env_parse(
                "STOCKGATE_BROAD_WINDOW_SECS",
                defaults.broad_window.as_secs(),
            )),
            broad_max_requests: env_parse(
                "STOCKGATE_BROAD_MAX_REQUESTS",
                defaults.broad_max_requests,
            ),
            stock_window: Duration::from_secs(env_parse(
                "STOCKGATE_STOCK_WINDOW_SECS",
                defaults.stock_window.as_secs(),
            )),
            stock_max_requests: env_parse(
                "STOCKGATE_STOCK_MAX_REQUESTS",
                defaults.stock_max_requests,
            ),
            sla_warning_ms: env_parse("STOCKGATE_SLA_WARNING_MS", defaults.sla_warning_ms),
            sla_violation_ms: env_parse("STOCKGATE_SLA_VIOLATION_MS", defaults.sla_violation_ms),
            environment: std::env::var("STOCKGATE_ENVIRONMENT").unwrap_or(defaults.environment),
            api_tokens,
        }
    }

    pub fn sla_thresholds(&self) -> SlaThresholds {
        SlaThresholds {
            warning_ms: self.sla_warning_ms,
            violation_ms: self.sla_violation_ms,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// Parse `token:username:role[:name[:department]]` entries; malformed
/// entries are skipped with a warning rather than aborting startup.
fn parse_api_tokens(raw: &str) -> Vec<ApiToken> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.trim().split(':').collect();
            if parts.len() < 3 {
                tracing::warn!(entry, "Skipping malformed API token entry");
                return None;
            }
            let role = match parts[2] {
                "admin" => Role::Admin,
                "user" => Role::User,
                "viewer" => Role::Viewer,
                other => {
                    tracing::warn!(role = other, "Skipping API token entry with unknown role");
                    return None;
                }
            };
            let name = parts.get(3).copied().unwrap_or(parts[1]);
            let department = parts.get(4).copied().unwrap_or("");
            Some(ApiToken {
                token: parts[0].to_string(),
                principal: Principal::new(parts[1], role, name, department),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stated_objectives() {
        let config = GatewayConfig::default();
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.stock_max_requests, 50);
        assert_eq!(config.stock_window.as_secs(), 60);
        assert_eq!(config.broad_max_requests, 100);
        assert_eq!(config.broad_window.as_secs(), 900);
        assert_eq!(config.sla_thresholds(), SlaThresholds::default());
        assert!(config.backend_timeout.as_millis() < config.sla_violation_ms as u128);
    }

    #[test]
    fn test_parse_api_tokens() {
        let tokens =
            parse_api_tokens("t1:admin:admin:System Admin:IT, t2:logistica:user, bogus, t3:x:wizard");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token, "t1");
        assert_eq!(tokens[0].principal.role, Role::Admin);
        assert_eq!(tokens[0].principal.name, "System Admin");
        assert_eq!(tokens[0].principal.department, "IT");
        assert_eq!(tokens[1].principal.username, "logistica");
        assert_eq!(tokens[1].principal.name, "logistica");
    }

    #[test]
    fn test_bind_addr() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }
}
