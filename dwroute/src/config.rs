//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `DWROUTE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `DWROUTE_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `DWROUTE_ROUTING__HEALTH_MIN_SAMPLES=25` sets the `routing.health_min_samples` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Routing**: `routing` - Initial routing policy (window sizes, weight factors, health clamps)
//! - **Pricing**: `group_ratios` - Initial per-group price multipliers
//! - **Stats sync**: `stats_sync` - Periodic pull of route statistics from the telemetry service
//! - **Features**: `enable_metrics`, `enable_otel_export` - Optional feature toggles
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! DWROUTE_PORT=8080
//!
//! # Point the stats sync at the telemetry service
//! DWROUTE_STATS_SYNC__ENABLED=true
//! DWROUTE_STATS_SYNC__URL="http://telemetry:9000/api/"
//! DWROUTE_STATS_SYNC__INTERVAL=30s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use crate::pricing::GroupRatios;
use crate::routing::RoutingPolicy;
use crate::types::DEFAULT_GROUP;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DWROUTE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Routing policy the engine starts with. Can be replaced at runtime through the API.
    pub routing: RoutingPolicy,
    /// Group price multipliers the engine starts with
    pub group_ratios: GroupRatios,
    /// Periodic route statistics pull
    pub stats_sync: StatsSyncConfig,
}

/// Where and how often route statistics are pulled from the telemetry service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsSyncConfig {
    pub enabled: bool,
    /// Base URL of the telemetry service; `route-stats` is resolved against it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub auth_header_name: String,
    pub auth_header_prefix: String,
    /// Time between pulls
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            enable_metrics: true,
            enable_otel_export: false,
            routing: RoutingPolicy::default(),
            group_ratios: [(DEFAULT_GROUP.to_string(), 1.0)].into_iter().collect(),
            stats_sync: StatsSyncConfig::default(),
        }
    }
}

impl Default for StatsSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key: None,
            auth_header_name: "Authorization".to_string(),
            auth_header_prefix: "Bearer ".to_string(),
            interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        self.routing.validate().map_err(|e| Error::Internal {
            operation: format!("Config validation: invalid routing policy: {e}"),
        })?;

        self.group_ratios.validate().map_err(|e| Error::Internal {
            operation: format!("Config validation: {e}"),
        })?;

        if self.stats_sync.enabled {
            if self.stats_sync.url.is_none() {
                return Err(Error::Internal {
                    operation: "Config validation: stats_sync is enabled but stats_sync.url is not configured. \
                     Please set DWROUTE_STATS_SYNC__URL environment variable or add stats_sync.url to config file."
                        .to_string(),
                });
            }
            if self.stats_sync.interval.is_zero() {
                return Err(Error::Internal {
                    operation: "Config validation: stats_sync.interval cannot be 0".to_string(),
                });
            }
            if self.stats_sync.request_timeout.is_zero() {
                return Err(Error::Internal {
                    operation: "Config validation: stats_sync.request_timeout cannot be 0".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values. DWROUTE_CONFIG names the
            // file itself and is not a config key.
            .merge(Env::prefixed("DWROUTE_").ignore(&["config"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::ValueNormalization;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args())?;

            assert_eq!(config.port, 3002);
            assert_eq!(config.routing, RoutingPolicy::default());
            assert_eq!(config.group_ratios.ratio("default"), 1.0);
            assert_eq!(config.group_ratios.len(), 1);
            assert!(!config.stats_sync.enabled);

            Ok(())
        });
    }

    #[test]
    fn test_routing_and_ratios_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
routing:
  usage_window_hours: 48
  value_score_factor: 2.5
  value_normalization: logarithmic
  health_min_samples: 25
group_ratios:
  default: 1.0
  vip: 0.5
stats_sync:
  enabled: true
  url: http://telemetry:9000/api/
  interval: 30s
  request_timeout: 2s
"#,
            )?;

            let config = Config::load(&args())?;

            assert_eq!(config.routing.usage_window_hours, 48);
            assert_eq!(config.routing.value_score_factor, 2.5);
            assert_eq!(config.routing.value_normalization, ValueNormalization::Logarithmic);
            assert_eq!(config.routing.health_min_samples, 25);
            // Unset policy fields keep their defaults
            assert_eq!(config.routing.failure_penalty_alpha, 4.0);

            assert_eq!(config.group_ratios.ratio("vip"), 0.5);
            assert_eq!(config.stats_sync.interval, Duration::from_secs(30));
            assert_eq!(config.stats_sync.request_timeout, Duration::from_secs(2));
            assert_eq!(config.stats_sync.auth_header_name, "Authorization");

            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 4000
routing:
  health_min_samples: 25
"#,
            )?;

            jail.set_env("DWROUTE_HOST", "127.0.0.1");
            jail.set_env("DWROUTE_ROUTING__HEALTH_MIN_SAMPLES", "50");

            let config = Config::load(&args())?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.port, 4000);
            assert_eq!(config.routing.health_min_samples, 50);

            Ok(())
        });
    }

    #[test]
    fn test_invalid_policy_is_rejected_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
routing:
  health_min_multiplier: 2.0
  health_max_multiplier: 1.0
"#,
            )?;

            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("health_min_multiplier"));

            Ok(())
        });
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "database_url: postgres://localhost/db\n")?;
            assert!(Config::load(&args()).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_stats_sync_requires_url() {
        let mut config = Config::default();
        config.stats_sync.enabled = true;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("stats_sync.url"));

        config.stats_sync.url = Some("http://telemetry:9000".parse().unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stats_sync_zero_durations_rejected() {
        let mut config = Config::default();
        config.stats_sync.enabled = true;
        config.stats_sync.url = Some("http://telemetry:9000".parse().unwrap());

        config.stats_sync.interval = Duration::ZERO;
        assert!(config.validate().unwrap_err().to_string().contains("interval cannot be 0"));

        config.stats_sync.interval = Duration::from_secs(5);
        config.stats_sync.request_timeout = Duration::ZERO;
        assert!(config.validate().unwrap_err().to_string().contains("request_timeout cannot be 0"));
    }

    #[test]
    fn test_stats_sync_validation_skipped_when_disabled() {
        let mut config = Config::default();
        config.stats_sync.interval = Duration::ZERO;
        assert!(config.validate().is_ok());
    }
}
