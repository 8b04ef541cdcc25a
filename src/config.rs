//! Gateway configuration.
//!
//! Command-line flags (with environment fallbacks) take precedence over the
//! optional registry YAML file, which takes precedence over built-in defaults.

use std::time::Duration;

use capability_registry::{ConfigError, RegistryConfig};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "capgw")]
#[command(about = "Namespace-scoped capability registry server")]
#[command(version)]
pub struct CliArgs {
    /// Host address to bind to
    #[arg(long, env = "REGISTRY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "REGISTRY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Registry configuration file (YAML)
    #[arg(short, long, env = "REGISTRY_CONFIG")]
    pub config: Option<String>,

    /// Number of numbered namespace slots (1-10); overrides the config file
    #[arg(long)]
    pub max_slots: Option<usize>,

    /// Leave default-namespace capabilities out of unfiltered listings
    #[arg(long, default_value_t = false)]
    pub exclude_default_from_unfiltered: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    pub log_json: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub registry: RegistryConfig,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            registry: RegistryConfig::default(),
        }
    }
}

impl CliArgs {
    /// Resolve the effective configuration, reading the config file if one was given.
    pub async fn to_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let mut registry = match &self.config {
            Some(path) => RegistryConfig::from_file(path).await?,
            None => RegistryConfig::default(),
        };
        if let Some(max_slots) = self.max_slots {
            registry.max_slots = max_slots;
        }
        if self.exclude_default_from_unfiltered {
            registry.include_default_in_unfiltered = false;
        }
        registry.validate()?;

        Ok(GatewayConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_defaults() {
        let args = CliArgs::parse_from(["capgw"]);
        let config = args.to_gateway_config().await.unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[tokio::test]
    async fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_slots: 3\ninclude_default_in_unfiltered: true").unwrap();
        let path = file.path().to_str().unwrap();

        let args = CliArgs::parse_from([
            "capgw",
            "--config",
            path,
            "--max-slots",
            "5",
            "--exclude-default-from-unfiltered",
            "--port",
            "9100",
        ]);
        let config = args.to_gateway_config().await.unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.registry.max_slots, 5);
        assert!(!config.registry.include_default_in_unfiltered);
    }

    #[tokio::test]
    async fn test_invalid_override_rejected() {
        let args = CliArgs::parse_from(["capgw", "--max-slots", "11"]);
        let err = args.to_gateway_config().await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_slots", .. }));
    }
}
