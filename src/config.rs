use serde::Deserialize;
use std::time::Duration;

use crate::workbench::Limits;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address. Use "0.0.0.0" inside the isolation container so the
    /// approval UI can reach the service.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Wall-clock budget per execution, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Operation budget per execution.
    #[serde(default = "default_max_fuel")]
    pub max_fuel: u64,
    /// Allocation budget per execution, in cells.
    #[serde(default = "default_max_cells")]
    pub max_cells: u64,
    /// Ceiling on the returned dataset size, in cells.
    #[serde(default = "default_max_output_cells")]
    pub max_output_cells: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Maximum concurrently executing requests (worker pool size).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// How long a request may queue for a worker before backpressure,
    /// in milliseconds.
    #[serde(default = "default_queue_wait_ms")]
    pub queue_wait_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8900
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_max_fuel() -> u64 {
    5_000_000
}

fn default_max_cells() -> u64 {
    2_000_000
}

fn default_max_output_cells() -> u64 {
    1_000_000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_queue_wait_ms() -> u64 {
    250
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_fuel: default_max_fuel(),
            max_cells: default_max_cells(),
            max_output_cells: default_max_output_cells(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_wait_ms: default_queue_wait_ms(),
        }
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> Limits {
        Limits {
            timeout: Duration::from_millis(self.timeout_ms),
            max_fuel: self.max_fuel,
            max_cells: self.max_cells,
            max_output_cells: self.max_output_cells,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${RUNNER_PORT}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8900);
        assert_eq!(config.limits.timeout_ms, 2_000);
        assert_eq!(config.gateway.max_concurrent, 4);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let file = write_config(
            "[server]\n\
             port = 9000\n\
             \n\
             [limits]\n\
             timeout_ms = 500\n",
        );
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.limits.timeout_ms, 500);
        assert_eq!(config.limits.max_fuel, 5_000_000);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("SENTINEL_TEST_HOST", "0.0.0.0");
        let file = write_config("[server]\nhost = \"${SENTINEL_TEST_HOST}\"\n");
        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let file = write_config("[server]\nhost = \"${SENTINEL_TEST_UNSET_VAR}\"\n");
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let file = write_config("[server\nport = ");
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_to_limits_conversion() {
        let limits = LimitsConfig {
            timeout_ms: 1_500,
            max_fuel: 10,
            max_cells: 20,
            max_output_cells: 30,
        }
        .to_limits();
        assert_eq!(limits.timeout, Duration::from_millis(1_500));
        assert_eq!(limits.max_fuel, 10);
        assert_eq!(limits.max_cells, 20);
        assert_eq!(limits.max_output_cells, 30);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load("/nonexistent/runner.toml").is_err());
    }
}
