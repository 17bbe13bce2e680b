use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{AccessMode, Config};

/// Primary project configuration file.
pub const CONFIG_FILE: &str = "kube-invariants.yaml";

/// Optional local overrides, merged over [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "kube-invariants.local.yaml";

/// Prefix of the structured environment overrides.
pub const ENV_PREFIX: &str = "KUBE_INVARIANTS_";

/// Unprefixed environment variables honoured for compatibility with
/// existing CI jobs, with the configuration key each one sets.
const LEGACY_ENV: [(&str, &str); 5] = [
    ("ACCESS_MODE", "access.mode"),
    ("K8S_API_URL", "access.api_url"),
    ("K8S_TOKEN", "access.token"),
    ("K8S_CA_CERT", "access.ca_cert"),
    ("ALLOWED_TO_FAIL", "allowed_to_fail"),
];

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Namespace cannot be empty")]
    EmptyNamespace,

    #[error("Invalid monitor interval: must be at least 1 second")]
    ZeroInterval,

    #[error("Invalid monitor timeout: must be at least 1 second")]
    ZeroTimeout,

    #[error("Invalid monitor timeout: {timeout_secs}s is shorter than the {interval_secs}s interval")]
    TimeoutShorterThanInterval { interval_secs: u64, timeout_secs: u64 },

    #[error("Missing {0}: required when access mode is external_k8s_api")]
    MissingCredential(&'static str),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. kube-invariants.yaml
    /// 3. kube-invariants.local.yaml (optional)
    /// 4. Legacy variables (ACCESS_MODE, K8S_API_URL, K8S_TOKEN, K8S_CA_CERT, ALLOWED_TO_FAIL)
    /// 5. KUBE_INVARIANTS_* variables, `__` separating nested keys
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with both files looked up in `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join(CONFIG_FILE)))
            .merge(Yaml::file(dir.join(LOCAL_CONFIG_FILE)));
        Self::finish(figment)
    }

    /// Load configuration from a specific file, still applying environment
    /// overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path));
        Self::finish(figment)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    fn finish(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .merge(legacy_env())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.namespace.trim().is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let monitor = &config.monitor;
        if monitor.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if monitor.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if monitor.timeout_secs < monitor.interval_secs {
            return Err(ConfigError::TimeoutShorterThanInterval {
                interval_secs: monitor.interval_secs,
                timeout_secs: monitor.timeout_secs,
            });
        }

        if config.access.mode == AccessMode::ExternalK8sApi {
            let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
            if !present(&config.access.api_url) {
                return Err(ConfigError::MissingCredential("K8S_API_URL"));
            }
            if !present(&config.access.token) {
                return Err(ConfigError::MissingCredential("K8S_TOKEN"));
            }
            if !present(&config.access.ca_cert) {
                return Err(ConfigError::MissingCredential("K8S_CA_CERT"));
            }
        }

        if config.report.bootstrap_tag.is_empty() || config.report.failure_marker.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "report bootstrap_tag and failure_marker cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key == *name)
            .map_or_else(|| key.as_str().to_string(), |(_, target)| (*target).to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;
    use std::fs;

    const ALL_VARS: [&str; 8] = [
        "ACCESS_MODE",
        "K8S_API_URL",
        "K8S_TOKEN",
        "K8S_CA_CERT",
        "ALLOWED_TO_FAIL",
        "KUBE_INVARIANTS_NAMESPACE",
        "KUBE_INVARIANTS_MONITOR__INTERVAL_SECS",
        "KUBE_INVARIANTS_LOGGING__LEVEL",
    ];

    /// Run `f` with every variable the loader reads unset, except `vars`.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let env: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = vars.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(env, f);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.namespace, "test-ns");
        assert_eq!(config.access.mode, AccessMode::Kubeconfig);
        assert_eq!(config.report.bootstrap_tag, "Setup");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
namespace: invariants
allowed_to_fail: [DeploymentPDBTest]
monitor:
  interval_secs: 2
  timeout_secs: 60
report:
  output_dir: /tmp/reports
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.namespace, "invariants");
        assert!(config.is_allowed_to_fail("DeploymentPDBTest"));
        assert_eq!(config.monitor.interval_secs, 2);
        assert_eq!(config.monitor.timeout_secs, 60);
        assert_eq!(config.monitor.max_observation_failures, 3);
        assert_eq!(config.report.output_dir, std::path::PathBuf::from("/tmp/reports"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.monitor.interval_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ZeroInterval
        ));
    }

    #[test]
    fn test_validate_timeout_shorter_than_interval() {
        let mut config = Config::default();
        config.monitor.interval_secs = 10;
        config.monitor.timeout_secs = 5;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::TimeoutShorterThanInterval {
                interval_secs: 10,
                timeout_secs: 5
            }
        ));
    }

    #[test]
    fn test_validate_empty_namespace() {
        let mut config = Config::default();
        config.namespace = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyNamespace
        ));
    }

    #[test]
    fn test_validate_external_requires_all_credentials() {
        let mut config = Config::default();
        config.access.mode = AccessMode::ExternalK8sApi;
        config.access.api_url = Some("https://10.0.0.1:6443".to_string());
        config.access.token = Some("token".to_string());

        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("K8S_CA_CERT")));
        assert!(err.to_string().contains("K8S_CA_CERT"));

        config.access.ca_cert = Some("Y2E=".to_string());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_merges_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "namespace: from-file\nmonitor:\n  interval_secs: 7\n",
        )
        .unwrap();
        fs::write(dir.path().join(LOCAL_CONFIG_FILE), "namespace: from-local\n").unwrap();

        with_env(&[], || {
            let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
            assert_eq!(config.namespace, "from-local");
            assert_eq!(config.monitor.interval_secs, 7);
        });
    }

    #[test]
    fn test_legacy_env_vars() {
        let dir = tempfile::tempdir().unwrap();
        with_env(
            &[
                ("ACCESS_MODE", "EXTERNAL_K8S_API"),
                ("K8S_API_URL", "https://api.example:6443"),
                ("K8S_TOKEN", "abc"),
                ("K8S_CA_CERT", "Y2E="),
                ("ALLOWED_TO_FAIL", "DeploymentPDBTest, StatefulSetPDBTest"),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.access.mode, AccessMode::ExternalK8sApi);
                assert_eq!(config.access.api_url.as_deref(), Some("https://api.example:6443"));
                assert_eq!(config.access.token.as_deref(), Some("abc"));
                assert_eq!(
                    config.allowed_to_fail,
                    vec!["DeploymentPDBTest", "StatefulSetPDBTest"]
                );
            },
        );
    }

    #[test]
    fn test_prefixed_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "namespace: from-file\n").unwrap();
        with_env(
            &[
                ("KUBE_INVARIANTS_NAMESPACE", "from-env"),
                ("KUBE_INVARIANTS_MONITOR__INTERVAL_SECS", "3"),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.namespace, "from-env");
                assert_eq!(config.monitor.interval_secs, 3);
            },
        );
    }

    #[test]
    fn test_invalid_env_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        with_env(&[("KUBE_INVARIANTS_LOGGING__LEVEL", "chatty")], || {
            let err = ConfigLoader::load_from_dir(dir.path()).unwrap_err();
            assert!(err.to_string().contains("Invalid log level"));
        });
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/kube-invariants.yaml").unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
