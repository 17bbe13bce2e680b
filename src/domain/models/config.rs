use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::convergence::MonitorConfig;

/// Main configuration structure for kube-invariants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Namespace scenarios create their resources in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// How to reach the cluster control plane
    #[serde(default)]
    pub access: AccessConfig,

    /// Scenario tags permitted to fail without affecting suite health
    #[serde(default, deserialize_with = "string_or_list")]
    pub allowed_to_fail: Vec<String>,

    /// Default sampling parameters for monitored waits
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Report artifact configuration
    #[serde(default)]
    pub report: ReportConfig,

    /// Manifest lookup configuration
    #[serde(default)]
    pub manifests: ManifestConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_namespace() -> String {
    "test-ns".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            access: AccessConfig::default(),
            allowed_to_fail: Vec::new(),
            monitor: MonitorSettings::default(),
            report: ReportConfig::default(),
            manifests: ManifestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn is_allowed_to_fail(&self, tag: &str) -> bool {
        self.allowed_to_fail.iter().any(|t| t == tag)
    }
}

/// Accept either a YAML list or a comma separated string (as found in
/// environment variables). Entries are trimmed and empty ones dropped.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::One(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
        Raw::Many(v) => v,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Credential source for the cluster state provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Read a kubeconfig file
    #[default]
    #[serde(alias = "KUBECONFIG")]
    Kubeconfig,
    /// Use the service-account credentials mounted into the pod
    #[serde(alias = "LOCAL_K8S_API")]
    LocalK8sApi,
    /// Use an externally supplied endpoint, token and CA
    #[serde(alias = "EXTERNAL_K8S_API")]
    ExternalK8sApi,
}

/// Cluster access configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccessConfig {
    #[serde(default)]
    pub mode: AccessMode,

    /// Explicit kubeconfig path (`kubeconfig` mode)
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// API server URL (`external_k8s_api` mode)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer token (`external_k8s_api` mode)
    #[serde(default)]
    pub token: Option<String>,

    /// Base64 encoded PEM CA bundle (`external_k8s_api` mode)
    #[serde(default)]
    pub ca_cert: Option<String>,
}

/// Monitor defaults applied by the built-in scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_observation_failures")]
    pub max_observation_failures: u32,

    #[serde(default = "default_observation_retry_ms")]
    pub observation_retry_ms: u64,
}

const fn default_interval_secs() -> u64 {
    5
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_max_observation_failures() -> u32 {
    3
}

const fn default_observation_retry_ms() -> u64 {
    1000
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            max_observation_failures: default_max_observation_failures(),
            observation_retry_ms: default_observation_retry_ms(),
        }
    }
}

impl MonitorSettings {
    pub const fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(
            Duration::from_secs(self.interval_secs),
            Duration::from_secs(self.timeout_secs),
        )
        .with_observation_retries(
            self.max_observation_failures,
            Duration::from_millis(self.observation_retry_ms),
        )
    }
}

/// Report artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportConfig {
    /// Existing directory the report is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Tag reserved for setup-phase logging, excluded from the report
    #[serde(default = "default_bootstrap_tag")]
    pub bootstrap_tag: String,

    /// Message fragment marking a scenario as failed
    #[serde(default = "default_failure_marker")]
    pub failure_marker: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_bootstrap_tag() -> String {
    "Setup".to_string()
}

fn default_failure_marker() -> String {
    "TEST_FAILED".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            bootstrap_tag: default_bootstrap_tag(),
            failure_marker: default_failure_marker(),
        }
    }
}

/// Manifest lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManifestConfig {
    #[serde(default = "default_manifest_root")]
    pub root: PathBuf,
}

fn default_manifest_root() -> PathBuf {
    PathBuf::from("manifests")
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            root: default_manifest_root(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for daily-rotated JSON log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_to_fail_accepts_comma_string() {
        let config: Config =
            serde_yaml::from_str("allowed_to_fail: \"A, B ,,C\"").expect("YAML should parse");
        assert_eq!(config.allowed_to_fail, vec!["A", "B", "C"]);
        assert!(config.is_allowed_to_fail("B"));
        assert!(!config.is_allowed_to_fail("D"));
    }

    #[test]
    fn test_allowed_to_fail_accepts_list() {
        let config: Config =
            serde_yaml::from_str("allowed_to_fail: [X, Y]").expect("YAML should parse");
        assert_eq!(config.allowed_to_fail, vec!["X", "Y"]);
    }

    #[test]
    fn test_access_mode_accepts_legacy_names() {
        let config: Config =
            serde_yaml::from_str("access:\n  mode: EXTERNAL_K8S_API").expect("YAML should parse");
        assert_eq!(config.access.mode, AccessMode::ExternalK8sApi);
    }

    #[test]
    fn test_monitor_settings_conversion() {
        let monitor = MonitorSettings::default().to_monitor_config();
        assert_eq!(monitor.interval, Duration::from_secs(5));
        assert_eq!(monitor.timeout, Duration::from_secs(300));
        assert_eq!(monitor.max_observation_failures, 3);
    }
}
