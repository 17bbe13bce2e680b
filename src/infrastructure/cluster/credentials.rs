//! Credential resolution for the cluster client.

use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::domain::models::{AccessConfig, AccessMode};

const EXTERNAL_CONTEXT: &str = "external";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Missing {0}: required when access mode is external_k8s_api")]
    Missing(&'static str),

    #[error("Failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("Failed to load in-cluster credentials: {0}")]
    InCluster(#[from] InClusterError),

    #[error("Invalid external credentials: {0}")]
    External(#[from] serde_json::Error),

    #[error("Failed to build cluster client: {0}")]
    Client(#[from] kube::Error),
}

/// Build a client configuration for the configured access mode.
///
/// - `kubeconfig`: `access.kubeconfig` when set, otherwise `KUBECONFIG`,
///   otherwise `~/.kube/config`.
/// - `local_k8s_api`: the service-account token and CA mounted in the pod.
/// - `external_k8s_api`: endpoint, bearer token and base64 CA bundle.
pub async fn resolve(access: &AccessConfig) -> Result<kube::Config, CredentialsError> {
    match access.mode {
        AccessMode::Kubeconfig => {
            let kubeconfig = match &access.kubeconfig {
                Some(path) => Kubeconfig::read_from(path)?,
                None => Kubeconfig::read()?,
            };
            debug!(context = ?kubeconfig.current_context, "using kubeconfig credentials");
            Ok(kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?)
        }
        AccessMode::LocalK8sApi => {
            debug!("using in-cluster credentials");
            Ok(kube::Config::incluster()?)
        }
        AccessMode::ExternalK8sApi => {
            let kubeconfig = external_kubeconfig(access)?;
            debug!(server = ?access.api_url, "using external credentials");
            Ok(kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?)
        }
    }
}

/// A single-context kubeconfig for an external endpoint.
fn external_kubeconfig(access: &AccessConfig) -> Result<Kubeconfig, CredentialsError> {
    let api_url = required(access.api_url.as_deref(), "K8S_API_URL")?;
    let token = required(access.token.as_deref(), "K8S_TOKEN")?;
    let ca_cert = clean_ca_data(required(access.ca_cert.as_deref(), "K8S_CA_CERT")?);

    let value = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": EXTERNAL_CONTEXT,
            "cluster": { "server": api_url, "certificate-authority-data": ca_cert },
        }],
        "users": [{
            "name": EXTERNAL_CONTEXT,
            "user": { "token": token },
        }],
        "contexts": [{
            "name": EXTERNAL_CONTEXT,
            "context": { "cluster": EXTERNAL_CONTEXT, "user": EXTERNAL_CONTEXT },
        }],
        "current-context": EXTERNAL_CONTEXT,
    });
    Ok(serde_json::from_value(value)?)
}

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, CredentialsError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(CredentialsError::Missing(name))
}

/// CA bundles pasted into CI variables often carry literal `\n` sequences
/// or wrapped lines; base64 has no whitespace, so both are dropped.
pub(crate) fn clean_ca_data(raw: &str) -> String {
    raw.replace("\\n", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn external(url: Option<&str>, token: Option<&str>, ca: Option<&str>) -> AccessConfig {
        AccessConfig {
            mode: AccessMode::ExternalK8sApi,
            kubeconfig: None,
            api_url: url.map(str::to_string),
            token: token.map(str::to_string),
            ca_cert: ca.map(str::to_string),
        }
    }

    #[test]
    fn test_clean_ca_data() {
        assert_eq!(clean_ca_data("TUlJ\\nQ0Fq\n  Q0E=\r\n"), "TUlJQ0FqQ0E=");
    }

    #[tokio::test]
    async fn test_external_requires_each_field() {
        let err = resolve(&external(None, Some("t"), Some("Y2E="))).await.unwrap_err();
        assert!(matches!(err, CredentialsError::Missing("K8S_API_URL")));

        let err = resolve(&external(Some("https://api:6443"), Some("  "), Some("Y2E=")))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialsError::Missing("K8S_TOKEN")));

        let err = resolve(&external(Some("https://api:6443"), Some("t"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialsError::Missing("K8S_CA_CERT")));
    }

    #[test]
    fn test_external_kubeconfig_shape() {
        let kubeconfig =
            external_kubeconfig(&external(Some("https://api:6443"), Some("t"), Some("Y2E=\\n")))
                .unwrap();
        assert_eq!(kubeconfig.current_context.as_deref(), Some(EXTERNAL_CONTEXT));
        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://api:6443"));
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Y2E="));
    }
}
