// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kafka cluster metadata and login provider selection.

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Authentication method a cluster advertises in its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationMethod {
    Basic,
    OAuth,
    Anonymous,
}

impl FromStr for AuthenticationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "oauth" => Ok(Self::OAuth),
            "anonymous" => Ok(Self::Anonymous),
            other => Err(format!("unknown authentication method: {other}")),
        }
    }
}

/// Sign-in flow the login page should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/api/generated/")
)]
pub enum LoginProvider {
    /// Username/password form
    Credentials,
    /// Redirect to the OAuth identity provider
    OauthToken,
    Anonymous,
}

impl From<AuthenticationMethod> for LoginProvider {
    fn from(method: AuthenticationMethod) -> Self {
        match method {
            AuthenticationMethod::Basic => LoginProvider::Credentials,
            AuthenticationMethod::OAuth => LoginProvider::OauthToken,
            AuthenticationMethod::Anonymous => LoginProvider::Anonymous,
        }
    }
}

impl LoginProvider {
    /// Resolve the provider for a cluster; missing metadata means anonymous.
    pub fn for_method(method: Option<AuthenticationMethod>) -> Self {
        method.map(Self::from).unwrap_or(LoginProvider::Anonymous)
    }
}

/// Cluster resource as returned by `GET /api/kafkas`.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaCluster {
    pub id: String,
    #[serde(default)]
    pub attributes: ClusterAttributes,
    #[serde(default)]
    pub meta: ClusterMeta,
}

impl KafkaCluster {
    pub fn authentication_method(&self) -> Option<AuthenticationMethod> {
        self.meta
            .authentication
            .as_ref()
            .and_then(|auth| auth.method)
    }

    pub fn login_provider(&self) -> LoginProvider {
        LoginProvider::for_method(self.authentication_method())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterAttributes {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterMeta {
    pub authentication: Option<ClusterAuthentication>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterAuthentication {
    #[serde(default, deserialize_with = "lenient_method")]
    pub method: Option<AuthenticationMethod>,
}

/// Unknown method strings fall back to `None` instead of failing the list.
fn lenient_method<'de, D>(deserializer: D) -> Result<Option<AuthenticationMethod>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value.parse() {
        Ok(method) => Some(method),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring cluster authentication method");
            None
        }
    }))
}

/// JSON:API list envelope.
#[derive(Debug, Deserialize)]
pub struct ClusterList {
    pub data: Vec<KafkaCluster>,
}

/// Everything the login page needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/api/generated/")
)]
pub struct LoginPage {
    pub provider: LoginProvider,
    pub callback_url: String,
    pub has_multiple_clusters: bool,
}

impl LoginPage {
    /// Build the login page for `kafka_id`, or `None` if no such cluster.
    pub fn resolve(
        clusters: &[KafkaCluster],
        kafka_id: &str,
        callback_url: Option<String>,
    ) -> Option<Self> {
        let cluster = clusters.iter().find(|c| c.id == kafka_id)?;

        Some(Self {
            provider: cluster.login_provider(),
            callback_url: callback_url.unwrap_or_else(|| format!("/kafka/{}/overview", kafka_id)),
            has_multiple_clusters: clusters.len() > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters(json: &str) -> Vec<KafkaCluster> {
        serde_json::from_str::<ClusterList>(json).unwrap().data
    }

    #[test]
    fn test_provider_mapping() {
        assert_eq!(
            LoginProvider::for_method(Some(AuthenticationMethod::Basic)),
            LoginProvider::Credentials
        );
        assert_eq!(
            LoginProvider::for_method(Some(AuthenticationMethod::OAuth)),
            LoginProvider::OauthToken
        );
        assert_eq!(
            LoginProvider::for_method(Some(AuthenticationMethod::Anonymous)),
            LoginProvider::Anonymous
        );
        assert_eq!(LoginProvider::for_method(None), LoginProvider::Anonymous);
    }

    #[test]
    fn test_provider_wire_names() {
        assert_eq!(
            serde_json::to_string(&LoginProvider::Credentials).unwrap(),
            "\"credentials\""
        );
        assert_eq!(
            serde_json::to_string(&LoginProvider::OauthToken).unwrap(),
            "\"oauth-token\""
        );
        assert_eq!(
            serde_json::to_string(&LoginProvider::Anonymous).unwrap(),
            "\"anonymous\""
        );
    }

    #[test]
    fn test_cluster_metadata_parsing() {
        let list = clusters(
            r#"{"data": [
                {"id": "a", "type": "kafkas", "meta": {"authentication": {"method": "basic"}}},
                {"id": "b", "meta": {"authentication": {"method": "oauth"}}},
                {"id": "c", "meta": {}},
                {"id": "d", "meta": {"authentication": {"method": "kerberos"}}},
                {"id": "e"}
            ]}"#,
        );

        let providers: Vec<_> = list.iter().map(KafkaCluster::login_provider).collect();
        assert_eq!(
            providers,
            vec![
                LoginProvider::Credentials,
                LoginProvider::OauthToken,
                LoginProvider::Anonymous,
                LoginProvider::Anonymous,
                LoginProvider::Anonymous,
            ]
        );
    }

    #[test]
    fn test_login_page_defaults_callback() {
        let list = clusters(r#"{"data": [{"id": "k1", "meta": {"authentication": {"method": "oauth"}}}]}"#);
        let page = LoginPage::resolve(&list, "k1", None).unwrap();

        assert_eq!(page.provider, LoginProvider::OauthToken);
        assert_eq!(page.callback_url, "/kafka/k1/overview");
        assert!(!page.has_multiple_clusters);
    }

    #[test]
    fn test_login_page_unknown_cluster() {
        let list = clusters(r#"{"data": [{"id": "k1"}]}"#);
        assert!(LoginPage::resolve(&list, "missing", None).is_none());
    }
}
