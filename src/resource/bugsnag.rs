//! Bugsnag custom resource
//!
//! The Bugsnag operator answers a `Bugsnag` object by creating a secret
//! holding the API key. The object existing is not enough: the deploy waits
//! for that secret, which is found by listing all secrets and matching the
//! `-bugsnag` name suffix.
//!
//! Known limitation: any secret ending in the suffix satisfies the check,
//! whoever owns it.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    DeployMethod, KindSpec, ObservationState, Resource, ResourceDescriptor, ResourceKind,
    ResourceObservation,
};
use crate::cluster::ClusterQuery;

const SECRET_SUFFIX: &str = "-bugsnag";

#[derive(Debug, Clone)]
pub struct Bugsnag {
    secret_suffix: String,
}

impl Default for Bugsnag {
    fn default() -> Self {
        Self {
            secret_suffix: SECRET_SUFFIX.to_string(),
        }
    }
}

impl Bugsnag {
    pub const SPEC: KindSpec = KindSpec {
        kind: "Bugsnag",
        group: Some("stable.shopify.io"),
        version: "v1",
        timeout: Duration::from_secs(60),
        predeploy: true,
        prunable: false,
        deploy_method: DeployMethod::Replace,
    };

    pub fn resource(name: impl Into<String>) -> Resource<Bugsnag> {
        Resource::new(Bugsnag::default(), Self::SPEC.descriptor(name))
    }

    pub fn with_secret_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.secret_suffix = suffix.into();
        self
    }
}

#[async_trait]
impl ResourceKind for Bugsnag {
    async fn observe(&self, descriptor: &ResourceDescriptor, cluster: &dyn ClusterQuery) -> ResourceObservation {
        let primary = cluster.get(&descriptor.kind, &descriptor.name).await;
        let mut observation = ResourceObservation::from_get(&primary, "Unknown");

        let mut secret_found = false;
        if primary.success {
            let secrets = cluster.list("secrets").await;
            secret_found = secrets
                .stdout
                .split_whitespace()
                .any(|s| s.ends_with(&self.secret_suffix));
        }

        observation.secret_found = Some(secret_found);
        observation.status = if secret_found { "Available" } else { "Unknown" }.to_string();
        observation
    }

    fn classify(&self, observation: &ResourceObservation) -> ObservationState {
        if observation.exists && observation.secret_found == Some(true) {
            ObservationState::Succeeded
        } else {
            ObservationState::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::resource::ResourceStatusPoller;

    #[tokio::test]
    async fn pending_until_secret_appears() {
        let cluster = MockCluster::new();
        cluster.add("Bugsnag", "app");
        cluster.add("Secret", "app-token");
        let mut bugsnag = Bugsnag::resource("app");

        for _ in 0..3 {
            assert_eq!(bugsnag.sync(&cluster).await, ObservationState::Pending);
            assert!(bugsnag.exists());
            assert!(!bugsnag.has_failed());
        }

        cluster.add("Secret", "app-bugsnag");
        assert_eq!(bugsnag.sync(&cluster).await, ObservationState::Succeeded);
        assert_eq!(bugsnag.status(), "Available");
    }

    #[tokio::test]
    async fn secrets_not_listed_while_missing() {
        let cluster = MockCluster::new();
        cluster.add("Secret", "app-bugsnag");
        let mut bugsnag = Bugsnag::resource("app");
        bugsnag.sync(&cluster).await;
        assert!(!bugsnag.has_succeeded());
        assert_eq!(cluster.requests(), vec!["get Bugsnag app"]);
    }

    #[tokio::test]
    async fn suffix_is_configurable() {
        let cluster = MockCluster::new();
        cluster.add("Bugsnag", "app");
        cluster.add("Secret", "app-bugsnag");
        let mut bugsnag = Resource::new(
            Bugsnag::default().with_secret_suffix("-errors"),
            Bugsnag::SPEC.descriptor("app"),
        );
        bugsnag.sync(&cluster).await;
        assert!(!bugsnag.has_succeeded());
    }

    #[test]
    fn static_policy() {
        let bugsnag = Bugsnag::resource("app");
        let d = bugsnag.descriptor();
        assert!(d.predeploy);
        assert!(!d.prunable);
        assert_eq!(d.deploy_method, DeployMethod::Replace);
        assert_eq!(d.api_version(), "stable.shopify.io/v1");
        assert_eq!(bugsnag.timeout_duration(), Duration::from_secs(60));
    }
}
