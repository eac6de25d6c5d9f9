use std::time::Duration;

use async_trait::async_trait;

use super::{
    DeployMethod, KindSpec, ObservationState, Resource, ResourceDescriptor, ResourceKind,
    ResourceObservation, UNUSUAL_FAILURE_MESSAGE,
};
use crate::cluster::ClusterQuery;

/// Succeeds as soon as it exists. Deployed before everything else since
/// pods may mount it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigMap;

impl ConfigMap {
    pub const SPEC: KindSpec = KindSpec {
        kind: "ConfigMap",
        group: None,
        version: "v1",
        timeout: Duration::from_secs(30),
        predeploy: true,
        prunable: true,
        deploy_method: DeployMethod::Apply,
    };

    pub fn resource(name: impl Into<String>) -> Resource<ConfigMap> {
        Resource::new(ConfigMap, Self::SPEC.descriptor(name))
    }
}

#[async_trait]
impl ResourceKind for ConfigMap {
    async fn observe(&self, descriptor: &ResourceDescriptor, cluster: &dyn ClusterQuery) -> ResourceObservation {
        let output = cluster.get(&descriptor.kind, &descriptor.name).await;
        ResourceObservation::from_get(&output, "Available")
    }

    fn classify(&self, observation: &ResourceObservation) -> ObservationState {
        if observation.exists {
            ObservationState::Succeeded
        } else {
            ObservationState::Pending
        }
    }

    fn timeout_message(&self) -> &'static str {
        UNUSUAL_FAILURE_MESSAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::resource::ResourceStatusPoller;

    #[tokio::test]
    async fn never_fails_while_missing() {
        let cluster = MockCluster::new();
        let mut cm = ConfigMap::resource("settings");
        for _ in 0..3 {
            assert_eq!(cm.sync(&cluster).await, ObservationState::Pending);
            assert!(!cm.has_failed());
            assert_eq!(cm.status(), "Unknown");
        }
    }

    #[tokio::test]
    async fn succeeds_once_present() {
        let cluster = MockCluster::new();
        cluster.add("ConfigMap", "settings");
        let mut cm = ConfigMap::resource("settings");
        cm.sync(&cluster).await;
        assert!(cm.has_succeeded());
        assert!(cm.exists());
        assert_eq!(cm.status(), "Available");
    }

    #[test]
    fn static_policy() {
        let cm = ConfigMap::resource("settings");
        let d = cm.descriptor();
        assert!(d.predeploy && d.prunable);
        assert_eq!(cm.timeout_duration(), Duration::from_secs(30));
        assert_eq!(cm.timeout_message(), UNUSUAL_FAILURE_MESSAGE);
    }
}
