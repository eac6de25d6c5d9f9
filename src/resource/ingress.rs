use std::time::Duration;

use async_trait::async_trait;

use super::{
    DeployMethod, KindSpec, ObservationState, Resource, ResourceDescriptor, ResourceKind,
    ResourceObservation,
};
use crate::cluster::ClusterQuery;

/// Succeeds as soon as it exists; load balancer provisioning is not awaited.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ingress;

impl Ingress {
    pub const SPEC: KindSpec = KindSpec {
        kind: "Ingress",
        group: Some("networking.k8s.io"),
        version: "v1",
        timeout: Duration::from_secs(30),
        predeploy: false,
        prunable: true,
        deploy_method: DeployMethod::Apply,
    };

    pub fn resource(name: impl Into<String>) -> Resource<Ingress> {
        Resource::new(Ingress, Self::SPEC.descriptor(name))
    }
}

#[async_trait]
impl ResourceKind for Ingress {
    async fn observe(&self, descriptor: &ResourceDescriptor, cluster: &dyn ClusterQuery) -> ResourceObservation {
        let output = cluster.get(&descriptor.kind, &descriptor.name).await;
        ResourceObservation::from_get(&output, "Created")
    }

    fn classify(&self, observation: &ResourceObservation) -> ObservationState {
        if observation.exists {
            ObservationState::Succeeded
        } else {
            ObservationState::Pending
        }
    }
}
