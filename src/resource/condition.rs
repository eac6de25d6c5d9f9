//! Condition-based kinds
//!
//! Most Kubernetes objects report readiness through `status.conditions`.
//! [`ConditionKind`] watches any such kind: it succeeds when the success
//! condition is `True` and fails when the failure condition is `True`.
//! Objects that report no conditions at all (Services, Secrets, most CRDs
//! without a controller) succeed once they exist, unless the kind is known
//! to publish conditions. Conditions may flip back on a later poll, so
//! unlike the existence-based kinds this one does not latch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::{
    DeployMethod, ObservationState, Resource, ResourceDescriptor, ResourceKind,
    ResourceObservation,
};
use crate::cluster::ClusterQuery;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// One entry of `status.conditions`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status.eq_ignore_ascii_case("true")
    }
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(default)]
    status: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
pub struct ConditionKind {
    success_condition: String,
    failure_condition: Option<String>,
    existence_fallback: bool,
}

impl Default for ConditionKind {
    fn default() -> Self {
        Self {
            success_condition: "Ready".to_string(),
            failure_condition: None,
            existence_fallback: true,
        }
    }
}

impl ConditionKind {
    /// Watch `kind/name`; `api_version` is `group/version` or a bare version
    pub fn resource(
        kind: impl Into<String>,
        name: impl Into<String>,
        api_version: &str,
    ) -> Resource<ConditionKind> {
        let kind = kind.into();
        Self::for_kind(&kind).build(kind, name, api_version, DEFAULT_TIMEOUT)
    }

    /// Conditions to watch for a built-in kind
    pub fn for_kind(kind: &str) -> Self {
        match kind {
            "Deployment" => Self::default()
                .with_success_condition("Available")
                .require_conditions(),
            "Job" => Self::default()
                .with_success_condition("Complete")
                .with_failure_condition("Failed")
                .require_conditions(),
            "Pod" => Self::default().require_conditions(),
            _ => Self::default(),
        }
    }

    /// Stay pending while the object has no conditions yet
    pub fn require_conditions(mut self) -> Self {
        self.existence_fallback = false;
        self
    }

    pub fn with_success_condition(mut self, condition: impl Into<String>) -> Self {
        self.success_condition = condition.into();
        self
    }

    pub fn with_failure_condition(mut self, condition: impl Into<String>) -> Self {
        self.failure_condition = Some(condition.into());
        self
    }

    pub fn build(
        self,
        kind: impl Into<String>,
        name: impl Into<String>,
        api_version: &str,
        timeout: Duration,
    ) -> Resource<ConditionKind> {
        let (group, version) = match api_version.rsplit_once('/') {
            Some((group, version)) => (Some(group.to_string()), version.to_string()),
            None => (None, api_version.to_string()),
        };
        let descriptor = ResourceDescriptor {
            kind: kind.into(),
            name: name.into(),
            group,
            version,
            predeploy: false,
            prunable: false,
            deploy_method: DeployMethod::Apply,
            timeout,
        };
        Resource::new(self, descriptor)
    }

    fn find<'a>(&self, conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
        conditions.iter().find(|c| c.type_ == type_)
    }
}

#[async_trait]
impl ResourceKind for ConditionKind {
    async fn observe(&self, descriptor: &ResourceDescriptor, cluster: &dyn ClusterQuery) -> ResourceObservation {
        let output = cluster.get_json(&descriptor.kind, &descriptor.name).await;
        if !output.success {
            return ResourceObservation::from_get(&output, "Unknown");
        }

        let conditions = match serde_json::from_str::<Body>(&output.stdout) {
            Ok(body) => body.status.map(|s| s.conditions).unwrap_or_default(),
            Err(e) => {
                warn!(resource = %descriptor.id(), error = %e, "unreadable object body");
                return ResourceObservation {
                    exists: true,
                    status: "Unknown".to_string(),
                    query_error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        let status = if conditions.is_empty() && self.existence_fallback {
            "Exists".to_string()
        } else {
            self.find(&conditions, &self.success_condition)
                .and_then(|c| c.reason.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        };

        ResourceObservation {
            exists: true,
            status,
            conditions,
            ..Default::default()
        }
    }

    fn classify(&self, observation: &ResourceObservation) -> ObservationState {
        let conditions = &observation.conditions;
        if let Some(failure) = &self.failure_condition {
            if self.find(conditions, failure).is_some_and(Condition::is_true) {
                return ObservationState::Failed;
            }
        }
        if self
            .find(conditions, &self.success_condition)
            .is_some_and(Condition::is_true)
        {
            return ObservationState::Succeeded;
        }
        let bare = observation.exists && observation.query_error.is_none() && conditions.is_empty();
        if bare && self.existence_fallback {
            ObservationState::Succeeded
        } else {
            ObservationState::Pending
        }
    }

    fn allows_regression(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockCluster;
    use crate::resource::ResourceStatusPoller;

    fn body(conditions: &str) -> String {
        format!(r#"{{"status":{{"conditions":{}}}}}"#, conditions)
    }

    #[tokio::test]
    async fn ready_condition_succeeds() {
        let cluster = MockCluster::new();
        cluster.add_json(
            "Certificate",
            "tls",
            body(r#"[{"type":"Ready","status":"True","reason":"Issued"}]"#),
        );
        let mut cert = ConditionKind::resource("Certificate", "tls", "cert-manager.io/v1");
        assert_eq!(cert.sync(&cluster).await, ObservationState::Succeeded);
        assert_eq!(cert.status(), "Issued");
        assert_eq!(cert.descriptor().group.as_deref(), Some("cert-manager.io"));
    }

    #[tokio::test]
    async fn failure_condition_fails() {
        let cluster = MockCluster::new();
        cluster.add_json(
            "Job",
            "migrate",
            body(r#"[{"type":"Failed","status":"True","reason":"BackoffLimitExceeded"}]"#),
        );
        let mut job = ConditionKind::default()
            .with_success_condition("Complete")
            .with_failure_condition("Failed")
            .build("Job", "migrate", "batch/v1", Duration::from_secs(60));
        assert_eq!(job.sync(&cluster).await, ObservationState::Failed);
        assert!(job.has_failed());
        assert_eq!(job.timeout_duration(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn conditions_may_regress() {
        let cluster = MockCluster::new();
        cluster.add_json("Widget", "w", body(r#"[{"type":"Ready","status":"True"}]"#));
        let mut widget = ConditionKind::resource("Widget", "w", "example.com/v1");
        assert_eq!(widget.sync(&cluster).await, ObservationState::Succeeded);

        cluster.add_json("Widget", "w", body(r#"[{"type":"Ready","status":"False"}]"#));
        assert_eq!(widget.sync(&cluster).await, ObservationState::Pending);
    }

    #[tokio::test]
    async fn object_without_conditions_succeeds_on_existence() {
        let cluster = MockCluster::new();
        let mut service = ConditionKind::resource("Service", "web", "v1");
        assert_eq!(service.sync(&cluster).await, ObservationState::Pending);

        cluster.add("Service", "web");
        assert_eq!(service.sync(&cluster).await, ObservationState::Succeeded);
        assert_eq!(service.status(), "Exists");
        assert_eq!(service.timeout_duration(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn required_conditions_keep_bare_object_pending() {
        let cluster = MockCluster::new();
        cluster.add("Widget", "w");
        let mut widget = ConditionKind::default()
            .require_conditions()
            .build("Widget", "w", "v1", DEFAULT_TIMEOUT);
        assert_eq!(widget.sync(&cluster).await, ObservationState::Pending);
        assert!(widget.exists());
        assert_eq!(widget.status(), "Unknown");
    }

    #[tokio::test]
    async fn deployment_waits_for_available() {
        let cluster = MockCluster::new();
        cluster.add("Deployment", "web");
        let mut deployment = ConditionKind::resource("Deployment", "web", "apps/v1");
        assert_eq!(deployment.sync(&cluster).await, ObservationState::Pending);

        cluster.add_json(
            "Deployment",
            "web",
            body(r#"[{"type":"Progressing","status":"True"},{"type":"Available","status":"True","reason":"MinimumReplicasAvailable"}]"#),
        );
        assert_eq!(deployment.sync(&cluster).await, ObservationState::Succeeded);
        assert_eq!(deployment.status(), "MinimumReplicasAvailable");
    }

    #[tokio::test]
    async fn unrelated_conditions_keep_object_pending() {
        let cluster = MockCluster::new();
        cluster.add_json("Widget", "w", body(r#"[{"type":"Synced","status":"True"}]"#));
        let mut widget = ConditionKind::resource("Widget", "w", "example.com/v1");
        assert_eq!(widget.sync(&cluster).await, ObservationState::Pending);
    }

    #[tokio::test]
    async fn garbage_body_is_pending() {
        let cluster = MockCluster::new();
        cluster.add_json("Widget", "w", "not json");
        let mut widget = ConditionKind::resource("Widget", "w", "v1");
        assert_eq!(widget.sync(&cluster).await, ObservationState::Pending);
        assert!(widget.observation().unwrap().query_error.is_some());
    }
}
