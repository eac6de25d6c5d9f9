//! # Resource status polling
//!
//! Every watched resource implements [`ResourceStatusPoller`]: the watcher
//! calls [`sync`](ResourceStatusPoller::sync) once per poll cycle and reads
//! back `has_succeeded()` / `has_failed()`. Kinds differ only in how they
//! observe the cluster and how they classify what they saw, so each kind
//! implements the smaller [`ResourceKind`] trait and [`Resource`] supplies
//! the shared state machine:
//!
//! ```text
//! Unknown ──sync──▶ Pending ──sync──▶ Succeeded (terminal)
//!                      │
//!                      └────sync──▶ Failed (terminal, only for kinds that can fail)
//! ```
//!
//! | Kind | Success policy | Timeout |
//! |------|----------------|---------|
//! | [`ConfigMap`] | exists | 30s |
//! | [`Ingress`] | exists | 30s |
//! | [`Bugsnag`] | exists and a `*-bugsnag` secret exists | 60s |
//! | [`ConditionKind`] | `status.conditions` | 5m (configurable) |
//!
//! Timeouts are not enforced here: the watcher compares elapsed time with
//! [`timeout_duration`](ResourceStatusPoller::timeout_duration).

mod bugsnag;
mod condition;
mod config_map;
mod ingress;

pub use bugsnag::Bugsnag;
pub use condition::{Condition, ConditionKind};
pub use config_map::ConfigMap;
pub use ingress::Ingress;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cluster::{ClusterQuery, QueryOutput};

/// Shown when a resource times out
pub const STANDARD_TIMEOUT_MESSAGE: &str = "Kubernetes will continue to attempt to deploy this resource in the cluster, \
but at this point it is considered unlikely that it will succeed.\n\
If you have reason to believe it will succeed, retry the deploy to continue to monitor the rollout.";

/// Shown when a kind that should never time out does
pub const UNUSUAL_FAILURE_MESSAGE: &str = "It is very unusual for this resource type to fail to deploy. \
Please try the deploy again.\n\
If that subsequent deploy also fails, contact your cluster administrator.";

/// How an orchestrator should send the manifest to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMethod {
    Apply,
    Replace,
}

/// Static metadata of a built-in kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub kind: &'static str,
    pub group: Option<&'static str>,
    pub version: &'static str,
    pub timeout: Duration,
    pub predeploy: bool,
    pub prunable: bool,
    pub deploy_method: DeployMethod,
}

impl KindSpec {
    pub fn descriptor(&self, name: impl Into<String>) -> ResourceDescriptor {
        ResourceDescriptor {
            kind: self.kind.to_string(),
            name: name.into(),
            group: self.group.map(str::to_string),
            version: self.version.to_string(),
            predeploy: self.predeploy,
            prunable: self.prunable,
            deploy_method: self.deploy_method,
            timeout: self.timeout,
        }
    }
}

/// Identity and static policy of one resource instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub kind: String,
    pub name: String,
    pub group: Option<String>,
    pub version: String,
    pub predeploy: bool,
    pub prunable: bool,
    pub deploy_method: DeployMethod,
    pub timeout: Duration,
}

impl ResourceDescriptor {
    /// `Kind/name`, as used in log lines and summaries
    pub fn id(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        match &self.group {
            Some(group) => format!("{}/{}", group, self.version),
            None => self.version.clone(),
        }
    }
}

/// What one poll cycle saw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceObservation {
    pub exists: bool,
    /// Free-form status label ("Available", "Created", "Unknown", ...)
    pub status: String,
    /// Dependent-artifact kinds: whether the artifact was seen
    pub secret_found: Option<bool>,
    /// Condition-based kinds: conditions from the object's status
    pub conditions: Vec<Condition>,
    /// Set when the query itself failed
    pub query_error: Option<String>,
}

impl ResourceObservation {
    /// Observation from a plain `get`; `found_status` labels success
    pub fn from_get(output: &QueryOutput, found_status: &str) -> Self {
        Self {
            exists: output.success,
            status: if output.success { found_status } else { "Unknown" }.to_string(),
            query_error: (!output.success).then(|| output.stderr.trim().to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObservationState {
    #[default]
    Unknown,
    Pending,
    Succeeded,
    Failed,
}

impl ObservationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ObservationState::Succeeded | ObservationState::Failed)
    }
}

impl fmt::Display for ObservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservationState::Unknown => "unknown",
            ObservationState::Pending => "pending",
            ObservationState::Succeeded => "succeeded",
            ObservationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Polling contract shared by every kind
#[async_trait]
pub trait ResourceStatusPoller: Send + Sync {
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Query the cluster once and update the classification
    async fn sync(&mut self, cluster: &dyn ClusterQuery) -> ObservationState;

    fn state(&self) -> ObservationState;

    /// Result of the latest poll, if any
    fn observation(&self) -> Option<&ResourceObservation>;

    fn has_succeeded(&self) -> bool {
        self.state() == ObservationState::Succeeded
    }

    fn has_failed(&self) -> bool {
        self.state() == ObservationState::Failed
    }

    fn exists(&self) -> bool {
        self.observation().map(|o| o.exists).unwrap_or(false)
    }

    fn status(&self) -> &str {
        self.observation().map(|o| o.status.as_str()).unwrap_or("Unknown")
    }

    fn timeout_duration(&self) -> Duration {
        self.descriptor().timeout
    }

    fn timeout_message(&self) -> &str {
        STANDARD_TIMEOUT_MESSAGE
    }
}

/// Kind-specific half of a poller
#[async_trait]
pub trait ResourceKind: Send + Sync + 'static {
    /// Read the cluster state for `descriptor`
    async fn observe(&self, descriptor: &ResourceDescriptor, cluster: &dyn ClusterQuery) -> ResourceObservation;

    /// Decide pending / succeeded / failed from one observation
    fn classify(&self, observation: &ResourceObservation) -> ObservationState;

    fn timeout_message(&self) -> &'static str {
        STANDARD_TIMEOUT_MESSAGE
    }

    /// Whether a terminal state may be left again on a later poll
    fn allows_regression(&self) -> bool {
        false
    }
}

/// A watched resource: a kind plus its per-instance state
#[derive(Debug)]
pub struct Resource<K> {
    kind: K,
    descriptor: ResourceDescriptor,
    observation: Option<ResourceObservation>,
    state: ObservationState,
}

impl<K: ResourceKind> Resource<K> {
    pub fn new(kind: K, descriptor: ResourceDescriptor) -> Self {
        Self {
            kind,
            descriptor,
            observation: None,
            state: ObservationState::Unknown,
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }
}

#[async_trait]
impl<K: ResourceKind> ResourceStatusPoller for Resource<K> {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    async fn sync(&mut self, cluster: &dyn ClusterQuery) -> ObservationState {
        let observation = self.kind.observe(&self.descriptor, cluster).await;
        let next = self.kind.classify(&observation);

        let latched = self.state.is_terminal() && !self.kind.allows_regression();
        if !latched {
            self.state = next;
        }
        debug!(
            resource = %self.descriptor.id(),
            status = %observation.status,
            state = %self.state,
            "synced"
        );
        self.observation = Some(observation);
        self.state
    }

    fn state(&self) -> ObservationState {
        self.state
    }

    fn observation(&self) -> Option<&ResourceObservation> {
        self.observation.as_ref()
    }

    fn timeout_message(&self) -> &str {
        self.kind.timeout_message()
    }
}

/// Build a poller for a rendered manifest.
///
/// Returns `None` for documents without `kind` or `metadata.name`. Kinds
/// without a dedicated poller are watched through their status conditions
/// (see [`ConditionKind::for_kind`]).
pub fn from_document(doc: &serde_yaml::Value) -> Option<Box<dyn ResourceStatusPoller>> {
    let kind = doc.get("kind")?.as_str()?;
    let name = doc.get("metadata")?.get("name")?.as_str()?;

    let poller: Box<dyn ResourceStatusPoller> = match kind {
        "ConfigMap" => Box::new(ConfigMap::resource(name)),
        "Ingress" => Box::new(Ingress::resource(name)),
        "Bugsnag" => Box::new(Bugsnag::resource(name)),
        other => {
            let api_version = doc.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("v1");
            Box::new(ConditionKind::resource(other, name, api_version))
        }
    };
    Some(poller)
}
