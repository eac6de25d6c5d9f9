//! # Cluster queries
//!
//! The pollers only need two questions answered about the cluster:
//!
//! - "does `<kind>/<name>` exist (and what does it look like)?"
//! - "what are the names of all `<kind>` objects?"
//!
//! [`ClusterQuery`] captures exactly that. A non-success result means
//! "not found or the query failed"; the two are never told apart here.
//!
//! - [`Kubectl`] - production implementation shelling out to `kubectl`
//! - [`MockCluster`] - scripted cluster state for tests

mod kubectl;
mod mock;

pub use kubectl::Kubectl;
pub use mock::MockCluster;

use async_trait::async_trait;

/// Raw result of one cluster query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl QueryOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }
}

/// Point-in-time reads against the cluster
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// `get <kind> <name>`
    async fn get(&self, kind: &str, name: &str) -> QueryOutput;

    /// `get <kind> <name>` with the full object as JSON on stdout
    async fn get_json(&self, kind: &str, name: &str) -> QueryOutput;

    /// Names of every `<kind>` object, one `kind/name` per line
    async fn list(&self, kind: &str) -> QueryOutput;
}
