//! Mock cluster for testing
//!
//! Holds a scripted set of objects and answers queries from it without
//! touching a real cluster. Clones share state, so a test can change the
//! cluster while a watcher is polling it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{ClusterQuery, QueryOutput};

#[derive(Debug, Default)]
struct State {
    /// (lowercased kind, name) -> JSON body
    objects: BTreeMap<(String, String), String>,
    /// Every query made, as "verb kind [name]"
    requests: Vec<String>,
    /// When set, every query fails with this message
    outage: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<State>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object with an empty JSON body
    pub fn add(&self, kind: &str, name: &str) {
        self.add_json(kind, name, "{}");
    }

    /// Add (or replace) an object with the given JSON body
    pub fn add_json(&self, kind: &str, name: &str, body: impl Into<String>) {
        self.lock()
            .objects
            .insert((kind.to_lowercase(), name.to_string()), body.into());
    }

    pub fn remove(&self, kind: &str, name: &str) {
        self.lock()
            .objects
            .remove(&(kind.to_lowercase(), name.to_string()));
    }

    /// Make every query fail (or recover with `None`)
    pub fn set_outage(&self, message: Option<&str>) {
        self.lock().outage = message.map(str::to_string);
    }

    /// Get all requests made to this cluster
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Clear all recorded requests
    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a panicking test thread must not hide the real failure
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lookup(&self, verb: &str, kind: &str, name: &str) -> Result<String, QueryOutput> {
        let mut state = self.lock();
        state.requests.push(format!("{} {} {}", verb, kind, name));
        if let Some(message) = &state.outage {
            return Err(QueryOutput::failure(message.clone()));
        }
        state
            .objects
            .get(&(kind.to_lowercase(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                QueryOutput::failure(format!(
                    "Error from server (NotFound): {} \"{}\" not found",
                    kind, name
                ))
            })
    }
}

#[async_trait]
impl ClusterQuery for MockCluster {
    async fn get(&self, kind: &str, name: &str) -> QueryOutput {
        match self.lookup("get", kind, name) {
            Ok(_) => QueryOutput::success(format!("NAME\n{}\n", name)),
            Err(out) => out,
        }
    }

    async fn get_json(&self, kind: &str, name: &str) -> QueryOutput {
        match self.lookup("get-json", kind, name) {
            Ok(body) => QueryOutput::success(body),
            Err(out) => out,
        }
    }

    async fn list(&self, kind: &str) -> QueryOutput {
        let mut state = self.lock();
        state.requests.push(format!("list {}", kind));
        if let Some(message) = &state.outage {
            return QueryOutput::failure(message.clone());
        }
        let wanted = kind.to_lowercase();
        let singular = wanted.trim_end_matches('s');
        let names: Vec<String> = state
            .objects
            .keys()
            .filter(|(k, _)| k == &wanted || k == singular)
            .map(|(_, name)| format!("{}/{}", singular, name))
            .collect();
        QueryOutput::success(names.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_reflects_current_objects() {
        let cluster = MockCluster::new();
        assert!(!cluster.get("ConfigMap", "settings").await.success);

        cluster.add("ConfigMap", "settings");
        assert!(cluster.get("configmap", "settings").await.success);

        cluster.remove("configmap", "settings");
        assert!(!cluster.get("ConfigMap", "settings").await.success);
    }

    #[tokio::test]
    async fn list_prints_kind_slash_name() {
        let cluster = MockCluster::new();
        cluster.add("secret", "a-bugsnag");
        cluster.add("secret", "b");
        cluster.add("configmap", "c");
        let out = cluster.list("secrets").await;
        assert_eq!(out.stdout, "secret/a-bugsnag\nsecret/b");
    }

    #[tokio::test]
    async fn outage_fails_everything_and_records_requests() {
        let cluster = MockCluster::new();
        cluster.add("configmap", "c");
        cluster.set_outage(Some("connection refused"));
        let out = cluster.get("configmap", "c").await;
        assert_eq!(out, QueryOutput::failure("connection refused"));
        assert!(!cluster.list("secrets").await.success);
        assert_eq!(cluster.requests(), vec!["get configmap c", "list secrets"]);
    }
}
