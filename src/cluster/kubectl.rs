//! kubectl-backed cluster queries
//!
//! Runs `kubectl get ...` with the configured context and namespace.
//! Every call has its own timeout; a call that times out or cannot be
//! spawned is reported as a failed query, never as an error.

use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::{ClusterQuery, QueryOutput};

/// Default timeout for a single kubectl call
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the availability check
const CLI_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Kubectl {
    /// Path to the kubectl binary
    cli_path: String,
    context: Option<String>,
    namespace: Option<String>,
    query_timeout: Duration,
}

impl Kubectl {
    pub fn new(context: Option<String>, namespace: Option<String>) -> Self {
        Self {
            cli_path: "kubectl".to_string(),
            context,
            namespace,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Set a custom CLI path
    pub fn with_cli_path(mut self, path: impl Into<String>) -> Self {
        self.cli_path = path.into();
        self
    }

    /// Set per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn cli_path(&self) -> &str {
        &self.cli_path
    }

    /// Check if kubectl is installed (with 5s timeout)
    pub fn is_available(&self) -> bool {
        Command::new(&self.cli_path)
            .args(["version", "--client"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .and_then(|mut child| match child.wait_timeout(CLI_CHECK_TIMEOUT)? {
                Some(status) => Ok(status.success()),
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    Ok(false)
                }
            })
            .unwrap_or(false)
    }

    /// Full argument list: the query followed by context/namespace flags
    fn build_args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if let Some(namespace) = &self.namespace {
            full.push(format!("--namespace={}", namespace));
        }
        if let Some(context) = &self.context {
            full.push(format!("--context={}", context));
        }
        full
    }

    async fn run(&self, args: &[&str]) -> QueryOutput {
        let args = self.build_args(args);
        debug!(cmd = %format!("{} {}", self.cli_path, args.join(" ")), "kubectl");
        match self.run_inner(&args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "kubectl query failed");
                QueryOutput::failure(format!("{:#}", e))
            }
        }
    }

    async fn run_inner(&self, args: &[String]) -> Result<QueryOutput> {
        let output = tokio::time::timeout(
            self.query_timeout,
            tokio::process::Command::new(&self.cli_path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .with_context(|| format!("kubectl timed out after {:?}", self.query_timeout))?
        .with_context(|| format!("failed to spawn '{}'", self.cli_path))?;

        Ok(QueryOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
impl ClusterQuery for Kubectl {
    async fn get(&self, kind: &str, name: &str) -> QueryOutput {
        self.run(&["get", kind, name]).await
    }

    async fn get_json(&self, kind: &str, name: &str) -> QueryOutput {
        self.run(&["get", kind, name, "--output=json"]).await
    }

    async fn list(&self, kind: &str) -> QueryOutput {
        self.run(&["get", kind, "--output=name"]).await
    }
}
