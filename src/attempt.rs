//! Deploy attempt identity
//!
//! A [`DeployAttempt`] is created once at the start of a deploy and shared
//! by every render of that attempt. It owns the process-level template
//! constants `current_sha` and `deployment_id`.

use rand::Rng;
use serde_json::Value;

use crate::binding::Bindings;

/// Pod names are capped at 63 chars, so only this much of the sha is kept
const SHA_PREFIX_LEN: usize = 8;

/// Random bytes appended to the id (hex encoded, so twice as many chars)
const SUFFIX_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployAttempt {
    current_sha: Option<String>,
    deployment_id: Option<String>,
}

impl DeployAttempt {
    pub fn new(current_sha: Option<String>) -> Self {
        let deployment_id = current_sha.as_deref().map(|sha| {
            let suffix: [u8; SUFFIX_BYTES] = rand::thread_rng().gen();
            format!("{}-{}", truncate(sha, SHA_PREFIX_LEN), hex(&suffix))
        });
        Self {
            current_sha,
            deployment_id,
        }
    }

    pub fn current_sha(&self) -> Option<&str> {
        self.current_sha.as_deref()
    }

    pub fn deployment_id(&self) -> Option<&str> {
        self.deployment_id.as_deref()
    }

    /// The constants every template sees before any other binding
    pub fn bindings(&self) -> Bindings {
        let as_value = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);
        Bindings::from([
            ("current_sha", as_value(&self.current_sha)),
            ("deployment_id", as_value(&self.deployment_id)),
        ])
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
