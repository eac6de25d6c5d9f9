//! Resource watcher - polls a set of resources until each one settles
//!
//! - JoinSet per poll cycle, one task per unfinished resource
//! - Semaphore bounding in-flight cluster queries
//! - Per-kind timeouts, attempt deadline, external cancellation

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cluster::ClusterQuery;
use crate::error::DeployError;
use crate::limits::WatchLimits;
use crate::resource::{ObservationState, ResourceDescriptor, ResourceStatusPoller};

/// How a watched resource ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceOutcome {
    Succeeded,
    Failed,
    TimedOut { message: String },
    /// Still unfinished when the watch was stopped
    Cancelled,
}

impl ResourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ResourceOutcome::Succeeded)
    }
}

impl fmt::Display for ResourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceOutcome::Succeeded => "succeeded",
            ResourceOutcome::Failed => "failed",
            ResourceOutcome::TimedOut { .. } => "timed out",
            ResourceOutcome::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub descriptor: ResourceDescriptor,
    pub outcome: ResourceOutcome,
    /// Status label from the last poll
    pub status: String,
    pub polls: u32,
}

#[derive(Debug, Clone)]
pub struct WatchSummary {
    /// One report per resource, in input order
    pub reports: Vec<ResourceReport>,
    pub elapsed: Duration,
    pub deadline_exceeded: bool,
}

impl WatchSummary {
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_success())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ResourceReport> {
        self.reports.iter().filter(|r| r.outcome.is_success())
    }

    pub fn unsuccessful(&self) -> impl Iterator<Item = &ResourceReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }

    /// `Ok` only when every resource succeeded
    pub fn into_result(self, limits: &WatchLimits) -> Result<Self, DeployError> {
        if self.deadline_exceeded {
            return Err(DeployError::Deadline {
                secs: limits.attempt_deadline.as_secs(),
            });
        }
        let failed = self.unsuccessful().count();
        if failed > 0 {
            return Err(DeployError::ResourcesFailed { failed });
        }
        Ok(self)
    }

    /// Human-readable summary, one line per resource
    pub fn print(&self) {
        for report in &self.reports {
            let marker = match &report.outcome {
                ResourceOutcome::Succeeded => "[✓]".green(),
                ResourceOutcome::Failed => "[✗]".red(),
                ResourceOutcome::TimedOut { .. } => "[⏱]".yellow(),
                ResourceOutcome::Cancelled => "[-]".dimmed(),
            };
            println!(
                "  {} {} {} ({})",
                marker,
                report.descriptor.id(),
                report.outcome,
                report.status.dimmed()
            );
            if let ResourceOutcome::TimedOut { message } = &report.outcome {
                for line in message.lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
        println!(
            "\n{} {}/{} resources ready in {:.1}s",
            "→".cyan(),
            self.succeeded().count(),
            self.reports.len(),
            self.elapsed.as_secs_f64()
        );
    }
}

struct Slot {
    descriptor: ResourceDescriptor,
    /// `None` while a poll task owns the resource
    resource: Option<Box<dyn ResourceStatusPoller>>,
    report: Option<ResourceReport>,
    polls: u32,
}

/// Result of one poll task; the resource travels back with it
struct Polled {
    index: usize,
    resource: Box<dyn ResourceStatusPoller>,
    state: ObservationState,
}

pub struct ResourceWatcher {
    cluster: Arc<dyn ClusterQuery>,
    limits: WatchLimits,
}

impl ResourceWatcher {
    pub fn new(cluster: Arc<dyn ClusterQuery>, limits: WatchLimits) -> Self {
        Self { cluster, limits }
    }

    pub fn limits(&self) -> &WatchLimits {
        &self.limits
    }

    /// Poll `resources` until each one succeeds, fails, or times out.
    ///
    /// Stops early when `cancel` fires or the attempt deadline passes;
    /// resources still unfinished at that point are reported `Cancelled`.
    #[instrument(skip_all, fields(resources = resources.len()))]
    pub async fn run(
        &self,
        resources: Vec<Box<dyn ResourceStatusPoller>>,
        cancel: CancellationToken,
    ) -> WatchSummary {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.limits.attempt_deadline;
        let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent_polls.max(1)));

        let mut slots: Vec<Slot> = resources
            .into_iter()
            .map(|resource| Slot {
                descriptor: resource.descriptor().clone(),
                resource: Some(resource),
                report: None,
                polls: 0,
            })
            .collect();

        let mut deadline_exceeded = false;
        let mut cycle = 0u32;

        loop {
            let mut join_set = JoinSet::new();
            for (index, slot) in slots.iter_mut().enumerate() {
                if slot.report.is_some() {
                    continue;
                }
                let Some(mut resource) = slot.resource.take() else {
                    continue;
                };
                slot.polls += 1;

                let cluster = Arc::clone(&self.cluster);
                let semaphore = Arc::clone(&semaphore);
                join_set.spawn(async move {
                    let _permit = semaphore.acquire().await.ok();
                    let state = resource.sync(cluster.as_ref()).await;
                    Polled { index, resource, state }
                });
            }

            if join_set.is_empty() {
                break;
            }

            let mut interrupted = false;
            loop {
                let joined = tokio::select! {
                    joined = join_set.join_next() => joined,
                    _ = cancel.cancelled() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        deadline_exceeded = true;
                        interrupted = true;
                        break;
                    }
                };
                let Some(joined) = joined else { break };
                match joined {
                    Ok(Polled { index, resource, state }) => {
                        let slot = &mut slots[index];
                        if let Some(outcome) = settle(resource.as_ref(), state, started) {
                            log_outcome(&slot.descriptor, &outcome);
                            slot.report = Some(ResourceReport {
                                descriptor: slot.descriptor.clone(),
                                outcome,
                                status: resource.status().to_string(),
                                polls: slot.polls,
                            });
                        }
                        slot.resource = Some(resource);
                    }
                    Err(e) => error!(error = %e, "poll task panicked"),
                }
            }

            // in-flight polls are dropped; their resources end up Cancelled
            if interrupted {
                join_set.abort_all();
                break;
            }

            // a resource that never came back was lost to a panic
            for slot in slots.iter_mut() {
                if slot.resource.is_none() && slot.report.is_none() {
                    slot.report = Some(ResourceReport {
                        descriptor: slot.descriptor.clone(),
                        outcome: ResourceOutcome::Failed,
                        status: "Unknown".to_string(),
                        polls: slot.polls,
                    });
                }
            }

            cycle += 1;
            let pending = slots.iter().filter(|s| s.report.is_none()).count();
            debug!(cycle, pending, "poll cycle complete");
            if pending == 0 {
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                deadline_exceeded = true;
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {
                    deadline_exceeded = true;
                    break;
                }
                _ = tokio::time::sleep(self.limits.poll_interval) => {}
            }
        }

        if deadline_exceeded {
            warn!(
                deadline_secs = self.limits.attempt_deadline.as_secs(),
                "attempt deadline exceeded"
            );
        } else if cancel.is_cancelled() {
            info!("watch cancelled");
        }

        let reports = slots
            .into_iter()
            .map(|slot| match slot.report {
                Some(report) => report,
                None => ResourceReport {
                    status: slot
                        .resource
                        .as_ref()
                        .map(|r| r.status().to_string())
                        .unwrap_or_else(|| "Unknown".to_string()),
                    descriptor: slot.descriptor,
                    outcome: ResourceOutcome::Cancelled,
                    polls: slot.polls,
                },
            })
            .collect();

        WatchSummary {
            reports,
            elapsed: started.elapsed(),
            deadline_exceeded,
        }
    }
}

/// Terminal outcome for a resource after a poll, if it has one
fn settle(
    resource: &dyn ResourceStatusPoller,
    state: ObservationState,
    started: Instant,
) -> Option<ResourceOutcome> {
    match state {
        ObservationState::Succeeded => Some(ResourceOutcome::Succeeded),
        ObservationState::Failed => Some(ResourceOutcome::Failed),
        _ if started.elapsed() >= resource.timeout_duration() => Some(ResourceOutcome::TimedOut {
            message: resource.timeout_message().to_string(),
        }),
        _ => None,
    }
}

fn log_outcome(descriptor: &ResourceDescriptor, outcome: &ResourceOutcome) {
    match outcome {
        ResourceOutcome::Succeeded => info!(resource = %descriptor.id(), "resource ready"),
        ResourceOutcome::Failed => error!(resource = %descriptor.id(), "resource failed"),
        ResourceOutcome::TimedOut { .. } => warn!(resource = %descriptor.id(), "resource timed out"),
        ResourceOutcome::Cancelled => {}
    }
}
